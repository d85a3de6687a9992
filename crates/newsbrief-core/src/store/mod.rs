//! Storage abstraction for News Brief.
//!
//! Three traits cover the three tables the pipeline touches. Backends
//! (SQLite in the app crate, [`memory::InMemoryStore`] here) implement all
//! of them on one type so a single handle can be shared.
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`ArticleStore`] | URL existence check, insert-if-absent, windowed nearest neighbours, summary write-back |
//! | [`ReportStore`] | Lookup by (user, date), insert, list dates |
//! | [`UserStore`] | Lookup, seed, preference update |

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Article, DateWindow, NewArticle, NewReport, Report, User, UserPreference};

/// Durable, URL-deduplicated article storage.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Which of `urls` are already stored (exact match).
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>>;

    /// Insert unless an article with the same URL exists.
    ///
    /// Returns `false` when the URL was already present. A concurrent
    /// duplicate insert is absorbed here, not reported as an error.
    async fn insert_article(&self, article: &NewArticle) -> Result<bool>;

    /// Articles published in `window`, ordered ascending by L2 distance
    /// from `query` (ties by id), at most `limit`.
    async fn nearest_in_window(
        &self,
        query: &[f32],
        window: &DateWindow,
        limit: usize,
    ) -> Result<Vec<Article>>;

    /// Fetch articles by id. Missing ids are omitted; order is unspecified.
    async fn get_articles(&self, ids: &[i64]) -> Result<Vec<Article>>;

    /// Persist a generated summary onto an article.
    async fn set_summary(&self, id: i64, summary: &str) -> Result<()>;
}

/// Per-user, per-date report storage.
///
/// There is deliberately no uniqueness guarantee on (user, date): callers
/// check with [`find_report`](ReportStore::find_report) before inserting.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_report(&self, user_id: i64, date: NaiveDate) -> Result<Option<Report>>;

    /// Insert a report and return its id.
    async fn insert_report(&self, report: &NewReport) -> Result<i64>;

    /// Distinct report dates for a user, most recent first.
    async fn list_report_dates(&self, user_id: i64) -> Result<Vec<NaiveDate>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Create the user if missing. Existing rows are left untouched.
    async fn ensure_user(&self, id: i64, email: &str) -> Result<()>;

    /// Replace text, embedding, and keywords together.
    async fn set_preference(&self, user_id: i64, preference: &UserPreference) -> Result<()>;
}
