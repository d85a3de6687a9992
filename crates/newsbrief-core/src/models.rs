//! Core data models.
//!
//! These are the typed records that flow between the ingestion pipeline,
//! the stores, and the report service.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::ValidationError;

/// A stored news article.
///
/// Every stored article has a publish time and non-empty content, so every
/// stored article is retrievable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
    #[serde(skip)]
    pub title_embedding: Vec<f32>,
    /// Search keyword the article was found under.
    pub keyword: String,
    /// Publisher name, when the page exposes one.
    pub source: Option<String>,
}

/// An article about to be inserted by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub title_embedding: Vec<f32>,
    pub keyword: String,
    pub source: Option<String>,
}

impl NewArticle {
    /// Check the record against the store's invariants.
    ///
    /// `dims` is the process-wide embedding dimension.
    pub fn validate(&self, dims: usize) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent(self.url.clone()));
        }
        if self.title_embedding.len() != dims {
            return Err(ValidationError::EmbeddingDimension {
                expected: dims,
                actual: self.title_embedding.len(),
            });
        }
        Ok(())
    }
}

/// A user's stated news preference.
///
/// `embedding` and `keywords` are always derived from `text` together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPreference {
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub preference: Option<UserPreference>,
}

/// A generated daily report. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub text: String,
    /// Contributing article ids, indexed by the local ordinal used in `text`.
    pub article_ids: Vec<i64>,
}

/// A report about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: i64,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub article_ids: Vec<i64>,
}

/// One provenance-tagged passage of a report.
///
/// Derived from the report text on demand; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    /// 0-based position in document order.
    pub position: usize,
    pub text: String,
    pub article_id: i64,
}

/// Half-open interval `[start, end)` of publish times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Default candidate window for a report date: the previous day and the
    /// report day itself, `[date - 1 00:00, date + 1 00:00)`.
    pub fn around(date: NaiveDate) -> Self {
        let midnight = date.and_time(NaiveTime::MIN).and_utc();
        Self {
            start: midnight - Duration::days(1),
            end: midnight + Duration::days(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}
