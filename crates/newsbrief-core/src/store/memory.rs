//! In-memory store implementation for tests and embedding in other tools.
//!
//! Uses `Vec`/`HashMap` behind `std::sync::RwLock`. URL uniqueness is
//! checked under the write lock, so concurrent inserts of the same URL
//! behave like the SQLite `ON CONFLICT DO NOTHING` path.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Article, DateWindow, NewArticle, NewReport, Report, User, UserPreference};
use crate::retrieve::rank_by_distance;

use super::{ArticleStore, ReportStore, UserStore};

#[derive(Default)]
struct Tables {
    articles: Vec<Article>,
    reports: Vec<Report>,
    users: HashMap<i64, User>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    dims: usize,
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// `dims` is the embedding dimension enforced on insert.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    /// Number of stored articles.
    pub fn article_count(&self) -> Result<usize> {
        Ok(self.read()?.articles.len())
    }

    /// Number of stored reports, across all users and dates.
    pub fn report_count(&self) -> Result<usize> {
        Ok(self.read()?.reports.len())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStore {
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let tables = self.read()?;
        let wanted: HashSet<&str> = urls.iter().map(String::as_str).collect();
        Ok(tables
            .articles
            .iter()
            .filter(|a| wanted.contains(a.url.as_str()))
            .map(|a| a.url.clone())
            .collect())
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        article.validate(self.dims)?;
        let mut tables = self.write()?;
        if tables.articles.iter().any(|a| a.url == article.url) {
            return Ok(false);
        }
        let id = tables.articles.len() as i64 + 1;
        tables.articles.push(Article {
            id,
            url: article.url.clone(),
            title: article.title.clone(),
            content: article.content.clone(),
            published_at: article.published_at,
            summary: None,
            title_embedding: article.title_embedding.clone(),
            keyword: article.keyword.clone(),
            source: article.source.clone(),
        });
        Ok(true)
    }

    async fn nearest_in_window(
        &self,
        query: &[f32],
        window: &DateWindow,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let in_window: Vec<Article> = {
            let tables = self.read()?;
            tables
                .articles
                .iter()
                .filter(|a| window.contains(a.published_at))
                .cloned()
                .collect()
        };
        Ok(rank_by_distance(in_window, query, window, limit)?)
    }

    async fn get_articles(&self, ids: &[i64]) -> Result<Vec<Article>> {
        let tables = self.read()?;
        Ok(tables
            .articles
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn set_summary(&self, id: i64, summary: &str) -> Result<()> {
        let mut tables = self.write()?;
        match tables.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.summary = Some(summary.to_string());
                Ok(())
            }
            None => bail!("article not found: {}", id),
        }
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn find_report(&self, user_id: i64, date: NaiveDate) -> Result<Option<Report>> {
        let tables = self.read()?;
        Ok(tables
            .reports
            .iter()
            .find(|r| r.user_id == user_id && r.report_date == date)
            .cloned())
    }

    async fn insert_report(&self, report: &NewReport) -> Result<i64> {
        let mut tables = self.write()?;
        let id = tables.reports.len() as i64 + 1;
        tables.reports.push(Report {
            id,
            user_id: report.user_id,
            report_date: report.report_date,
            created_at: report.created_at,
            text: report.text.clone(),
            article_ids: report.article_ids.clone(),
        });
        Ok(id)
    }

    async fn list_report_dates(&self, user_id: i64) -> Result<Vec<NaiveDate>> {
        let tables = self.read()?;
        let mut dates: Vec<NaiveDate> = tables
            .reports
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.report_date)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn ensure_user(&self, id: i64, email: &str) -> Result<()> {
        let mut tables = self.write()?;
        tables.users.entry(id).or_insert_with(|| User {
            id,
            email: email.to_string(),
            preference: None,
        });
        Ok(())
    }

    async fn set_preference(&self, user_id: i64, preference: &UserPreference) -> Result<()> {
        if preference.embedding.len() != self.dims {
            bail!(
                "preference embedding has {} dimensions, store expects {}",
                preference.embedding.len(),
                self.dims
            );
        }
        let mut tables = self.write()?;
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.preference = Some(preference.clone());
                Ok(())
            }
            None => bail!("user not found: {}", user_id),
        }
    }
}
