//! SQLite-backed store implementation.
//!
//! Implements the three store traits from `newsbrief_core::store` on one
//! handle. Vectors are stored as little-endian `f32` BLOBs; timestamps as
//! Unix seconds; report dates as `YYYY-MM-DD` text. Nearest-neighbour
//! ordering is computed in process over the rows inside the date window.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use newsbrief_core::embedding::{blob_to_vec, vec_to_blob};
use newsbrief_core::models::{
    Article, DateWindow, NewArticle, NewReport, Report, User, UserPreference,
};
use newsbrief_core::retrieve::rank_by_distance;
use newsbrief_core::store::{ArticleStore, ReportStore, UserStore};

/// Bound parameters per `IN (...)` query, under SQLite's variable limit.
const IN_BATCH: usize = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite implementation of the article, report, and user stores.
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    /// `dims` is the embedding dimension enforced on every write.
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Total number of stored articles.
    pub async fn article_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn from_timestamp(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).with_context(|| format!("timestamp out of range: {}", ts))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let blob: Vec<u8> = row.get("title_embedding");
    Ok(Article {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        content: row.get("content"),
        published_at: from_timestamp(row.get("published_at"))?,
        summary: row.get("summary"),
        title_embedding: blob_to_vec(&blob),
        keyword: row.get("keyword"),
        source: row.get("source"),
    })
}

fn row_to_report(row: &SqliteRow) -> Result<Report> {
    let date: String = row.get("report_date");
    let ids: String = row.get("article_ids");
    Ok(Report {
        id: row.get("id"),
        user_id: row.get("user_id"),
        report_date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .with_context(|| format!("bad report_date in database: {}", date))?,
        created_at: from_timestamp(row.get("created_at"))?,
        text: row.get("text"),
        article_ids: serde_json::from_str(&ids)
            .with_context(|| format!("bad article_ids in database: {}", ids))?,
    })
}

const ARTICLE_COLUMNS: &str =
    "id, url, title, content, published_at, summary, title_embedding, keyword, source";

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for batch in urls.chunks(IN_BATCH) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT url FROM articles WHERE url IN (");
            let mut sep = qb.separated(", ");
            for url in batch {
                sep.push_bind(url.clone());
            }
            sep.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            found.extend(rows.iter().map(|r| r.get::<String, _>("url")));
        }
        Ok(found)
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        article.validate(self.dims)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles (url, title, content, published_at, summary,
                                  title_embedding, keyword, source, created_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.published_at.timestamp())
        .bind(vec_to_blob(&article.title_embedding))
        .bind(&article.keyword)
        .bind(&article.source)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn nearest_in_window(
        &self,
        query: &[f32],
        window: &DateWindow,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE published_at >= ? AND published_at < ?",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(window.start.timestamp())
            .bind(window.end.timestamp())
            .fetch_all(&self.pool)
            .await?;

        let articles = rows
            .iter()
            .map(row_to_article)
            .collect::<Result<Vec<_>>>()?;

        Ok(rank_by_distance(articles, query, window, limit)?)
    }

    async fn get_articles(&self, ids: &[i64]) -> Result<Vec<Article>> {
        let mut articles = Vec::with_capacity(ids.len());
        for batch in ids.chunks(IN_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM articles WHERE id IN (",
                ARTICLE_COLUMNS
            ));
            let mut sep = qb.separated(", ");
            for id in batch {
                sep.push_bind(*id);
            }
            sep.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in &rows {
                articles.push(row_to_article(row)?);
            }
        }
        Ok(articles)
    }

    async fn set_summary(&self, id: i64, summary: &str) -> Result<()> {
        let result = sqlx::query("UPDATE articles SET summary = ? WHERE id = ?")
            .bind(summary)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("article not found: {}", id);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn find_report(&self, user_id: i64, date: NaiveDate) -> Result<Option<Report>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, report_date, created_at, text, article_ids
            FROM reports
            WHERE user_id = ? AND report_date = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_report).transpose()
    }

    async fn insert_report(&self, report: &NewReport) -> Result<i64> {
        let ids = serde_json::to_string(&report.article_ids)?;
        let result = sqlx::query(
            r#"
            INSERT INTO reports (user_id, report_date, created_at, text, article_ids)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.user_id)
        .bind(report.report_date.format(DATE_FORMAT).to_string())
        .bind(report.created_at.timestamp())
        .bind(&report.text)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_report_dates(&self, user_id: i64) -> Result<Vec<NaiveDate>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT report_date FROM reports WHERE user_id = ? ORDER BY report_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, DATE_FORMAT)
                    .with_context(|| format!("bad report_date in database: {}", d))
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, preference_text, preference_keywords, preference_embedding
            FROM users WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let text: Option<String> = row.get("preference_text");
        let preference = match text {
            Some(text) => {
                let keywords: String = row.get("preference_keywords");
                let blob: Option<Vec<u8>> = row.get("preference_embedding");
                Some(UserPreference {
                    text,
                    embedding: blob.map(|b| blob_to_vec(&b)).unwrap_or_default(),
                    keywords: serde_json::from_str(&keywords)
                        .with_context(|| format!("bad preference_keywords for user {}", id))?,
                })
            }
            None => None,
        };

        Ok(Some(User {
            id: row.get("id"),
            email: row.get("email"),
            preference,
        }))
    }

    async fn ensure_user(&self, id: i64, email: &str) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await?;
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
        let keywords = serde_json::to_string(&preference.keywords)?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET preference_text = ?, preference_keywords = ?, preference_embedding = ?
            WHERE id = ?
            "#,
        )
        .bind(&preference.text)
        .bind(keywords)
        .bind(vec_to_blob(&preference.embedding))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("user not found: {}", user_id);
        }
        Ok(())
    }
}
