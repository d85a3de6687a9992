//! Report service: idempotent generation, retrieval, and catch-up.
//!
//! Generation for a (user, date) pair runs retrieval → MMR selection →
//! summary memoization → synthesis → insert, and is skipped when a report
//! already exists.
//!
//! The existence check and the insert are separate statements, and the
//! `reports` table has no unique constraint on (user_id, report_date). Two
//! triggers racing on the same pair can both insert; readers then see the
//! lowest id.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use newsbrief_core::context::parse_report;
use newsbrief_core::mmr;
use newsbrief_core::models::{Article, DateWindow, NewReport};
use newsbrief_core::retrieve::retrieve_candidates;
use newsbrief_core::services::{FetchWindow, KeywordExtractor, ReportGenerator, Summarizer};
use newsbrief_core::store::{ArticleStore, ReportStore, UserStore};

use crate::config::Config;
use crate::ingest::{resolve_keywords, run_ingestion, IngestServices, IngestStats};
use crate::progress::NoProgress;
use crate::summarize::ensure_summaries;
use crate::synthesize::synthesize;

/// Listing cap per keyword during catch-up.
pub const CATCH_UP_MAX_RESULTS: usize = 20;

/// Failures a caller is expected to branch on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("unknown user: {0}")]
    UnknownUser(i64),
    #[error("user {0} has no news preference set")]
    NoPreference(i64),
}

/// Selection and retrieval knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestSettings {
    pub max_articles: usize,
    pub lambda: f32,
    pub candidate_limit: usize,
    /// Ingestion keywords for users without a stored preference.
    pub fallback_keywords: Vec<String>,
}

impl DigestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_articles: config.digest.max_articles,
            lambda: config.digest.lambda,
            candidate_limit: config.digest.candidate_limit,
            fallback_keywords: config.user.keywords.clone(),
        }
    }
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            max_articles: 5,
            lambda: mmr::DEFAULT_LAMBDA,
            candidate_limit: newsbrief_core::retrieve::DEFAULT_CANDIDATE_LIMIT,
            fallback_keywords: Vec::new(),
        }
    }
}

/// Everything the report service talks to.
#[derive(Clone)]
pub struct ReportContext {
    pub articles: Arc<dyn ArticleStore>,
    pub reports: Arc<dyn ReportStore>,
    pub users: Arc<dyn UserStore>,
    pub generator: Arc<dyn ReportGenerator>,
    pub summarizer: Arc<dyn Summarizer>,
    pub keywords: Arc<dyn KeywordExtractor>,
    /// Used by catch-up and preference updates.
    pub ingest: IngestServices,
    pub settings: DigestSettings,
}

/// Outcome of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report_id", rename_all = "snake_case")]
pub enum Generation {
    Created(i64),
    AlreadyExists(i64),
    /// Nothing was published in the window; no report is written.
    NoCandidates,
}

/// Article metadata attached to a report section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub source: Option<String>,
}

impl From<&Article> for SourceRef {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            url: article.url.clone(),
            published_at: article.published_at,
            summary: article.summary.clone(),
            source: article.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub position: usize,
    pub text: String,
    pub article_id: i64,
    pub article: Option<SourceRef>,
}

/// A stored report with its sections re-derived from the text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    pub id: i64,
    pub user_id: i64,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub article_ids: Vec<i64>,
    pub sections: Vec<SectionView>,
}

/// Generate the report for `(user_id, date)` unless one exists.
pub async fn generate_report(
    ctx: &ReportContext,
    user_id: i64,
    date: NaiveDate,
) -> Result<Generation> {
    if let Some(existing) = ctx.reports.find_report(user_id, date).await? {
        info!(user_id, %date, report_id = existing.id, "report already exists");
        return Ok(Generation::AlreadyExists(existing.id));
    }

    let user = ctx
        .users
        .get_user(user_id)
        .await?
        .ok_or(ReportError::UnknownUser(user_id))?;
    let preference = user.preference.ok_or(ReportError::NoPreference(user_id))?;

    let window = DateWindow::around(date);
    let candidates = retrieve_candidates(
        ctx.articles.as_ref(),
        &preference.embedding,
        &window,
        ctx.settings.candidate_limit,
    )
    .await
    .with_context(|| format!("candidate retrieval failed for {}", date))?;

    if candidates.is_empty() {
        info!(user_id, %date, "no candidate articles in window");
        return Ok(Generation::NoCandidates);
    }

    let ids: Vec<i64> = candidates.iter().map(|a| a.id).collect();
    let embeddings: Vec<Vec<f32>> = candidates.iter().map(|a| a.title_embedding.clone()).collect();
    let selected_ids = mmr::select(
        &ids,
        &embeddings,
        &preference.embedding,
        ctx.settings.lambda,
        ctx.settings.max_articles,
    )?;

    // Selection order is the ordinal order shown to the generator.
    let mut by_id: HashMap<i64, Article> = candidates.into_iter().map(|a| (a.id, a)).collect();
    let mut selected: Vec<Article> = selected_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();
    info!(user_id, %date, candidates = ids.len(), selected = selected.len(), "articles selected");

    ensure_summaries(ctx.articles.as_ref(), ctx.summarizer.as_ref(), &mut selected).await?;

    let synthesis = synthesize(ctx.generator.as_ref(), date, &selected).await?;

    let report_id = ctx
        .reports
        .insert_report(&NewReport {
            user_id,
            report_date: date,
            created_at: Utc::now(),
            text: synthesis.text,
            article_ids: synthesis.article_ids,
        })
        .await
        .context("failed to store report")?;

    info!(user_id, %date, report_id, "report created");
    Ok(Generation::Created(report_id))
}

/// Fetch a stored report with provenance sections, or `None`.
pub async fn get_report(
    ctx: &ReportContext,
    user_id: i64,
    date: NaiveDate,
) -> Result<Option<ReportView>> {
    let Some(report) = ctx.reports.find_report(user_id, date).await? else {
        return Ok(None);
    };

    let parsed = parse_report(&report.text, &report.article_ids);
    if !parsed.skipped.is_empty() {
        warn!(report_id = report.id, skipped = parsed.skipped.len(), "unlinked report markers");
    }

    let articles = ctx.articles.get_articles(&report.article_ids).await?;
    let by_id: HashMap<i64, &Article> = articles.iter().map(|a| (a.id, a)).collect();

    let sections = parsed
        .sections
        .into_iter()
        .map(|s| SectionView {
            article: by_id.get(&s.article_id).map(|a| SourceRef::from(*a)),
            position: s.position,
            text: s.text,
            article_id: s.article_id,
        })
        .collect();

    Ok(Some(ReportView {
        id: report.id,
        user_id: report.user_id,
        report_date: report.report_date,
        created_at: report.created_at,
        text: report.text,
        article_ids: report.article_ids,
        sections,
    }))
}

/// Report dates for a user, most recent first.
pub async fn list_report_dates(ctx: &ReportContext, user_id: i64) -> Result<Vec<NaiveDate>> {
    ctx.reports.list_report_dates(user_id).await
}

/// Result of a catch-up run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CatchUpStats {
    pub ingest: IngestStats,
    pub created: Vec<NaiveDate>,
    pub existing: usize,
    pub no_candidates: usize,
    pub cancelled: bool,
}

/// Ingest every day the last `days` reports draw candidates from, then
/// generate each missing report from the oldest day up to `today`.
pub async fn catch_up(
    ctx: &ReportContext,
    user_id: i64,
    today: NaiveDate,
    days: u32,
    cancel: &CancellationToken,
) -> Result<CatchUpStats> {
    let mut stats = CatchUpStats::default();
    if days == 0 {
        return Ok(stats);
    }

    let user = ctx
        .users
        .get_user(user_id)
        .await?
        .ok_or(ReportError::UnknownUser(user_id))?;
    let keywords = resolve_keywords(&[], Some(&user), &ctx.settings.fallback_keywords);

    // The oldest day's candidate window also covers the day before it.
    let oldest = today - Duration::days(i64::from(days) - 1);
    let window = FetchWindow::between(oldest - Duration::days(1), today, CATCH_UP_MAX_RESULTS);
    stats.ingest = run_ingestion(&ctx.ingest, &keywords, &window, cancel, &NoProgress).await?;

    for offset in (0..days).rev() {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        let date = today - Duration::days(i64::from(offset));
        match generate_report(ctx, user_id, date).await? {
            Generation::Created(_) => stats.created.push(date),
            Generation::AlreadyExists(_) => stats.existing += 1,
            Generation::NoCandidates => stats.no_candidates += 1,
        }
    }
    stats.cancelled |= stats.ingest.cancelled;

    info!(
        user_id,
        created = stats.created.len(),
        existing = stats.existing,
        no_candidates = stats.no_candidates,
        "catch-up finished"
    );
    Ok(stats)
}
