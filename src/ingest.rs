//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow for a batch of keywords: listing → batch dedup →
//! stored-URL exclusion → fetch → validate → title embedding → insert.
//!
//! Listing and fetch failures are logged and counted, never fatal. Embedding
//! and store failures abort the run. The cancellation token is checked
//! before each keyword and before each page, so a cancelled run stops after
//! the item in flight.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use newsbrief_core::embedding::EmbeddingProvider;
use newsbrief_core::models::{NewArticle, User};
use newsbrief_core::services::{CandidateUrl, FetchWindow, NewsLister, PageFetcher};
use newsbrief_core::store::ArticleStore;

use crate::progress::{IngestProgressEvent, IngestProgressReporter};

/// Fallback title length, in characters, for pages without a title.
const FALLBACK_TITLE_CHARS: usize = 200;

/// Collaborators the ingestion pipeline needs.
#[derive(Clone)]
pub struct IngestServices {
    pub lister: Arc<dyn NewsLister>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn ArticleStore>,
}

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// URLs returned by listing, before any dedup.
    pub listed: usize,
    /// Keywords whose listing call failed.
    pub list_failed: usize,
    /// URLs already stored before this run.
    pub already_stored: usize,
    pub inserted: usize,
    /// Inserts absorbed by the URL uniqueness constraint.
    pub duplicates: usize,
    /// Pages without a publish time or body text.
    pub invalid: usize,
    pub fetch_failed: usize,
    pub cancelled: bool,
}

/// Run one ingestion pass for `keywords`.
pub async fn run_ingestion(
    services: &IngestServices,
    keywords: &[String],
    window: &FetchWindow,
    cancel: &CancellationToken,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    // List candidates; first keyword to surface a URL keeps it.
    let mut seen = HashSet::new();
    let mut candidates: Vec<CandidateUrl> = Vec::new();
    for keyword in keywords {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            info!(?stats, "ingestion cancelled during listing");
            return Ok(stats);
        }
        progress.report(IngestProgressEvent::Listing {
            keyword: keyword.clone(),
        });
        match services.lister.list_urls(keyword, window).await {
            Ok(urls) => {
                stats.listed += urls.len();
                for candidate in urls {
                    if seen.insert(candidate.url.clone()) {
                        candidates.push(candidate);
                    }
                }
            }
            Err(e) => {
                stats.list_failed += 1;
                warn!(keyword = %keyword, error = %e, "listing failed, skipping keyword");
            }
        }
    }

    // Exclude URLs already stored before fetching anything.
    let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
    let existing = services
        .store
        .existing_urls(&urls)
        .await
        .context("failed to check stored URLs")?;
    stats.already_stored = existing.len();
    candidates.retain(|c| !existing.contains(&c.url));

    let total = candidates.len() as u64;
    info!(
        keywords = keywords.len(),
        listed = stats.listed,
        new = total,
        "ingestion candidates resolved"
    );

    for (i, candidate) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        progress.report(IngestProgressEvent::Fetching {
            n: i as u64,
            total,
        });

        let page = match services.fetcher.fetch(&candidate.url).await {
            Ok(page) => page,
            Err(e) => {
                stats.fetch_failed += 1;
                warn!(url = %candidate.url, error = %e, "fetch failed, skipping");
                continue;
            }
        };

        let published_at = match page.check() {
            Ok(ts) => ts,
            Err(e) => {
                stats.invalid += 1;
                debug!(url = %candidate.url, reason = %e, "page not ingestible, skipping");
                continue;
            }
        };

        let listed_title = candidate
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let title = if !page.title.trim().is_empty() {
            page.title.trim().to_string()
        } else if let Some(listed) = listed_title {
            listed.to_string()
        } else {
            fallback_title(&page.content)
        };

        let title_embedding = services
            .embedder
            .embed(&title)
            .await
            .with_context(|| format!("failed to embed title for {}", candidate.url))?;

        let article = NewArticle {
            url: candidate.url.clone(),
            title,
            content: page.content,
            published_at,
            title_embedding,
            keyword: candidate.keyword.clone(),
            source: page.source.or_else(|| candidate.source.clone()),
        };

        let inserted = services
            .store
            .insert_article(&article)
            .await
            .with_context(|| format!("failed to store {}", candidate.url))?;
        if inserted {
            stats.inserted += 1;
            debug!(url = %candidate.url, keyword = %candidate.keyword, "article stored");
        } else {
            stats.duplicates += 1;
        }
    }

    if !stats.cancelled {
        progress.report(IngestProgressEvent::Fetching { n: total, total });
    }
    info!(
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        invalid = stats.invalid,
        fetch_failed = stats.fetch_failed,
        cancelled = stats.cancelled,
        "ingestion finished"
    );
    Ok(stats)
}

/// Run ingestion on a background task.
///
/// Cancel `cancel` to stop it early; the handle resolves once the item in
/// flight has finished.
pub fn spawn_ingestion(
    services: IngestServices,
    keywords: Vec<String>,
    window: FetchWindow,
    cancel: CancellationToken,
    progress: Arc<dyn IngestProgressReporter>,
) -> JoinHandle<Result<IngestStats>> {
    tokio::spawn(async move {
        run_ingestion(&services, &keywords, &window, &cancel, progress.as_ref()).await
    })
}

/// Keywords for a run: explicit ones first, then the user's stored
/// preference keywords, then the configured fallback list.
pub fn resolve_keywords(explicit: &[String], user: Option<&User>, fallback: &[String]) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    match user.and_then(|u| u.preference.as_ref()) {
        Some(pref) if !pref.keywords.is_empty() => pref.keywords.clone(),
        _ => fallback.to_vec(),
    }
}

fn fallback_title(content: &str) -> String {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    first_line.trim().chars().take(FALLBACK_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use newsbrief_core::models::UserPreference;

    #[test]
    fn test_resolve_keywords_precedence() {
        let fallback = vec!["nvidia".to_string()];
        let mut user = User {
            id: 1,
            email: "a@example.com".to_string(),
            preference: None,
        };
        assert_eq!(resolve_keywords(&[], Some(&user), &fallback), fallback);

        user.preference = Some(UserPreference {
            text: "chips".to_string(),
            embedding: vec![1.0],
            keywords: vec!["semiconductors".to_string()],
        });
        assert_eq!(
            resolve_keywords(&[], Some(&user), &fallback),
            vec!["semiconductors".to_string()]
        );

        let explicit = vec!["rust".to_string()];
        assert_eq!(resolve_keywords(&explicit, Some(&user), &fallback), explicit);
    }

    #[test]
    fn test_fallback_title_uses_first_line() {
        assert_eq!(fallback_title("\n\nLead sentence.\n\nMore."), "Lead sentence.");
        let long = "x".repeat(500);
        assert_eq!(fallback_title(&long).len(), FALLBACK_TITLE_CHARS);
    }
}
