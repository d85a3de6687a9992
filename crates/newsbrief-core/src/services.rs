//! Collaborator traits for everything outside the process.
//!
//! The application crate provides HTTP-backed implementations; tests use
//! deterministic fakes. None of these calls are retried by the pipeline.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ValidationError;

/// Listing window handed to the news listing collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    /// Relative period such as `"1d"` or `"7d"`, used when no explicit
    /// range is given.
    pub period: String,
    /// Explicit inclusive date range, overriding `period`.
    pub range: Option<(NaiveDate, NaiveDate)>,
    /// Upper bound on URLs returned per keyword.
    pub max_results: usize,
}

impl FetchWindow {
    pub fn recent(period: &str, max_results: usize) -> Self {
        Self {
            period: period.to_string(),
            range: None,
            max_results,
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate, max_results: usize) -> Self {
        Self {
            period: String::new(),
            range: Some((start, end)),
            max_results,
        }
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::recent("1d", 50)
    }
}

/// A URL found for a keyword.
///
/// `title` and `source` come from the listing and are used when the page
/// itself does not provide them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    pub url: String,
    pub keyword: String,
    pub title: Option<String>,
    pub source: Option<String>,
}

/// A fetched and parsed article page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl FetchedPage {
    /// Pages without a publish date or body text are not ingestible.
    ///
    /// Returns the publish time on success.
    pub fn check(&self) -> Result<DateTime<Utc>, ValidationError> {
        let published_at = self
            .published_at
            .ok_or_else(|| ValidationError::MissingPublishTime(self.url.clone()))?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent(self.url.clone()));
        }
        Ok(published_at)
    }
}

/// Resolves a keyword to candidate article URLs.
#[async_trait]
pub trait NewsLister: Send + Sync {
    async fn list_urls(&self, keyword: &str, window: &FetchWindow) -> Result<Vec<CandidateUrl>>;
}

/// Downloads and parses a single article page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Prompt context for one report synthesis call.
///
/// Articles are exposed only by local ordinal, title, and summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisPrompt {
    pub date: NaiveDate,
    /// Pre-formatted `ID / Title / Text` blocks.
    pub articles: String,
}

/// Produces the provenance-tagged report text.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, prompt: &SynthesisPrompt) -> Result<String>;
}

/// Produces a short summary of one article.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, content: &str) -> Result<String>;
}

/// Derives search keywords from a free-text preference.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract_keywords(&self, preference_text: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content: &str, published: bool) -> FetchedPage {
        FetchedPage {
            url: "https://example.com/p".to_string(),
            title: "P".to_string(),
            content: content.to_string(),
            published_at: published.then(Utc::now),
            source: None,
        }
    }

    #[test]
    fn test_check_requires_publish_time() {
        assert!(matches!(
            page("text", false).check(),
            Err(ValidationError::MissingPublishTime(_))
        ));
    }

    #[test]
    fn test_check_requires_content() {
        assert!(matches!(
            page("\n ", true).check(),
            Err(ValidationError::EmptyContent(_))
        ));
    }

    #[test]
    fn test_check_passes_complete_page() {
        assert!(page("text", true).check().is_ok());
    }
}
