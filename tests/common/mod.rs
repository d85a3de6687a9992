//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use newsbrief::ingest::IngestServices;
use newsbrief::report::{DigestSettings, ReportContext};
use newsbrief_core::embedding::EmbeddingProvider;
use newsbrief_core::models::{NewArticle, UserPreference};
use newsbrief_core::services::{
    CandidateUrl, FetchWindow, FetchedPage, KeywordExtractor, NewsLister, PageFetcher,
    ReportGenerator, Summarizer, SynthesisPrompt,
};
use newsbrief_core::store::memory::InMemoryStore;
use newsbrief_core::store::{ArticleStore, UserStore};
use tokio_util::sync::CancellationToken;

// ============ Fakes ============

#[derive(Default)]
pub struct FakeLister {
    pub urls: HashMap<String, Vec<String>>,
    pub failing: Vec<String>,
    /// Listing-side publisher names, by URL.
    pub sources: HashMap<String, String>,
    pub windows: Mutex<Vec<FetchWindow>>,
}

impl FakeLister {
    pub fn with(mut self, keyword: &str, urls: &[&str]) -> Self {
        self.urls.insert(
            keyword.to_string(),
            urls.iter().map(|u| u.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl NewsLister for FakeLister {
    async fn list_urls(&self, keyword: &str, window: &FetchWindow) -> Result<Vec<CandidateUrl>> {
        self.windows.lock().unwrap().push(window.clone());
        if self.failing.iter().any(|k| k == keyword) {
            bail!("listing unavailable");
        }
        Ok(self
            .urls
            .get(keyword)
            .map(|urls| {
                urls.iter()
                    .map(|u| CandidateUrl {
                        url: u.clone(),
                        keyword: keyword.to_string(),
                        title: None,
                        source: self.sources.get(u).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub pages: HashMap<String, FetchedPage>,
    pub fetched: Mutex<Vec<String>>,
    pub cancel_after_first: Option<CancellationToken>,
}

impl FakeFetcher {
    pub fn page(mut self, url: &str, title: &str, published: Option<DateTime<Utc>>, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: url.to_string(),
                title: title.to_string(),
                content: body.to_string(),
                published_at: published,
                source: Some("Wire".to_string()),
            },
        );
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.fetched.lock().unwrap().push(url.to_string());
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {}", url))
    }
}

/// Embeds by title lookup; unknown titles map to the x axis.
#[derive(Default)]
pub struct FakeEmbedder {
    pub vectors: HashMap<String, Vec<f32>>,
    pub fail: bool,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            bail!("embedding service down");
        }
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
    }
}

/// Wraps every article of the prompt in its own marker.
#[derive(Default)]
pub struct FakeChat {
    pub summaries: AtomicUsize,
    pub reports: AtomicUsize,
    pub fail_summaries: bool,
    pub fail_reports: bool,
}

#[async_trait]
impl ReportGenerator for FakeChat {
    async fn generate(&self, prompt: &SynthesisPrompt) -> Result<String> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        if self.fail_reports {
            bail!("chat model unavailable");
        }
        let n = prompt.articles.lines().filter(|l| l.starts_with("ID: ")).count();
        Ok((0..n)
            .map(|i| format!("<context id=\"{}\">Passage {}.</context>", i, i))
            .collect::<Vec<_>>()
            .join(" "))
    }
}

#[async_trait]
impl Summarizer for FakeChat {
    async fn summarize(&self, title: &str, _content: &str) -> Result<String> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        if self.fail_summaries {
            bail!("summarizer down");
        }
        Ok(format!("summary of {}", title))
    }
}

#[async_trait]
impl KeywordExtractor for FakeChat {
    async fn extract_keywords(&self, _text: &str) -> Result<Vec<String>> {
        Ok(vec!["chips".to_string(), "models".to_string()])
    }
}

// ============ Helpers ============

pub fn unit(deg: f32) -> Vec<f32> {
    let r = deg.to_radians();
    vec![r.cos(), r.sin()]
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

pub fn services(
    store: Arc<dyn ArticleStore>,
    lister: FakeLister,
    fetcher: Arc<FakeFetcher>,
    embedder: FakeEmbedder,
) -> IngestServices {
    IngestServices {
        lister: Arc::new(lister),
        fetcher,
        embedder: Arc::new(embedder),
        store,
    }
}

pub fn context(
    store: Arc<InMemoryStore>,
    chat: Arc<FakeChat>,
    settings: DigestSettings,
) -> ReportContext {
    ReportContext {
        articles: store.clone(),
        reports: store.clone(),
        users: store.clone(),
        generator: chat.clone(),
        summarizer: chat.clone(),
        keywords: chat,
        ingest: services(
            store,
            FakeLister::default(),
            Arc::new(FakeFetcher::default()),
            FakeEmbedder::default(),
        ),
        settings,
    }
}

pub async fn seed_article(store: &InMemoryStore, url: &str, title: &str, deg: f32, at: DateTime<Utc>) {
    let inserted = store
        .insert_article(&NewArticle {
            url: url.to_string(),
            title: title.to_string(),
            content: format!("{} body", title),
            published_at: at,
            title_embedding: unit(deg),
            keyword: "chips".to_string(),
            source: None,
        })
        .await
        .unwrap();
    assert!(inserted);
}

pub async fn seed_user(store: &InMemoryStore, deg: f32) {
    store.ensure_user(1, "admin@example.com").await.unwrap();
    store
        .set_preference(
            1,
            &UserPreference {
                text: "chips".to_string(),
                embedding: unit(deg),
                keywords: vec!["chips".to_string()],
            },
        )
        .await
        .unwrap();
}

pub fn settings(max_articles: usize, lambda: f32) -> DigestSettings {
    DigestSettings {
        max_articles,
        lambda,
        ..DigestSettings::default()
    }
}

