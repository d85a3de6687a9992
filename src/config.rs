//! Configuration parsing and validation.
//!
//! News Brief is configured with a TOML file (default `./config/brief.toml`).
//! API keys are never stored in the file; providers read `OPENAI_API_KEY`
//! from the environment.
//!
//! ```toml
//! [db]
//! path = "./data/brief.sqlite"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-large"
//! dims = 1024
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o"
//!
//! [digest]
//! max_articles = 5
//! lambda = 0.8
//!
//! [user]
//! id = 1
//! email = "admin@example.com"
//! keywords = ["nvidia", "openai", "langchain"]
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use newsbrief_core::mmr::DEFAULT_LAMBDA;
use newsbrief_core::retrieve::DEFAULT_CANDIDATE_LIMIT;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub user: UserConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            timeout_secs: 30,
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_chat_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_news_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            language: default_language(),
            period: default_period(),
            max_results: default_max_results(),
            user_agent: default_user_agent(),
            timeout_secs: default_news_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default = "default_lambda")]
    pub lambda: f32,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    #[serde(default = "default_catch_up_days")]
    pub catch_up_days: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_articles: default_max_articles(),
            lambda: default_lambda(),
            candidate_limit: default_candidate_limit(),
            catch_up_days: default_catch_up_days(),
        }
    }
}

/// The single user this deployment serves.
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: i64,
    #[serde(default = "default_user_email")]
    pub email: String,
    /// Fallback ingestion keywords when the user has no stored preference.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            email: default_user_email(),
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_country() -> String {
    "US".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_period() -> String {
    "1d".to_string()
}
fn default_max_results() -> usize {
    50
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string()
}
fn default_news_timeout_secs() -> u64 {
    20
}
fn default_max_articles() -> usize {
    5
}
fn default_lambda() -> f32 {
    DEFAULT_LAMBDA
}
fn default_candidate_limit() -> usize {
    DEFAULT_CANDIDATE_LIMIT
}
fn default_catch_up_days() -> u32 {
    7
}
fn default_user_id() -> i64 {
    1
}
fn default_user_email() -> String {
    "admin@example.com".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate digest
    if config.digest.max_articles == 0 {
        anyhow::bail!("digest.max_articles must be >= 1");
    }
    if config.digest.candidate_limit == 0 {
        anyhow::bail!("digest.candidate_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.digest.lambda) {
        anyhow::bail!("digest.lambda must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.news.max_results == 0 {
        anyhow::bail!("news.max_results must be >= 1");
    }

    Ok(())
}
