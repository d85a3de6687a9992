//! Chat-completion clients for report synthesis, summaries, and keywords.
//!
//! [`ChatClient`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint and implements the three text-generation collaborator traits.
//! [`DisabledChat`] is used when `llm.provider = "disabled"`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use newsbrief_core::services::{KeywordExtractor, ReportGenerator, Summarizer, SynthesisPrompt};

use crate::config::LlmConfig;

/// Article bodies are cut to this many characters before summarization.
const MAX_SUMMARY_INPUT_CHARS: usize = 12_000;

const REPORT_SYSTEM_PROMPT: &str = r#"Date: {date}

Generate a personalised report using the information from the provided articles. This will be shown to the user as their daily brief of the current news.

You will be provided with the articles as summaries in the following format:

ID: {unique identifier for the article}
Title: {title of the article}
Text: {summary of the article}

All text in the report must be enclosed in <context id="article id goes here"></context> tags so each section can be linked back to its source. Only use <context> tags. A tag may hold as little or as much text as needed, but every enclosed piece of text must link to the correct article id.

Begin the report with a brief summary outlining all the topics covered, then follow it with a more thorough description of the events. Use a reporting style and do not use we/I/you. Make the report around a page in length. The opening summary usually consists of very small <context> chunks, sometimes a single word, each linking to its article. Combine information from all the articles into free-flowing text. Start immediately with the report and do not greet the user."#;

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the provided news article in three to five sentences. Keep names, figures, and dates. Use a neutral reporting style. Reply with the summary only.";

const KEYWORD_SYSTEM_PROMPT: &str = r#"Generate a list of search keywords for the provided text. The text is a user's news preference and the keywords will be used to search for news matching it. Write one keyword per line:

keyword_1
keyword_2
...

Write around 5 very specific keywords that individually capture the range of the user's interests. Use spaces, never underscores. Start immediately with the keywords and include nothing else."#;

/// Client for an OpenAI-compatible chat completions API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct ChatClient {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// One system + user exchange. Returns the assistant message text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        debug!(model = %self.model, prompt_chars = user.len(), "chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Chat API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Render the report system prompt for a date.
pub fn report_system_prompt(prompt: &SynthesisPrompt) -> String {
    REPORT_SYSTEM_PROMPT.replacen("{date}", &prompt.date.format("%Y-%m-%d").to_string(), 1)
}

/// Split a keyword completion into clean keywords.
///
/// One keyword per line; list bullets and numbering are stripped, blanks
/// and case-insensitive repeats dropped.
pub fn parse_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for line in text.lines() {
        let bare = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
        let keyword = strip_numbering(bare).trim().replace('_', " ");
        if keyword.is_empty() {
            continue;
        }
        if keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            continue;
        }
        keywords.push(keyword);
    }
    keywords
}

/// `"2. foo"` and `"2) foo"` become `"foo"`; `"5G"` is left alone.
fn strip_numbering(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(tail) => tail,
        None => line,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl ReportGenerator for ChatClient {
    async fn generate(&self, prompt: &SynthesisPrompt) -> Result<String> {
        let user = format!("Here are the articles:\n\n{}", prompt.articles);
        self.complete(&report_system_prompt(prompt), &user).await
    }
}

#[async_trait]
impl Summarizer for ChatClient {
    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let user = format!(
            "Title: {}\n\n{}",
            title,
            truncate_chars(content, MAX_SUMMARY_INPUT_CHARS)
        );
        let summary = self.complete(SUMMARY_SYSTEM_PROMPT, &user).await?;
        Ok(summary.trim().to_string())
    }
}

#[async_trait]
impl KeywordExtractor for ChatClient {
    async fn extract_keywords(&self, preference_text: &str) -> Result<Vec<String>> {
        let user = format!("Here is the user preference text:\n\n{}", preference_text);
        let text = self.complete(KEYWORD_SYSTEM_PROMPT, &user).await?;
        Ok(parse_keywords(&text))
    }
}

/// Stand-in used when no chat model is configured. Every call fails.
pub struct DisabledChat;

#[async_trait]
impl ReportGenerator for DisabledChat {
    async fn generate(&self, _prompt: &SynthesisPrompt) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

#[async_trait]
impl Summarizer for DisabledChat {
    async fn summarize(&self, _title: &str, _content: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

#[async_trait]
impl KeywordExtractor for DisabledChat {
    async fn extract_keywords(&self, _preference_text: &str) -> Result<Vec<String>> {
        bail!("LLM provider is disabled")
    }
}

/// The text-generation collaborators, all backed by the configured model.
#[derive(Clone)]
pub struct ChatServices {
    pub generator: Arc<dyn ReportGenerator>,
    pub summarizer: Arc<dyn Summarizer>,
    pub keywords: Arc<dyn KeywordExtractor>,
}

pub fn create_chat_services(config: &LlmConfig) -> Result<ChatServices> {
    match config.provider.as_str() {
        "disabled" => {
            let chat = Arc::new(DisabledChat);
            Ok(ChatServices {
                generator: chat.clone(),
                summarizer: chat.clone(),
                keywords: chat,
            })
        }
        "openai" => {
            let chat = Arc::new(ChatClient::new(config)?);
            Ok(ChatServices {
                generator: chat.clone(),
                summarizer: chat.clone(),
                keywords: chat,
            })
        }
        other => bail!("Unknown llm provider: {}", other),
    }
}
