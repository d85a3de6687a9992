//! Web collaborators: Google News listing and article page fetching.
//!
//! [`GoogleNewsLister`] queries the Google News RSS search feed for a
//! keyword and resolves each item's `news.google.com` wrapper link to the
//! publisher URL, which becomes the article's identity. [`HttpPageFetcher`]
//! downloads a page and pulls out the title, body paragraphs, publisher, and
//! publish time.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use quick_xml::events::Event;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{debug, warn};

use newsbrief_core::services::{CandidateUrl, FetchWindow, FetchedPage, NewsLister, PageFetcher};

use crate::config::NewsConfig;

const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";

// ============ Listing ============

/// Lists article URLs from the Google News RSS search feed.
pub struct GoogleNewsLister {
    client: reqwest::Client,
    country: String,
    language: String,
}

impl GoogleNewsLister {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            country: config.country.clone(),
            language: config.language.clone(),
        })
    }

    fn feed_url(&self, keyword: &str, window: &FetchWindow) -> String {
        feed_url(&self.country, &self.language, keyword, window)
    }
}

/// Build the RSS search URL. Date limits use Google's query operators;
/// `before:` is exclusive, so an inclusive range ends the day after.
fn feed_url(country: &str, language: &str, keyword: &str, window: &FetchWindow) -> String {
    let query = match window.range {
        Some((start, end)) => format!(
            "{} after:{} before:{}",
            keyword,
            start.format("%Y-%m-%d"),
            end.succ_opt().unwrap_or(end).format("%Y-%m-%d")
        ),
        None if window.period.is_empty() => keyword.to_string(),
        None => format!("{} when:{}", keyword, window.period),
    };
    format!(
        "{}?q={}&hl={}-{}&gl={}&ceid={}:{}",
        GOOGLE_NEWS_RSS,
        urlencoding::encode(&query),
        language,
        country,
        country,
        country,
        language
    )
}

#[async_trait]
impl NewsLister for GoogleNewsLister {
    async fn list_urls(&self, keyword: &str, window: &FetchWindow) -> Result<Vec<CandidateUrl>> {
        let url = self.feed_url(keyword, window);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("news listing request failed for '{}'", keyword))?;

        let status = response.status();
        if !status.is_success() {
            bail!("news listing for '{}' returned {}", keyword, status);
        }

        let body = response.text().await?;
        let items = parse_rss(&body)?;
        debug!(keyword, items = items.len(), "news listing parsed");

        let mut candidates = Vec::new();
        for item in items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .take(window.max_results)
        {
            match self.resolve_link(&item.link).await {
                Ok(url) => candidates.push(CandidateUrl {
                    url,
                    keyword: keyword.to_string(),
                    title: Some(item.title).filter(|t| !t.trim().is_empty()),
                    source: item.source,
                }),
                Err(e) => {
                    warn!(link = %item.link, error = %e, "could not resolve news link, skipping");
                }
            }
        }
        Ok(candidates)
    }
}

// ============ Google News link decoding ============

const GOOGLE_NEWS_ORIGIN: &str = "https://news.google.com";
const BATCH_EXECUTE_URL: &str = "https://news.google.com/_/DotsSplashUi/data/batchexecute";

/// Article ids are URL-safe base64 with optional padding and loose trailing bits.
const ARTICLE_ID_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

impl GoogleNewsLister {
    /// Publisher URL behind a Google News article link.
    ///
    /// Links outside `news.google.com/.../articles/` are returned unchanged.
    /// Older ids carry the URL inline; newer ones are looked up through the
    /// `batchexecute` endpoint with the signature embedded in the article page.
    async fn resolve_link(&self, link: &str) -> Result<String> {
        let Some(id) = google_article_id(link) else {
            return Ok(link.to_string());
        };
        if let Some(url) = decode_article_id(id) {
            return Ok(url);
        }

        let page_url = format!("{}/articles/{}", GOOGLE_NEWS_ORIGIN, id);
        let html = self
            .client
            .get(&page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let (signature, timestamp) = decoding_params(&html)
            .with_context(|| format!("no decoding parameters on {}", page_url))?;

        let body = format!(
            "f.req={}",
            urlencoding::encode(&batch_execute_request(id, timestamp, &signature))
        );
        let response = self
            .client
            .post(BATCH_EXECUTE_URL)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_batch_execute(&response)
            .with_context(|| format!("unexpected batchexecute response for article {}", id))
    }
}

/// The article id of a `news.google.com/rss/articles/<id>` link.
fn google_article_id(link: &str) -> Option<&str> {
    let path = link.strip_prefix(GOOGLE_NEWS_ORIGIN)?;
    let id = path
        .strip_prefix("/rss/articles/")
        .or_else(|| path.strip_prefix("/articles/"))?;
    let id = id.split(['?', '#']).next()?;
    (!id.is_empty()).then_some(id)
}

/// Publisher URL stored inline in an older-format article id.
fn decode_article_id(id: &str) -> Option<String> {
    let bytes = ARTICLE_ID_ENGINE.decode(id).ok()?;
    let start = bytes.windows(4).position(|w| w == b"http")?;
    let url: String = bytes[start..]
        .iter()
        .take_while(|b| (0x21..=0x7e).contains(*b))
        .map(|&b| char::from(b))
        .collect();
    (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
}

/// Signature and timestamp attributes from a Google News article page.
fn decoding_params(html: &str) -> Option<(String, i64)> {
    let document = Html::parse_document(html);
    let sel = selector("[data-n-a-sg][data-n-a-ts]")?;
    let el = document.select(&sel).next()?;
    let signature = el.value().attr("data-n-a-sg")?.to_string();
    let timestamp = el.value().attr("data-n-a-ts")?.trim().parse().ok()?;
    Some((signature, timestamp))
}

fn batch_execute_request(id: &str, timestamp: i64, signature: &str) -> String {
    let inner = json!([
        "garturlreq",
        [
            ["X", "X", ["X", "X"], null, null, 1, 1, "US:en", null, 1, null, null, null, null, null, 0, 1],
            "X", "X", 1, [1, 1, 1], 1, 1, null, 0, 0, null, 0
        ],
        id,
        timestamp,
        signature
    ]);
    json!([[["Fbv4je", inner.to_string(), null, "generic"]]]).to_string()
}

/// The decoded URL from a `batchexecute` response body.
///
/// The body is an anti-XSSI prefix, a blank line, then a JSON array whose
/// first entry holds a JSON-encoded `["garturlres", url, ...]` payload.
fn parse_batch_execute(body: &str) -> Option<String> {
    let chunk = body.split("\n\n").nth(1)?;
    let outer: serde_json::Value = serde_json::from_str(chunk.trim()).ok()?;
    let payload: serde_json::Value = serde_json::from_str(outer.get(0)?.get(2)?.as_str()?).ok()?;
    payload.get(1)?.as_str().map(str::to_string)
}

/// One `<item>` of an RSS feed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub source: Option<String>,
}

/// Parse the `<item>` elements of an RSS 2.0 document.
pub fn parse_rss(xml: &str) -> Result<Vec<RssItem>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<RssItem> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"item" {
                    current = Some(RssItem::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(te)) => {
                if let (Some(item), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = te.unescape().unwrap_or_default().into_owned();
                    set_field(item, name, text);
                }
            }
            Ok(Event::CData(cd)) => {
                if let (Some(item), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = String::from_utf8_lossy(&cd).into_owned();
                    set_field(item, name, text);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("invalid RSS at byte {}: {}", reader.buffer_position(), e),
            _ => {}
        }
    }

    Ok(items)
}

fn set_field(item: &mut RssItem, name: &[u8], text: String) {
    match name {
        b"title" => item.title.push_str(&text),
        b"link" => item.link.push_str(text.trim()),
        b"source" => item.source = Some(text),
        _ => {}
    }
}

// ============ Page fetching ============

/// Downloads article pages and extracts their text.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetch failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("fetch {} returned {}", url, status);
        }

        let body = response.text().await?;
        Ok(parse_page(url, &body))
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Extract title, body text, publisher, and publish time from HTML.
///
/// The body is the non-empty paragraphs inside `<article>`, or every
/// paragraph on the page when there is no `<article>` element.
pub fn parse_page(url: &str, html: &str) -> FetchedPage {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "meta[property='og:title']")
        .or_else(|| first_text(&document, "title"))
        .or_else(|| first_text(&document, "h1"))
        .unwrap_or_default();

    let mut paragraphs = collect_paragraphs(&document, "article p");
    if paragraphs.is_empty() {
        paragraphs = collect_paragraphs(&document, "p");
    }

    let source = meta_content(&document, "meta[property='og:site_name']");

    FetchedPage {
        url: url.to_string(),
        title,
        content: paragraphs.join("\n\n"),
        published_at: published_time(&document),
        source,
    }
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn collect_paragraphs(document: &Html, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn published_time(document: &Html) -> Option<DateTime<Utc>> {
    let from_meta = [
        "meta[property='article:published_time']",
        "meta[name='pubdate']",
        "meta[name='publish-date']",
        "meta[itemprop='datePublished']",
    ]
    .iter()
    .filter_map(|css| meta_content(document, css))
    .find_map(|value| parse_datetime(&value));

    from_meta
        .or_else(|| json_ld_published(document))
        .or_else(|| {
            let sel = selector("time[datetime]")?;
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("datetime"))
                .find_map(parse_datetime)
        })
}

fn json_ld_published(document: &Html) -> Option<DateTime<Utc>> {
    let sel = selector("script[type='application/ld+json']")?;
    document.select(&sel).find_map(|script| {
        let raw = script.text().collect::<String>();
        let json: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
        find_date_published(&json)
    })
}

/// `datePublished` may sit at the top level, in an array, or under `@graph`.
fn find_date_published(json: &serde_json::Value) -> Option<DateTime<Utc>> {
    match json {
        serde_json::Value::Array(items) => items.iter().find_map(find_date_published),
        serde_json::Value::Object(obj) => obj
            .get("datePublished")
            .and_then(|v| v.as_str())
            .and_then(parse_datetime)
            .or_else(|| obj.get("@graph").and_then(find_date_published)),
        _ => None,
    }
}

/// Accepts RFC 3339, RFC 2822, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC),
/// and bare dates (midnight UTC).
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}
