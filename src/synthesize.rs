//! Report synthesis from selected, summarized articles.
//!
//! Articles are shown to the generator by local ordinal (`0..n`), never
//! by database id. The ordinal list is what maps a `<context id="…">`
//! marker back to its article.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use newsbrief_core::context::{parse_report, ParseFailure};
use newsbrief_core::models::{Article, ReportSection};
use newsbrief_core::services::{ReportGenerator, SynthesisPrompt};

/// A generated report before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub text: String,
    /// Global article ids indexed by local ordinal.
    pub article_ids: Vec<i64>,
    pub sections: Vec<ReportSection>,
    pub skipped: Vec<ParseFailure>,
}

/// Render articles as `ID / Title / Text` blocks separated by blank lines.
pub fn format_articles(articles: &[Article]) -> String {
    articles
        .iter()
        .enumerate()
        .map(|(ordinal, article)| {
            format!(
                "ID: {}\nTitle: {}\nText: {}",
                ordinal,
                article.title,
                article.summary.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ask the generator for one report over `articles`.
pub async fn synthesize(
    generator: &dyn ReportGenerator,
    date: NaiveDate,
    articles: &[Article],
) -> Result<Synthesis> {
    let prompt = SynthesisPrompt {
        date,
        articles: format_articles(articles),
    };
    let text = generator
        .generate(&prompt)
        .await
        .with_context(|| format!("report synthesis failed for {}", date))?;

    let article_ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
    let parsed = parse_report(&text, &article_ids);

    if !parsed.skipped.is_empty() {
        warn!(
            %date,
            skipped = parsed.skipped.len(),
            first = %parsed.skipped[0],
            "report contains markers that could not be linked"
        );
    }
    info!(%date, sections = parsed.sections.len(), articles = article_ids.len(), "report synthesized");

    Ok(Synthesis {
        text,
        article_ids,
        sections: parsed.sections,
        skipped: parsed.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    fn article(id: i64, title: &str, summary: &str) -> Article {
        Article {
            id,
            url: format!("https://example.com/{}", id),
            title: title.to_string(),
            content: "body".to_string(),
            published_at: Utc::now(),
            summary: Some(summary.to_string()),
            title_embedding: vec![1.0],
            keyword: "k".to_string(),
            source: None,
        }
    }

    #[test]
    fn test_format_uses_local_ordinals() {
        let text = format_articles(&[article(40, "A", "sa"), article(7, "B", "sb")]);
        assert_eq!(text, "ID: 0\nTitle: A\nText: sa\n\nID: 1\nTitle: B\nText: sb");
    }

    struct Canned(&'static str);

    #[async_trait]
    impl ReportGenerator for Canned {
        async fn generate(&self, prompt: &SynthesisPrompt) -> Result<String> {
            assert!(prompt.articles.starts_with("ID: 0"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_sections_map_to_global_ids() {
        let generator = Canned(r#"<context id="1">Second.</context> <context id="0">First.</context> <context id="5">Ghost.</context>"#);
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let synthesis = synthesize(&generator, date, &[article(40, "A", "sa"), article(7, "B", "sb")])
            .await
            .unwrap();
        assert_eq!(synthesis.article_ids, vec![40, 7]);
        let ids: Vec<i64> = synthesis.sections.iter().map(|s| s.article_id).collect();
        assert_eq!(ids, vec![7, 40]);
        assert_eq!(synthesis.skipped.len(), 1);
    }
}
