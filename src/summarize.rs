//! Summary memoization for selected articles.

use anyhow::{Context, Result};
use tracing::info;

use newsbrief_core::models::Article;
use newsbrief_core::services::Summarizer;
use newsbrief_core::store::ArticleStore;

/// Give every article in `articles` a summary.
///
/// Articles that already have one are left untouched. Missing summaries
/// are generated, written back to the store, and set on the in-memory
/// record. The first failure aborts with the article id attached.
///
/// Returns the number of summaries generated.
pub async fn ensure_summaries(
    store: &dyn ArticleStore,
    summarizer: &dyn Summarizer,
    articles: &mut [Article],
) -> Result<usize> {
    let mut generated = 0;
    for article in articles.iter_mut().filter(|a| a.summary.is_none()) {
        let summary = summarizer
            .summarize(&article.title, &article.content)
            .await
            .with_context(|| format!("failed to summarize article {}", article.id))?;
        store
            .set_summary(article.id, &summary)
            .await
            .with_context(|| format!("failed to store summary for article {}", article.id))?;
        article.summary = Some(summary);
        generated += 1;
    }
    if generated > 0 {
        info!(generated, "summaries generated");
    }
    Ok(generated)
}
