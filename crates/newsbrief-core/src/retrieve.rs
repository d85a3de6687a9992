//! Date-windowed candidate retrieval.
//!
//! Candidates for a report are the articles published inside the window,
//! nearest to the user's preference embedding first. The ordering helper
//! [`rank_by_distance`] is shared by store backends that cannot push the
//! distance computation into their query engine.

use std::cmp::Ordering;

use anyhow::Result;

use crate::embedding::l2_distance;
use crate::error::VectorError;
use crate::models::{Article, DateWindow};
use crate::store::ArticleStore;

/// Default cap on candidates handed to the selector.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 1000;

/// Fetch up to `limit` candidates for `query` inside `window`.
///
/// An empty window yields an empty vec, not an error.
pub async fn retrieve_candidates<S>(
    store: &S,
    query: &[f32],
    window: &DateWindow,
    limit: usize,
) -> Result<Vec<Article>>
where
    S: ArticleStore + ?Sized,
{
    if limit == 0 || window.start >= window.end {
        return Ok(Vec::new());
    }
    store.nearest_in_window(query, window, limit).await
}

/// Keep the articles inside `window`, order them ascending by L2 distance
/// to `query` (ties by ascending id), and truncate to `limit`.
///
/// A stored embedding whose length differs from the query is an error.
pub fn rank_by_distance(
    articles: Vec<Article>,
    query: &[f32],
    window: &DateWindow,
    limit: usize,
) -> Result<Vec<Article>, VectorError> {
    let mut scored = Vec::with_capacity(articles.len());
    for article in articles {
        if !window.contains(article.published_at) {
            continue;
        }
        let distance = l2_distance(query, &article.title_embedding)?;
        scored.push((distance, article));
    }

    scored.sort_by(|(da, a), (db, b)| {
        da.partial_cmp(db)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    scored.truncate(limit);

    Ok(scored.into_iter().map(|(_, article)| article).collect())
}
