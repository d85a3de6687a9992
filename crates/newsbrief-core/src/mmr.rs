//! Maximal marginal relevance (MMR) selection.
//!
//! Picks a bounded subset of candidates that balances relevance to a query
//! against redundancy with what has already been picked.
//!
//! # Algorithm
//!
//! 1. `relevance(d) = cos(query, d)`.
//! 2. First pick: `argmax relevance(d)`.
//! 3. Each later pick: `argmax λ·relevance(d) + (1 − λ)·(1 − max_s cos(d, s))`
//!    over unselected `d`, where `s` ranges over the picks so far.
//! 4. Stop after `k` picks or when candidates run out.
//!
//! Ties go to the smallest candidate id, so identical inputs always yield
//! the same ordered output.
//!
//! Each candidate carries a running maximum of its similarity to the
//! selected set, updated once per pick, which keeps the whole selection at
//! `O(k·n)` similarity evaluations.

use crate::embedding::cosine_similarity;
use crate::error::VectorError;

/// Default trade-off between relevance and diversity.
pub const DEFAULT_LAMBDA: f32 = 0.8;

/// Select up to `k` candidate ids by MMR over cosine similarity.
///
/// `ids[i]` identifies `embeddings[i]`. Fails on a zero-magnitude or
/// mismatched-length embedding rather than guessing a similarity.
pub fn select(
    ids: &[i64],
    embeddings: &[Vec<f32>],
    query: &[f32],
    lambda: f32,
    k: usize,
) -> Result<Vec<i64>, VectorError> {
    if ids.len() != embeddings.len() {
        return Err(VectorError::CandidateLengthMismatch {
            ids: ids.len(),
            embeddings: embeddings.len(),
        });
    }
    check_lambda(lambda)?;
    if k == 0 || ids.is_empty() {
        return Ok(Vec::new());
    }

    let relevance = embeddings
        .iter()
        .map(|e| cosine_similarity(query, e))
        .collect::<Result<Vec<_>, _>>()?;

    select_with_similarity(ids, &relevance, lambda, k, |a, b| {
        cosine_similarity(&embeddings[a], &embeddings[b])
    })
}

/// The greedy MMR loop over precomputed relevance and a pairwise
/// similarity function.
///
/// `similarity(a, b)` receives candidate indices (positions in `ids`), not
/// ids. It is only ever called with `b` being an already selected
/// candidate.
pub fn select_with_similarity<F>(
    ids: &[i64],
    relevance: &[f32],
    lambda: f32,
    k: usize,
    mut similarity: F,
) -> Result<Vec<i64>, VectorError>
where
    F: FnMut(usize, usize) -> Result<f32, VectorError>,
{
    if ids.len() != relevance.len() {
        return Err(VectorError::CandidateLengthMismatch {
            ids: ids.len(),
            embeddings: relevance.len(),
        });
    }
    check_lambda(lambda)?;

    let n = ids.len();
    let target = k.min(n);

    // Scanning in ascending id order with a strict `>` makes the smallest id
    // win every tie.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| ids[i]);

    let mut taken = vec![false; n];
    let mut max_sim = vec![f32::NEG_INFINITY; n];
    let mut selected = Vec::with_capacity(target);

    while selected.len() < target {
        let first = selected.is_empty();
        let mut best: Option<(usize, f32)> = None;

        for &i in &order {
            if taken[i] {
                continue;
            }
            let score = if first {
                relevance[i]
            } else {
                lambda * relevance[i] + (1.0 - lambda) * (1.0 - max_sim[i])
            };
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }

        let Some((pick, _)) = best else { break };
        taken[pick] = true;
        selected.push(ids[pick]);

        if selected.len() == target {
            break;
        }
        for &i in &order {
            if taken[i] {
                continue;
            }
            let s = similarity(i, pick)?;
            if s > max_sim[i] {
                max_sim[i] = s;
            }
        }
    }

    Ok(selected)
}

fn check_lambda(lambda: f32) -> Result<(), VectorError> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(VectorError::InvalidLambda(lambda));
    }
    Ok(())
}
