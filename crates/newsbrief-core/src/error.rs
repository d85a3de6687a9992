//! Typed errors for the places where callers need to branch.
//!
//! Everything else in the workspace travels as `anyhow::Error`.

use thiserror::Error;

/// Failures in vector math and MMR selection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VectorError {
    /// Cosine similarity is undefined for a zero-magnitude vector.
    #[error("cosine similarity undefined: zero-magnitude embedding")]
    ZeroMagnitude,

    /// Two vectors that must be compared have different lengths.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vectors with no components cannot be compared.
    #[error("empty embedding")]
    Empty,

    /// The MMR trade-off parameter must lie in `[0, 1]`.
    #[error("mmr lambda must be in [0.0, 1.0], got {0}")]
    InvalidLambda(f32),

    /// The number of candidate ids and embeddings differ.
    #[error("{ids} candidate ids but {embeddings} embeddings")]
    CandidateLengthMismatch { ids: usize, embeddings: usize },
}

/// Reasons a record is rejected at the store boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("article url is empty")]
    EmptyUrl,

    #[error("article has no publish date: {0}")]
    MissingPublishTime(String),

    #[error("article has no content: {0}")]
    EmptyContent(String),

    #[error("title embedding has {actual} dimensions, store expects {expected}")]
    EmbeddingDimension { expected: usize, actual: usize },

    #[error("preference keywords are empty")]
    EmptyKeywords,
}
