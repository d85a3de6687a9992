//! # News Brief Core
//!
//! Shared, I/O-free logic for News Brief: data models, vector math, the
//! maximal-marginal-relevance selector, the provenance marker parser,
//! candidate retrieval, and the store and collaborator traits that the
//! application crate implements.
//!
//! This crate contains no sqlx, HTTP client, or runtime dependencies.
//! Everything that talks to the outside world is reached through the
//! traits in [`store`] and [`services`], so the whole pipeline can be
//! driven by deterministic fakes in tests.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Article`, `NewArticle`, `Report`, `UserPreference`, `DateWindow` |
//! | [`embedding`] | Embedding trait, cosine similarity, BLOB encoding |
//! | [`mmr`] | Diversity-aware selection |
//! | [`context`] | `<context id="N">` marker parser |
//! | [`retrieve`] | Date-windowed nearest-neighbour candidates |
//! | [`services`] | News listing, page fetch, generation, summarization traits |
//! | [`store`] | Article, report, and user store traits plus an in-memory store |

pub mod context;
pub mod embedding;
pub mod error;
pub mod mmr;
pub mod models;
pub mod retrieve;
pub mod services;
pub mod store;

pub use error::{ValidationError, VectorError};
