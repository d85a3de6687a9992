//! # News Brief
//!
//! A personalised daily news digest.
//!
//! News Brief lists recent articles for a user's keywords, stores them with
//! a title embedding, and once a day picks a relevant but diverse handful
//! (MMR over the user's preference embedding). It then has a chat model
//! write one report in which every passage is tagged with the article it
//! came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Google News │──▶│  Ingestion   │──▶│  SQLite  │
//! │  RSS + web  │   │ fetch+embed  │   │ articles │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                 ┌─────────────────────────┤
//!                 ▼                         ▼
//!        ┌─────────────────┐        ┌──────────────┐
//!        │ retrieve → MMR  │───────▶│   reports    │
//!        │ summarize → LLM │        │ CLI + HTTP   │
//!        └─────────────────┘        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! brief init                                # create database, seed user
//! brief preference set "AI chips and open models"
//! brief ingest                              # pull today's articles
//! brief generate                            # write today's report
//! brief report                              # print it
//! brief serve                               # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite store backend |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama) |
//! | [`llm`] | Chat-completion client for reports, summaries, keywords |
//! | [`news`] | Google News listing and page fetching |
//! | [`progress`] | Ingestion progress reporting |
//! | [`ingest`] | Ingestion pipeline |
//! | [`summarize`] | Summary memoization |
//! | [`synthesize`] | Report synthesis |
//! | [`report`] | Report generation, lookup, catch-up |
//! | [`preference`] | User preference updates |
//! | [`app`] | Wiring from config to services |
//! | [`server`] | HTTP API |
//!
//! Pure algorithms (MMR, retrieval ordering, the provenance parser) and the
//! store and collaborator traits live in the `newsbrief-core` crate.

pub mod app;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod news;
pub mod preference;
pub mod progress;
pub mod report;
pub mod server;
pub mod sqlite_store;
pub mod summarize;
pub mod synthesize;
