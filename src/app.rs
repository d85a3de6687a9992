//! Wiring from configuration to a ready [`ReportContext`].

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use newsbrief_core::store::UserStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::ingest::IngestServices;
use crate::llm::create_chat_services;
use crate::migrate;
use crate::news::{GoogleNewsLister, HttpPageFetcher};
use crate::report::{DigestSettings, ReportContext};
use crate::sqlite_store::SqliteStore;

/// Open the database, migrating it if needed, and seed the configured user.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let dims = config.embedding.dims.unwrap_or(0);
    let store = Arc::new(SqliteStore::new(pool, dims));
    store.ensure_user(config.user.id, &config.user.email).await?;
    Ok(store)
}

/// [`open_store`] plus every collaborator named in `config`.
pub async fn open_context(config: &Config) -> Result<ReportContext> {
    let store = open_store(config).await?;

    let embedder = create_provider(&config.embedding)?;
    let chat = create_chat_services(&config.llm)?;
    let ingest = IngestServices {
        lister: Arc::new(GoogleNewsLister::new(&config.news)?),
        fetcher: Arc::new(HttpPageFetcher::new(&config.news)?),
        embedder,
        store: store.clone(),
    };

    debug!(
        db = %config.db.path.display(),
        embedding = %config.embedding.provider,
        llm = %config.llm.provider,
        "context opened"
    );

    Ok(ReportContext {
        articles: store.clone(),
        reports: store.clone(),
        users: store,
        generator: chat.generator,
        summarizer: chat.summarizer,
        keywords: chat.keywords,
        ingest,
        settings: DigestSettings::from_config(config),
    })
}
