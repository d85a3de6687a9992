//! User preference management.
//!
//! A preference is free text. Setting one derives its embedding (used for
//! retrieval and MMR relevance) and its search keywords (used for
//! ingestion) in the same call, so the three never drift apart.

use anyhow::{bail, Context, Result};
use tracing::info;

use newsbrief_core::error::ValidationError;
use newsbrief_core::models::UserPreference;

use crate::report::{ReportContext, ReportError};

/// Replace the preference of `user_id` with `text`.
pub async fn update_preference(
    ctx: &ReportContext,
    user_id: i64,
    text: &str,
) -> Result<UserPreference> {
    let text = text.trim();
    if text.is_empty() {
        bail!("preference text is empty");
    }
    if ctx.users.get_user(user_id).await?.is_none() {
        return Err(ReportError::UnknownUser(user_id).into());
    }

    let embedding = ctx
        .ingest
        .embedder
        .embed(text)
        .await
        .context("failed to embed preference")?;
    let keywords = ctx
        .keywords
        .extract_keywords(text)
        .await
        .context("failed to extract preference keywords")?;
    if keywords.is_empty() {
        return Err(ValidationError::EmptyKeywords.into());
    }

    let preference = UserPreference {
        text: text.to_string(),
        embedding,
        keywords,
    };
    ctx.users.set_preference(user_id, &preference).await?;

    info!(user_id, keywords = ?preference.keywords, "preference updated");
    Ok(preference)
}

/// The stored preference of `user_id`, `None` when never set.
pub async fn get_preference(ctx: &ReportContext, user_id: i64) -> Result<Option<UserPreference>> {
    match ctx.users.get_user(user_id).await? {
        Some(user) => Ok(user.preference),
        None => Err(ReportError::UnknownUser(user_id).into()),
    }
}
