use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema on `pool`. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL,
            preference_text TEXT,
            preference_keywords TEXT NOT NULL DEFAULT '[]',
            preference_embedding BLOB
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create articles table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            published_at INTEGER NOT NULL,
            summary TEXT,
            title_embedding BLOB NOT NULL,
            keyword TEXT NOT NULL,
            source TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Reports carry no UNIQUE(user_id, report_date); generation checks first.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            report_date TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            text TEXT NOT NULL,
            article_ids TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reports_user_date ON reports(user_id, report_date DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
