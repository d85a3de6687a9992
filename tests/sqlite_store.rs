//! SQLite store behaviour against a real database file.

mod common;

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{services, ts, FakeEmbedder, FakeFetcher, FakeLister};
use newsbrief::config::{load_config, Config};
use newsbrief::ingest::spawn_ingestion;
use newsbrief::progress::NoProgress;
use newsbrief::sqlite_store::SqliteStore;
use newsbrief::{app, db, migrate};
use newsbrief_core::models::{DateWindow, NewArticle, NewReport, UserPreference};
use newsbrief_core::services::FetchWindow;
use newsbrief_core::store::{ArticleStore, ReportStore, UserStore};

fn config(tmp: &TempDir) -> Config {
    let path = tmp.path().join("brief.toml");
    std::fs::write(
        &path,
        format!(
            "[db]\npath = \"{}/data/brief.sqlite\"\n\n[server]\nbind = \"127.0.0.1:0\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();
    load_config(&path).unwrap()
}

async fn open(tmp: &TempDir) -> SqliteStore {
    let cfg = config(tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    SqliteStore::new(pool, 2)
}

fn article(url: &str, embedding: Vec<f32>, hour: u32, day: u32) -> NewArticle {
    NewArticle {
        url: url.to_string(),
        title: format!("Title {}", url),
        content: "Body".to_string(),
        published_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        title_embedding: embedding,
        keyword: "chips".to_string(),
        source: Some("Wire".to_string()),
    }
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

#[tokio::test]
async fn test_duplicate_url_is_absorbed() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;

    assert!(store.insert_article(&article("https://n/a", vec![1.0, 0.0], 8, 2)).await.unwrap());
    assert!(!store.insert_article(&article("https://n/a", vec![0.0, 1.0], 9, 2)).await.unwrap());
    assert_eq!(store.article_count().await.unwrap(), 1);

    let existing = store
        .existing_urls(&["https://n/a".to_string(), "https://n/b".to_string()])
        .await
        .unwrap();
    assert_eq!(existing.len(), 1);
    assert!(existing.contains("https://n/a"));
}

#[tokio::test]
async fn test_insert_rejects_wrong_dimension() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    assert!(store
        .insert_article(&article("https://n/a", vec![1.0, 0.0, 0.0], 8, 2))
        .await
        .is_err());
    assert_eq!(store.article_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_nearest_in_window_is_half_open_and_ordered() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;

    store.insert_article(&article("https://n/far", vec![0.0, 1.0], 8, 2)).await.unwrap();
    store.insert_article(&article("https://n/near", vec![0.9, 0.1], 9, 2)).await.unwrap();
    // Exactly at the window end.
    store.insert_article(&article("https://n/end", vec![1.0, 0.0], 0, 3)).await.unwrap();

    let window = DateWindow::around(date(2));
    let found = store.nearest_in_window(&[1.0, 0.0], &window, 10).await.unwrap();
    let urls: Vec<&str> = found.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls, vec!["https://n/near", "https://n/far"]);
    assert_eq!(found[0].title_embedding, vec![0.9, 0.1]);
    assert_eq!(found[0].source.as_deref(), Some("Wire"));

    let limited = store.nearest_in_window(&[1.0, 0.0], &window, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_summary_write_back() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    store.insert_article(&article("https://n/a", vec![1.0, 0.0], 8, 2)).await.unwrap();

    store.set_summary(1, "Short.").await.unwrap();
    let articles = store.get_articles(&[1, 99]).await.unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].summary.as_deref(), Some("Short."));

    assert!(store.set_summary(99, "x").await.is_err());
}

#[tokio::test]
async fn test_report_dates_are_distinct_and_descending() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    store.ensure_user(1, "admin@example.com").await.unwrap();

    for (d, text) in [(2, "first"), (4, "b"), (2, "second"), (3, "c")] {
        store
            .insert_report(&NewReport {
                user_id: 1,
                report_date: date(d),
                created_at: Utc::now(),
                text: text.to_string(),
                article_ids: vec![7, 8],
            })
            .await
            .unwrap();
    }

    assert_eq!(
        store.list_report_dates(1).await.unwrap(),
        vec![date(4), date(3), date(2)]
    );
    assert!(store.list_report_dates(2).await.unwrap().is_empty());

    // Duplicate rows resolve to the lowest id.
    let report = store.find_report(1, date(2)).await.unwrap().unwrap();
    assert_eq!(report.text, "first");
    assert_eq!(report.article_ids, vec![7, 8]);
    assert!(store.find_report(1, date(5)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_preference_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;

    store.ensure_user(1, "admin@example.com").await.unwrap();
    store.ensure_user(1, "other@example.com").await.unwrap();
    let user = store.get_user(1).await.unwrap().unwrap();
    assert_eq!(user.email, "admin@example.com");
    assert!(user.preference.is_none());

    let pref = UserPreference {
        text: "AI chips".to_string(),
        embedding: vec![0.6, 0.8],
        keywords: vec!["AI chips".to_string(), "TSMC".to_string()],
    };
    store.set_preference(1, &pref).await.unwrap();
    assert_eq!(store.get_user(1).await.unwrap().unwrap().preference, Some(pref.clone()));

    let bad = UserPreference {
        embedding: vec![1.0],
        ..pref.clone()
    };
    assert!(store.set_preference(1, &bad).await.is_err());
    assert!(store.set_preference(5, &pref).await.is_err());
    assert!(store.get_user(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    store.insert_article(&article("https://n/a", vec![1.0, 0.0], 8, 2)).await.unwrap();
    migrate::apply(store.pool()).await.unwrap();

    let reopened = app::open_store(&config(&tmp)).await.unwrap();
    assert_eq!(reopened.article_count().await.unwrap(), 1);
    assert!(reopened.get_user(1).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_ingestion_stores_each_url_once() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<SqliteStore> = Arc::new(open(&tmp).await);

    let urls: Vec<String> = (0..20).map(|i| format!("https://n/{}", i)).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let mut fetcher = FakeFetcher::default();
    for url in &urls {
        fetcher = fetcher.page(url, url, Some(ts(2, 8)), "Body");
    }
    let fetcher = Arc::new(fetcher);

    let runs: Vec<_> = (0..2)
        .map(|_| {
            let svc = services(
                store.clone(),
                FakeLister::default().with("chips", &url_refs),
                fetcher.clone(),
                FakeEmbedder::default(),
            );
            spawn_ingestion(
                svc,
                vec!["chips".to_string()],
                FetchWindow::default(),
                CancellationToken::new(),
                Arc::new(NoProgress),
            )
        })
        .collect();

    let mut inserted = 0;
    for run in runs {
        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.inserted + stats.duplicates + stats.already_stored, 20);
        inserted += stats.inserted;
    }
    assert_eq!(inserted, 20);
    assert_eq!(store.article_count().await.unwrap(), 20);
}
