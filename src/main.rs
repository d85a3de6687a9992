//! # News Brief CLI (`brief`)
//!
//! The `brief` binary drives ingestion, report generation, and the HTTP
//! API for a single configured user.
//!
//! ## Usage
//!
//! ```bash
//! brief --config ./config/brief.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brief init` | Create the SQLite database and seed the user |
//! | `brief ingest` | List, fetch, embed, and store new articles |
//! | `brief generate` | Generate the report for a date (idempotent) |
//! | `brief catch-up` | Ingest the last week and fill in missing reports |
//! | `brief report` | Print a stored report with its sources |
//! | `brief dates` | List dates that have a report |
//! | `brief preference show\|set` | Read or replace the news preference |
//! | `brief serve` | Start the HTTP server |
//!
//! Logs go to stderr through `tracing`; set `RUST_LOG` to change the level.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use newsbrief::app;
use newsbrief::config::{self, Config};
use newsbrief::ingest::{resolve_keywords, spawn_ingestion};
use newsbrief::preference;
use newsbrief::progress::ProgressMode;
use newsbrief::report::{self, Generation, ReportView};
use newsbrief::server;
use newsbrief_core::services::FetchWindow;

/// News Brief: a personalised daily news digest with per-passage sources.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/brief.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "brief", version, about = "News Brief: a personalised daily news digest")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/brief.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed the configured user.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest new articles for the user's keywords.
    ///
    /// Press Ctrl-C to stop after the article in flight.
    Ingest {
        /// Keyword to search for (repeatable). Defaults to the user's
        /// preference keywords, then `[user].keywords`.
        #[arg(long = "keyword", short = 'k')]
        keywords: Vec<String>,

        /// Relative listing period, e.g. `1d` or `7d`.
        #[arg(long)]
        period: Option<String>,

        /// Only list articles on or after this date (YYYY-MM-DD).
        #[arg(long, requires = "until")]
        since: Option<NaiveDate>,

        /// Only list articles on or before this date (YYYY-MM-DD).
        #[arg(long, requires = "since")]
        until: Option<NaiveDate>,

        /// Maximum URLs per keyword.
        #[arg(long)]
        max_results: Option<usize>,

        /// Progress output on stderr.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,

        #[arg(long)]
        user: Option<i64>,
    },

    /// Generate the report for a date. Does nothing if one exists.
    Generate {
        /// Report date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        user: Option<i64>,
    },

    /// Ingest recent articles, then generate every missing daily report.
    CatchUp {
        /// Number of days, ending today. Defaults to `[digest].catch_up_days`.
        #[arg(long)]
        days: Option<u32>,

        #[arg(long)]
        user: Option<i64>,
    },

    /// Print a stored report with its sources.
    Report {
        /// Report date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        user: Option<i64>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List dates that have a report, most recent first.
    Dates {
        #[arg(long)]
        user: Option<i64>,
    },

    /// Read or replace the news preference.
    Preference {
        #[command(subcommand)]
        action: PreferenceAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum PreferenceAction {
    /// Show the stored preference and its keywords.
    Show {
        #[arg(long)]
        user: Option<i64>,
    },
    /// Replace the preference. Derives a new embedding and keywords.
    Set {
        text: String,
        #[arg(long)]
        user: Option<i64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("newsbrief=info,brief=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            app::open_store(&cfg).await?;
            println!("Database initialized successfully.");
            println!("user: {} <{}>", cfg.user.id, cfg.user.email);
        }
        Commands::Ingest {
            keywords,
            period,
            since,
            until,
            max_results,
            progress,
            user,
        } => {
            let max_results = max_results.unwrap_or(cfg.news.max_results);
            let window = match (since, until) {
                (Some(start), Some(end)) => FetchWindow::between(start, end, max_results),
                _ => FetchWindow::recent(
                    period.as_deref().unwrap_or(&cfg.news.period),
                    max_results,
                ),
            };
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            run_ingest(&cfg, keywords, window, mode, user_id(&cfg, user)).await?;
        }
        Commands::Generate { date, user } => {
            let ctx = app::open_context(&cfg).await?;
            let date = date.unwrap_or_else(today);
            let user_id = user_id(&cfg, user);
            match report::generate_report(&ctx, user_id, date).await? {
                Generation::Created(id) => {
                    println!("report: created");
                    println!("id: {}", id);
                }
                Generation::AlreadyExists(id) => {
                    println!("report: already exists");
                    println!("id: {}", id);
                }
                Generation::NoCandidates => {
                    println!("report: no candidate articles for {}", date);
                }
            }
            println!("date: {}", date);
        }
        Commands::CatchUp { days, user } => {
            let ctx = app::open_context(&cfg).await?;
            let days = days.unwrap_or(cfg.digest.catch_up_days);
            let cancel = cancel_on_ctrl_c();
            let stats = report::catch_up(&ctx, user_id(&cfg, user), today(), days, &cancel).await?;
            println!("ingested: {}", stats.ingest.inserted);
            println!("created: {}", stats.created.len());
            for date in &stats.created {
                println!("  {}", date);
            }
            println!("existing: {}", stats.existing);
            println!("no_candidates: {}", stats.no_candidates);
            if stats.cancelled {
                println!("cancelled: true");
            }
        }
        Commands::Report { date, user, json } => {
            let ctx = app::open_context(&cfg).await?;
            let date = date.unwrap_or_else(today);
            match report::get_report(&ctx, user_id(&cfg, user), date).await? {
                Some(view) if json => println!("{}", serde_json::to_string_pretty(&view)?),
                Some(view) => print_report(&view),
                None => println!("No report for {}.", date),
            }
        }
        Commands::Dates { user } => {
            let ctx = app::open_context(&cfg).await?;
            let dates = report::list_report_dates(&ctx, user_id(&cfg, user)).await?;
            if dates.is_empty() {
                println!("No reports.");
            }
            for date in dates {
                println!("{}", date);
            }
        }
        Commands::Preference { action } => match action {
            PreferenceAction::Show { user } => {
                let ctx = app::open_context(&cfg).await?;
                match preference::get_preference(&ctx, user_id(&cfg, user)).await? {
                    Some(pref) => {
                        println!("text: {}", pref.text);
                        println!("keywords: {}", pref.keywords.join(", "));
                    }
                    None => println!("No preference set."),
                }
            }
            PreferenceAction::Set { text, user } => {
                let ctx = app::open_context(&cfg).await?;
                let pref = preference::update_preference(&ctx, user_id(&cfg, user), &text).await?;
                println!("text: {}", pref.text);
                println!("keywords: {}", pref.keywords.join(", "));
            }
        },
        Commands::Serve => {
            let ctx = app::open_context(&cfg).await?;
            server::run_server(&cfg, ctx).await?;
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn user_id(cfg: &Config, user: Option<i64>) -> i64 {
    user.unwrap_or(cfg.user.id)
}

/// A token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current item");
            child.cancel();
        }
    });
    token
}

async fn run_ingest(
    cfg: &Config,
    explicit: Vec<String>,
    window: FetchWindow,
    mode: ProgressMode,
    user_id: i64,
) -> Result<()> {
    let ctx = app::open_context(cfg).await?;
    let user = ctx.users.get_user(user_id).await?;
    let keywords = resolve_keywords(&explicit, user.as_ref(), &cfg.user.keywords);
    if keywords.is_empty() {
        anyhow::bail!(
            "no keywords: pass --keyword, set a preference, or configure [user].keywords"
        );
    }
    info!(keywords = ?keywords, "starting ingestion");

    let cancel = cancel_on_ctrl_c();
    let handle = spawn_ingestion(ctx.ingest.clone(), keywords, window, cancel, mode.reporter());
    let stats = handle.await.context("ingestion task panicked")??;

    println!("listed: {}", stats.listed);
    println!("inserted: {}", stats.inserted);
    println!("already_stored: {}", stats.already_stored);
    println!("duplicates: {}", stats.duplicates);
    println!("invalid: {}", stats.invalid);
    println!("fetch_failed: {}", stats.fetch_failed);
    if stats.list_failed > 0 {
        println!("list_failed: {}", stats.list_failed);
    }
    if stats.cancelled {
        println!("cancelled: true");
    }
    Ok(())
}

fn print_report(view: &ReportView) {
    println!("date: {}", view.report_date);
    println!("created_at: {}", view.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    println!("sections: {}", view.sections.len());
    println!();
    for section in &view.sections {
        println!("[{}] {}", section.position, section.text.trim());
    }
    println!();
    println!("sources:");
    let mut seen = Vec::new();
    for section in &view.sections {
        if seen.contains(&section.article_id) {
            continue;
        }
        seen.push(section.article_id);
        match &section.article {
            Some(article) => println!("  {}  {}\n      {}", article.id, article.title, article.url),
            None => println!("  {}  (article missing)", section.article_id),
        }
    }
}
