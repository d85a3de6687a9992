//! HTTP API over the report service.
//!
//! A thin axum adapter: every handler parses its input, calls one
//! operation from [`crate::report`] or [`crate::preference`], and maps the
//! outcome to JSON. The server serves the single configured user and has
//! no authentication.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/reports/dates` | Dates with a stored report, most recent first |
//! | `GET`  | `/reports/today` | Today's report (UTC) |
//! | `GET`  | `/reports/{date}` | Report for `YYYY-MM-DD` |
//! | `POST` | `/reports/generate` | Generate a report, body `{"date": "YYYY-MM-DD"}` (optional) |
//! | `GET`  | `/preference` | Current preference |
//! | `PUT`  | `/preference` | Replace the preference, body `{"text": "..."}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no report for 2024-05-02" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_preference` (400), `not_found` (404),
//! `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use newsbrief_core::error::ValidationError;

use crate::config::Config;
use crate::preference::{get_preference, update_preference};
use crate::report::{
    generate_report, get_report, list_report_dates, Generation, ReportContext, ReportError,
    ReportView,
};

#[derive(Clone)]
struct AppState {
    ctx: Arc<ReportContext>,
    user_id: i64,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config, ctx: ReportContext) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(ctx, config.user.id);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "HTTP server listening");
    println!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed for in-process tests.
pub fn router(ctx: ReportContext, user_id: i64) -> Router {
    let state = AppState {
        ctx: Arc::new(ctx),
        user_id,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/reports/dates", get(handle_dates))
        .route("/reports/today", get(handle_today))
        .route("/reports/generate", post(handle_generate))
        .route("/reports/{date}", get(handle_report))
        .route("/preference", get(handle_get_preference).put(handle_put_preference))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Map a service error to a status by its type, not its message.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(report_err) = err.downcast_ref::<ReportError>() {
            return match report_err {
                ReportError::UnknownUser(_) => not_found(report_err.to_string()),
                ReportError::NoPreference(_) => AppError {
                    status: StatusCode::BAD_REQUEST,
                    code: "no_preference",
                    message: report_err.to_string(),
                },
            };
        }
        if let Some(validation) = err.downcast_ref::<ValidationError>() {
            return bad_request(validation.to_string());
        }
        error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: format!("{:#}", err),
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| bad_request(format!("invalid date '{}', expected YYYY-MM-DD", raw)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Reports ============

#[derive(Serialize)]
struct DatesResponse {
    dates: Vec<NaiveDate>,
}

async fn handle_dates(State(state): State<AppState>) -> Result<Json<DatesResponse>, AppError> {
    let dates = list_report_dates(&state.ctx, state.user_id).await?;
    Ok(Json(DatesResponse { dates }))
}

async fn report_for(state: &AppState, date: NaiveDate) -> Result<Json<ReportView>, AppError> {
    get_report(&state.ctx, state.user_id, date)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("no report for {}", date)))
}

async fn handle_today(State(state): State<AppState>) -> Result<Json<ReportView>, AppError> {
    report_for(&state, Utc::now().date_naive()).await
}

async fn handle_report(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ReportView>, AppError> {
    let date = parse_date(&date)?;
    report_for(&state, date).await
}

#[derive(Deserialize, Default)]
struct GenerateRequest {
    #[serde(default)]
    date: Option<String>,
}

async fn handle_generate(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Response, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let date = match request.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().date_naive(),
    };

    match generate_report(&state.ctx, state.user_id, date).await? {
        Generation::NoCandidates => Err(not_found(format!("no candidate articles for {}", date))),
        created @ Generation::Created(_) => Ok((StatusCode::CREATED, Json(created)).into_response()),
        existing @ Generation::AlreadyExists(_) => Ok((StatusCode::OK, Json(existing)).into_response()),
    }
}

// ============ Preference ============

#[derive(Serialize)]
struct PreferenceResponse {
    text: String,
    keywords: Vec<String>,
}

async fn handle_get_preference(
    State(state): State<AppState>,
) -> Result<Json<PreferenceResponse>, AppError> {
    let preference = get_preference(&state.ctx, state.user_id)
        .await?
        .ok_or_else(|| not_found("no preference set"))?;
    Ok(Json(PreferenceResponse {
        text: preference.text,
        keywords: preference.keywords,
    }))
}

#[derive(Deserialize)]
struct PreferenceRequest {
    text: String,
}

async fn handle_put_preference(
    State(state): State<AppState>,
    Json(request): Json<PreferenceRequest>,
) -> Result<Json<PreferenceResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let preference = update_preference(&state.ctx, state.user_id, &request.text).await?;
    Ok(Json(PreferenceResponse {
        text: preference.text,
        keywords: preference.keywords,
    }))
}
