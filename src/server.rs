//! HTTP boundary: the sync trigger and health endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::is_authorized;
use crate::rate_provider::RateProvider;
use crate::store::RecordStore;
use crate::sync::{SyncResponse, sync_range};

/// Longest range a single trigger may request, in days.
pub const MAX_RANGE_DAYS: i64 = 370;

/// Handles shared by every request. The provider and store live for the
/// whole server lifetime; each sync invocation still performs its own
/// read-all pass, so no index state survives between requests.
pub struct AppState {
    pub token: String,
    pub provider: Arc<dyn RateProvider>,
    pub store: Arc<dyn RecordStore>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    update_from: Option<String>,
    update_to: Option<String>,
    token: Option<String>,
}

/// Boundary failures, mapped straight onto status codes.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    Store(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::BadRequest(msg) => write!(f, "{msg}"),
            Self::Store(msg) => write!(f, "store failure: {msg}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
        };
        let body = json!({ "ok": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update", get(update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateParams>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<SyncResponse>), ApiError> {
    // Auth first: nothing about the range is computed for strangers.
    if !is_authorized(&state.token, &headers, params.token.as_deref()) {
        return Err(ApiError::Unauthorized);
    }

    let today = Utc::now().date_naive();
    let from = parse_date_param(params.update_from.as_deref(), today)?;
    let to = parse_date_param(params.update_to.as_deref(), today)?;
    validate_range(from, to)?;

    let outcome = sync_range(
        state.provider.as_ref(),
        state.store.as_ref(),
        from,
        to,
        Utc::now(),
    )
    .await
    .map_err(|e| {
        error!("Sync aborted by store failure: {e:#}");
        ApiError::Store(format!("{e:#}"))
    })?;

    let status = if outcome.ok() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(SyncResponse::from(outcome))))
}

fn parse_date_param(raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate, ApiError> {
    match raw {
        None => Ok(default),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("invalid date: {s}"))),
    }
}

pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
    if from > to {
        return Err(ApiError::BadRequest(
            "update_from must be <= update_to".to_string(),
        ));
    }
    if (to - from).num_days() > MAX_RANGE_DAYS {
        return Err(ApiError::BadRequest(format!(
            "Max range is {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

/// Run the server until Ctrl+C.
pub async fn serve(state: Arc<AppState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address: {bind}:{port}"))?;
    let app = app_router(state);

    info!("Listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {e}");
        return;
    }
    info!("Shutdown signal received, stopping");
}
