//! Axum router and HTTP handlers for rsv-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can use the bare router.

use std::{convert::Infallible, path::PathBuf, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use futures_util::{Stream, StreamExt};
use rsv_csv::SiteController;
use rsv_reconcile::ReservationStore;
use rsv_schemas::UploadStatus;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};

use crate::{
    api_types::{
        ErrorBody, ErrorsResponse, HealthResponse, LatestTimestampResponse, ResolveResponse,
        SubmitQuery, UploadStatusResponse,
    },
    state::{AppState, BusMsg},
};

const TOKEN_FMT: &str = "%Y%m%d%H%M%S";
const DISPLAY_FMT: &str = "%Y/%m/%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router<S: ReservationStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/v1/health", get(health::<S>))
        .route("/v1/uploads/latest-timestamp", get(latest_timestamp::<S>))
        .route(
            "/v1/uploads/:token",
            get(upload_status::<S>).post(submit_upload::<S>),
        )
        .route("/v1/errors", get(list_errors::<S>))
        .route("/v1/errors/resolve", post(resolve_errors::<S>))
        .route("/v1/stream", get(stream::<S>))
        .with_state(state)
}

fn failure(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/uploads/latest-timestamp
// ---------------------------------------------------------------------------

/// Render a `YYYYMMDDhhmmss` token for display. `None` if malformed.
pub fn render_token(token: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(token, TOKEN_FMT)
        .ok()
        .map(|t| t.format(DISPLAY_FMT).to_string())
}

pub(crate) async fn latest_timestamp<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
) -> Response {
    match st.tracker().latest_by_token().await {
        Ok(latest) => {
            let timestamp = latest.and_then(|u| render_token(&u.token));
            (StatusCode::OK, Json(LatestTimestampResponse { timestamp })).into_response()
        }
        Err(e) => {
            error!(error = %e, "uploads/latest-timestamp");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/uploads/{token}
// ---------------------------------------------------------------------------

pub(crate) async fn upload_status<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Response {
    let rows = match st.tracker().by_token(&token).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "uploads/status");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match rows.as_slice() {
        [only] => (
            StatusCode::OK,
            Json(UploadStatusResponse {
                status: only.status,
                upload_id: Some(only.id),
                path: Some(only.path.clone()),
            }),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(UploadStatusResponse {
                status: UploadStatus::Before,
                upload_id: None,
                path: None,
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/uploads/{token}?sc=<name>&name=<base>
// ---------------------------------------------------------------------------

fn valid_token(token: &str) -> bool {
    token.len() == 14
        && token.bytes().all(|b| b.is_ascii_digit())
        && NaiveDateTime::parse_from_str(token, TOKEN_FMT).is_ok()
}

/// Keep only characters that are safe in a file name.
fn sanitize_base(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .trim_end_matches(".csv")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub(crate) async fn submit_upload<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    Query(q): Query<SubmitQuery>,
    body: Bytes,
) -> Response {
    let Some(sc) = q.sc.as_deref().filter(|s| !s.trim().is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "query parameter 'sc' is required");
    };
    if let Err(e) = SiteController::parse(sc) {
        return failure(StatusCode::BAD_REQUEST, e.to_string());
    }
    if !valid_token(&token) {
        return failure(StatusCode::BAD_REQUEST, "token must be YYYYMMDDhhmmss");
    }

    let base = sanitize_base(q.name.as_deref().unwrap_or("upload"));
    let path: PathBuf = st.upload_dir.join(format!("{base}_{token}.csv"));
    if let Err(e) = save_body(&st.upload_dir, &path, &body).await {
        error!(error = %e, path = %path.display(), "uploads/save");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "failed to store uploaded file");
    }
    info!(token = %token, path = %path.display(), "uploads/submit");

    match st.pipeline.submit_upload(&path, &token, sc).await {
        Ok(Some(outcome)) => {
            st.publish(BusMsg::Ingested(outcome.clone()));
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Ok(None) => failure(StatusCode::SERVICE_UNAVAILABLE, "shutting down; upload not started"),
        Err(e) => {
            error!(error = %format!("{e:#}"), "uploads/ingest");
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

async fn save_body(dir: &std::path::Path, path: &std::path::Path, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, body).await
}

// ---------------------------------------------------------------------------
// GET /v1/errors   POST /v1/errors/resolve
// ---------------------------------------------------------------------------

pub(crate) async fn list_errors<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
) -> Response {
    match st.ledger().list_unresolved().await {
        Ok(errors) => (StatusCode::OK, Json(ErrorsResponse { errors })).into_response(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "errors/list");
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

pub(crate) async fn resolve_errors<S: ReservationStore>(
    State(st): State<Arc<AppState<S>>>,
) -> Response {
    match st.ledger().resolve_all().await {
        Ok(resolved) => {
            info!(resolved, "errors/resolve");
            (StatusCode::OK, Json(ResolveResponse { resolved })).into_response()
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "errors/resolve");
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream
// ---------------------------------------------------------------------------

pub(crate) async fn stream<S: ReservationStore>(State(st): State<Arc<AppState<S>>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_renders_with_slashes_and_colons() {
        assert_eq!(
            render_token("20240105093000").as_deref(),
            Some("2024/01/05 09:30:00")
        );
        assert_eq!(render_token("2024-01-05"), None);
        assert_eq!(render_token(""), None);
    }

    #[test]
    fn tokens_must_be_fourteen_digits() {
        assert!(valid_token("20240105093000"));
        assert!(!valid_token("2024010509300"));
        assert!(!valid_token("../../etc/pass"));
        assert!(!valid_token("20241305093000"));
    }

    #[test]
    fn base_names_are_sanitized() {
        assert_eq!(sanitize_base("bookings.csv"), "bookings");
        assert_eq!(sanitize_base("../x/y"), "xy");
        assert_eq!(sanitize_base("  "), "upload");
    }
}
