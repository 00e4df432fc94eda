//! Axum router and all HTTP handlers for msync-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use msync_reconcile::SyncError;
use msync_schemas::SyncPayload;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api_types::{HealthResponse, SyncFailedResponse, SyncResponse},
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs` attaches
/// them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/sync", post(sync_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
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
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/sync
// ---------------------------------------------------------------------------

/// Reconcile one person. Malformed bodies never reach the engine: the `Json`
/// extractor answers 400/422 on its own.
///
/// The sync runs in its own task. A client that hangs up does not cancel it,
/// and the status counters are always settled when it ends.
pub(crate) async fn sync_handler(
    State(st): State<Arc<AppState>>,
    Json(payload): Json<SyncPayload>,
) -> Response {
    let sync_id = Uuid::new_v4();
    info!(%sync_id, user_id = %payload.user.id, rooms = payload.rooms.len(), "sync requested");

    let task = tokio::spawn(run_sync(st, sync_id, payload));
    match task.await {
        Ok(resp) => resp,
        Err(e) => {
            error!(%sync_id, error = %e, "sync task did not complete");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn run_sync(st: Arc<AppState>, sync_id: Uuid, payload: SyncPayload) -> Response {
    st.status.write().await.syncs_in_flight += 1;
    let result = st.engine.sync(&payload).await;

    let mut status = st.status.write().await;
    status.syncs_in_flight = status.syncs_in_flight.saturating_sub(1);
    status.last_sync_id = Some(sync_id);
    status.last_sync_at_utc = Some(Utc::now());

    match result {
        Ok(report) => {
            status.syncs_ok += 1;
            status.last_error = None;
            drop(status);
            info!(%sync_id, actions = report.actions.len(), "sync ok");
            (StatusCode::OK, Json(SyncResponse { sync_id, report })).into_response()
        }
        Err(e) => {
            status.syncs_failed += 1;
            status.last_error = Some(e.to_string());
            drop(status);
            warn!(%sync_id, kind = %e.kind(), error = %e, "sync failed");
            (StatusCode::BAD_GATEWAY, Json(failure_body(sync_id, &e))).into_response()
        }
    }
}

fn failure_body(sync_id: Uuid, e: &SyncError) -> SyncFailedResponse {
    let failed_rooms = match e {
        SyncError::Rooms { failures } => failures.iter().map(|f| f.alias.clone()).collect(),
        SyncError::Step { .. } => Vec::new(),
    };
    SyncFailedResponse {
        sync_id,
        error: e.to_string(),
        kind: e.kind().as_str().to_string(),
        failed_rooms,
    }
}
