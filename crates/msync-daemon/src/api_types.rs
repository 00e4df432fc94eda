//! Request and response types for the msync-daemon HTTP endpoints.
//!
//! No business logic lives here. The sync request body is
//! [`msync_schemas::SyncPayload`] itself.

use chrono::{DateTime, Utc};
use msync_reconcile::SyncReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub syncs_ok: u64,
    pub syncs_failed: u64,
    /// Requests currently being reconciled.
    pub syncs_in_flight: u64,
    pub last_sync_id: Option<Uuid>,
    pub last_sync_at_utc: Option<DateTime<Utc>>,
    /// Error of the most recent failed sync, if the most recent sync failed.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// /v1/sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub sync_id: Uuid,
    pub report: SyncReport,
}

/// Body of a `502` from `/v1/sync`: the homeserver rejected or failed a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailedResponse {
    pub sync_id: Uuid,
    pub error: String,
    /// "not_found" | "conflict" | "transient" | "fatal"
    pub kind: String,
    /// Aliases of the payload rooms that failed; empty when an earlier step failed.
    pub failed_rooms: Vec<String>,
}
