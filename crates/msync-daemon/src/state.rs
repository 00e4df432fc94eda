//! Shared runtime state for msync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The engine is shared by
//! every request, so its per-room locks serialize power-level updates across
//! concurrent syncs.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::{Context, Result};
use msync_api::{HomeserverApi, HttpHomeserverClient};
use msync_config::LoadedConfig;
use msync_reconcile::{Engine, EngineOptions};
use tokio::sync::RwLock;

use crate::api_types::StatusSnapshot;

/// Engine over a type-erased homeserver, so tests can plug in a fake.
pub type SharedEngine = Engine<Arc<dyn HomeserverApi>>;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub engine: Arc<SharedEngine>,
    /// Counters surfaced by GET /v1/status.
    pub status: Arc<RwLock<StatusSnapshot>>,
}

impl AppState {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            build: BuildInfo {
                service: "msync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine: Arc::new(engine),
            status: Arc::new(RwLock::new(StatusSnapshot::default())),
        }
    }

    /// State backed by the configured homeserver.
    pub fn from_config(loaded: &LoadedConfig) -> Result<Self> {
        let settings = loaded.settings()?;
        let secrets = msync_config::resolve_secrets(&loaded.config_json)?;
        let client = HttpHomeserverClient::from_settings(&settings, &secrets)
            .context("homeserver client setup failed")?;
        let api: Arc<dyn HomeserverApi> = Arc::new(client);
        Ok(Self::new(Engine::new(api, EngineOptions::from_settings(&settings))))
    }
}

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Mark process start. Idempotent.
pub fn mark_started() {
    STARTED.get_or_init(Instant::now);
}

pub fn uptime_secs() -> u64 {
    STARTED.get_or_init(Instant::now).elapsed().as_secs()
}
