//! msync-reconcile
//!
//! Reconciliation engine: converges one person's account, rooms, membership
//! and power levels on the homeserver towards the desired state handed over
//! by the system of record.
//!
//! - Remote state is re-read on every pass; nothing is stored locally.
//! - Every operation is idempotent: a converged room receives no writes.
//! - Power-level read-modify-write is serialized per room ([`RoomLocks`]).
//! - Every remote call is attempted once. Retry policy belongs to the caller.

mod error;
mod locks;
mod membership;
mod orchestrator;
mod permissions;
mod report;
mod room;
mod user;

pub use error::{RoomFailure, SyncError, SyncStep};
pub use locks::RoomLocks;
pub use membership::JoinOutcome;
pub use permissions::ModeratorChange;
pub use report::{SyncAction, SyncReport};
pub use room::ResolvedRoom;

use msync_api::HomeserverApi;
use msync_config::settings::{DEFAULT_ANNOUNCEMENT_ROOM_NAME, DEFAULT_STAFF_ROOM_NAME};
use msync_config::SyncSettings;
use msync_schemas::DemotionPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Server name embedded in fully-qualified room aliases.
    pub servername: String,
    pub announcement_room_name: String,
    pub staff_room_name: String,
    pub demotion: DemotionPolicy,
}

impl EngineOptions {
    pub fn new(servername: impl Into<String>) -> Self {
        Self {
            servername: servername.into(),
            announcement_room_name: DEFAULT_ANNOUNCEMENT_ROOM_NAME.to_string(),
            staff_room_name: DEFAULT_STAFF_ROOM_NAME.to_string(),
            demotion: DemotionPolicy::default(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            servername: settings.servername.clone(),
            announcement_room_name: settings.announcement_room_name.clone(),
            staff_room_name: settings.staff_room_name.clone(),
            demotion: settings.demotion,
        }
    }

    pub fn with_demotion(mut self, demotion: DemotionPolicy) -> Self {
        self.demotion = demotion;
        self
    }
}

/// The reconciliation engine.
///
/// Cheap to share behind an `Arc`: concurrent passes for different people
/// may run against one engine, and its [`RoomLocks`] keep their power-level
/// updates to a shared room from overwriting each other.
pub struct Engine<A> {
    api: A,
    options: EngineOptions,
    locks: RoomLocks,
}

impl<A: HomeserverApi> Engine<A> {
    pub fn new(api: A, options: EngineOptions) -> Self {
        Self {
            api,
            options,
            locks: RoomLocks::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}
