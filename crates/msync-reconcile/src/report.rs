use chrono::{DateTime, Utc};
use serde::Serialize;

/// A change the engine made on the homeserver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    UserCreated { user_id: String },
    RoomCreated { alias: String, room_id: String },
    RoomRenamed { room_id: String, name: String },
    InviteThresholdSet { room_id: String, level: i64 },
    Invited { room_id: String, user_id: String },
    Joined { room_id: String, user_id: String },
    EventsDefaultSet { room_id: String, level: i64 },
    ModeratorGranted { room_id: String, user_id: String },
    ModeratorRevoked { room_id: String, user_id: String },
}

impl SyncAction {
    /// `true` for changes that only happen when remote state had drifted.
    /// Joins are re-issued on every pass and do not count.
    pub fn is_correction(&self) -> bool {
        !matches!(self, SyncAction::Invited { .. } | SyncAction::Joined { .. })
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub user_id: String,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: Option<DateTime<Utc>>,
    pub actions: Vec<SyncAction>,
}

impl SyncReport {
    pub fn start(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            started_at_utc: Utc::now(),
            finished_at_utc: None,
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: SyncAction) {
        self.actions.push(action);
    }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = SyncAction>) {
        self.actions.extend(actions);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at_utc = Some(Utc::now());
        self
    }

    pub fn corrections(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_correction())
    }

    /// `true` when remote state was already converged.
    pub fn is_converged(&self) -> bool {
        self.corrections().next().is_none()
    }
}
