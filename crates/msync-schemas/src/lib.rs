//! msync-schemas
//!
//! Wire types shared by every msync crate: the desired-state payload handed
//! over by the system of record, room alias derivation and the Matrix
//! `m.room.power_levels` document.
//!
//! Pure data. No IO, no homeserver calls.

mod alias;
mod policy;
mod power_levels;

pub use alias::{FullyQualifiedAlias, RoomAlias};
pub use policy::DemotionPolicy;
pub use power_levels::{
    parse_level, PowerLevels, DEFAULT_SEND_LEVEL_BIDIRECTIONAL, DEFAULT_SEND_LEVEL_RESTRICTED,
    INVITE_THRESHOLD, MODERATOR_LEVEL,
};

use serde::{Deserialize, Serialize};

/// A person as known to the system of record.
///
/// `id` is the full Matrix user id (`@localpart:servername`) assigned upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_school_admin: bool,
    #[serde(default)]
    pub is_school_teacher: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "has_allhands_channel")]
    pub has_all_hands_channel: bool,
}

/// One room the person should be a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub id: String,
    /// Room category from the system of record (`course`, `team`, ...).
    #[serde(rename = "type")]
    pub room_type: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `true` when ordinary members may post, `false` for moderator-only posting.
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub is_moderator: bool,
}

impl RoomSpec {
    pub fn alias(&self) -> RoomAlias {
        RoomAlias::for_room(&self.room_type, &self.id)
    }

    /// Level required to post ordinary messages in this room.
    pub fn events_default(&self) -> i64 {
        if self.bidirectional {
            DEFAULT_SEND_LEVEL_BIDIRECTIONAL
        } else {
            DEFAULT_SEND_LEVEL_RESTRICTED
        }
    }

    /// Topic to use when the room has to be created.
    ///
    /// Falls back to a label derived from the room type; `None` lets the
    /// resolver synthesize one from room and school name.
    pub fn topic(&self) -> Option<String> {
        if let Some(d) = self.description.as_deref() {
            if !d.trim().is_empty() {
                return Some(d.to_string());
            }
        }
        match self.room_type.as_str() {
            "team" => Some("Team".to_string()),
            "course" => Some("Kurs".to_string()),
            _ => None,
        }
    }
}

/// The unit of work for one reconciliation pass: one person plus their rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub school: School,
    pub user: Person,
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
}
