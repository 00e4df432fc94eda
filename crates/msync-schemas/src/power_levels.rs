use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Power level that marks a moderator. Nothing else in a room's user map
/// is interpreted.
pub const MODERATOR_LEVEL: i64 = 50;

/// Invite threshold applied to every room this system creates.
pub const INVITE_THRESHOLD: i64 = 70;

pub const DEFAULT_SEND_LEVEL_BIDIRECTIONAL: i64 = 0;
pub const DEFAULT_SEND_LEVEL_RESTRICTED: i64 = 50;

/// Content of a room's `m.room.power_levels` state event.
///
/// The homeserver only accepts whole-document writes, so every field this
/// type does not model is carried in `extra` and written back untouched.
/// Levels may arrive as integers or numeric strings. User entries keep their
/// raw JSON so entries this type never edits are written back as they came.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLevels {
    #[serde(default, deserialize_with = "de_level")]
    pub events_default: i64,
    #[serde(default, deserialize_with = "de_level")]
    pub invite: i64,
    #[serde(default)]
    pub users: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read a power level given as an integer or a numeric string.
pub fn parse_level(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_level<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    let raw = Value::deserialize(de)?;
    parse_level(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("power level is not an integer: {raw}")))
}

impl PowerLevels {
    pub fn level_of(&self, user_id: &str) -> Option<i64> {
        self.users.get(user_id).and_then(parse_level)
    }

    /// Set an explicit level for `user_id`, replacing any existing entry.
    pub fn set_level(&mut self, user_id: &str, level: i64) {
        self.users.insert(user_id.to_string(), Value::from(level));
    }

    pub fn is_moderator(&self, user_id: &str) -> bool {
        self.level_of(user_id) == Some(MODERATOR_LEVEL)
    }

    /// Set `events_default`. Returns `true` when the document changed.
    pub fn apply_events_default(&mut self, level: i64) -> bool {
        if self.events_default == level {
            return false;
        }
        self.events_default = level;
        true
    }

    /// Set the invite threshold. Returns `true` when the document changed.
    pub fn apply_invite_threshold(&mut self, level: i64) -> bool {
        if self.invite == level {
            return false;
        }
        self.invite = level;
        true
    }

    /// Grant moderator level. Returns `true` when the document changed.
    pub fn grant_moderator(&mut self, user_id: &str) -> bool {
        if self.is_moderator(user_id) {
            return false;
        }
        self.set_level(user_id, MODERATOR_LEVEL);
        true
    }

    /// Drop a moderator entry. Only an exact moderator level is removed; any
    /// other explicit level is left alone. Returns `true` when the document changed.
    pub fn revoke_moderator(&mut self, user_id: &str) -> bool {
        if !self.is_moderator(user_id) {
            return false;
        }
        self.users.remove(user_id);
        true
    }
}
