use msync_api::{paths, ApiError, HomeserverApi};
use msync_schemas::{FullyQualifiedAlias, INVITE_THRESHOLD};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncStep};
use crate::Engine;

/// Result of [`Engine::resolve_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoom {
    pub room_id: String,
    pub created: bool,
    /// Display name had drifted and was corrected.
    pub renamed: bool,
    /// Invite threshold was raised on the freshly created room.
    pub invite_threshold_set: bool,
}

fn room_id_from(v: &Value) -> Result<String, ApiError> {
    v.get("room_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::decode(format!("response carries no room_id: {v}")))
}

pub(crate) fn default_topic(display_name: &str, school_name: &str) -> String {
    format!("Kanal für {display_name} ({school_name})")
}

impl<A: HomeserverApi> Engine<A> {
    /// Room id for `fq_alias`, creating the room when the alias is unknown.
    ///
    /// An existing room gets its display name corrected if it drifted. A new
    /// room is private, named `display_name`, and only members above the
    /// invite threshold may invite others.
    pub async fn resolve_room(
        &self,
        fq_alias: &FullyQualifiedAlias,
        display_name: &str,
        school_name: &str,
        topic: Option<&str>,
    ) -> Result<ResolvedRoom, SyncError> {
        let lookup = self
            .api
            .get(&paths::directory_room(&fq_alias.path_segment()))
            .await;

        match lookup {
            Ok(v) => {
                let room_id = room_id_from(&v)
                    .map_err(|e| SyncError::step(SyncStep::LookupRoom, fq_alias.to_string(), e))?;
                debug!(alias = %fq_alias, room_id = %room_id, "room found");
                let renamed = self.ensure_room_name(&room_id, display_name).await?;
                Ok(ResolvedRoom {
                    room_id,
                    created: false,
                    renamed,
                    invite_threshold_set: false,
                })
            }
            Err(e) if e.is_not_found() => {
                debug!(alias = %fq_alias, "room not found");
                self.create_room(fq_alias, display_name, school_name, topic)
                    .await
            }
            Err(e) => {
                error!(alias = %fq_alias, error = %e, "room lookup failed");
                Err(SyncError::step(SyncStep::LookupRoom, fq_alias.to_string(), e))
            }
        }
    }

    /// Write `display_name` unless the room already carries it.
    /// Returns `true` when a write was issued.
    pub async fn ensure_room_name(&self, room_id: &str, display_name: &str) -> Result<bool, SyncError> {
        let current = match self.api.get(&paths::room_name(room_id)).await {
            Ok(v) => v.get("name").and_then(Value::as_str).map(str::to_string),
            // No name event yet.
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(SyncError::step(SyncStep::ReadRoomName, room_id, e)),
        };

        if current.as_deref() == Some(display_name) {
            return Ok(false);
        }

        self.api
            .put(&paths::room_name(room_id), &json!({ "name": display_name }))
            .await
            .map_err(|e| {
                error!(room_id, error = %e, "room name update failed");
                SyncError::step(SyncStep::WriteRoomName, room_id, e)
            })?;
        info!(room_id, name = display_name, previous = ?current, "room name updated");
        Ok(true)
    }

    async fn create_room(
        &self,
        fq_alias: &FullyQualifiedAlias,
        display_name: &str,
        school_name: &str,
        topic: Option<&str>,
    ) -> Result<ResolvedRoom, SyncError> {
        let topic = topic
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_topic(display_name, school_name));

        let body = json!({
            "preset": "private_chat",
            "room_alias_name": fq_alias.alias().as_str(),
            "name": display_name,
            "topic": topic,
            "creation_content": {},
        });

        let created = self
            .api
            .post(&paths::create_room(), &body)
            .await
            .and_then(|v| room_id_from(&v))
            .map_err(|e| {
                error!(alias = %fq_alias, error = %e, "room create failed");
                SyncError::step(SyncStep::CreateRoom, fq_alias.to_string(), e)
            })?;
        info!(alias = %fq_alias, room_id = %created, "room created");

        let invite_threshold_set = self.update_power_levels(&created, |pl| {
            pl.apply_invite_threshold(INVITE_THRESHOLD)
        })
        .await?;

        Ok(ResolvedRoom {
            room_id: created,
            created: true,
            renamed: false,
            invite_threshold_set,
        })
    }
}
