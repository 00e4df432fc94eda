use msync_api::{paths, HomeserverApi};
use msync_schemas::{parse_level, DemotionPolicy, PowerLevels};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncStep};
use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeratorChange {
    Granted,
    Revoked,
    Unchanged,
}

impl<A: HomeserverApi> Engine<A> {
    /// Set the level required to post ordinary messages.
    /// Returns `true` when a write was issued.
    pub async fn set_default_send_level(&self, room_id: &str, level: i64) -> Result<bool, SyncError> {
        self.update_power_levels(room_id, |pl| pl.apply_events_default(level))
            .await
    }

    /// Converge `person_id`'s moderator status in `room_id`.
    ///
    /// Demotion follows the configured [`DemotionPolicy`]; under `Preserve`
    /// a moderator is never removed and no request is made.
    pub async fn set_moderator(
        &self,
        room_id: &str,
        person_id: &str,
        should_be_moderator: bool,
    ) -> Result<ModeratorChange, SyncError> {
        if should_be_moderator {
            let granted = self
                .update_power_levels(room_id, |pl| pl.grant_moderator(person_id))
                .await?;
            if !granted {
                debug!(user_id = person_id, room_id, "user is already a moderator");
            }
            return Ok(if granted {
                ModeratorChange::Granted
            } else {
                ModeratorChange::Unchanged
            });
        }

        match self.options.demotion {
            DemotionPolicy::Preserve => {
                debug!(user_id = person_id, room_id, "demotion disabled by policy");
                Ok(ModeratorChange::Unchanged)
            }
            DemotionPolicy::Enforce => {
                let revoked = self
                    .update_power_levels(room_id, |pl| pl.revoke_moderator(person_id))
                    .await?;
                Ok(if revoked {
                    ModeratorChange::Revoked
                } else {
                    ModeratorChange::Unchanged
                })
            }
        }
    }

    /// `person_id`'s explicit power level from the room's full state.
    /// `None` when the person has no entry.
    pub async fn user_power_level(&self, room_id: &str, person_id: &str) -> Result<Option<i64>, SyncError> {
        let state = self
            .api
            .get(&paths::room_state(room_id))
            .await
            .map_err(|e| SyncError::step(SyncStep::ReadRoomState, room_id, e))?;

        let level = state
            .as_array()
            .into_iter()
            .flatten()
            .find(|ev| {
                ev.get("type").and_then(Value::as_str) == Some("m.room.power_levels")
                    && ev.get("state_key").and_then(Value::as_str).unwrap_or("").is_empty()
            })
            .and_then(|ev| ev.pointer("/content/users"))
            .and_then(|users| users.get(person_id))
            .and_then(parse_level);
        Ok(level)
    }

    pub async fn power_levels(&self, room_id: &str) -> Result<PowerLevels, SyncError> {
        let v = self
            .api
            .get(&paths::power_levels(room_id))
            .await
            .map_err(|e| SyncError::step(SyncStep::ReadPowerLevels, room_id, e))?;
        serde_json::from_value(v).map_err(|e| {
            SyncError::step(
                SyncStep::ReadPowerLevels,
                room_id,
                msync_api::ApiError::decode(format!("power levels decode failed: {e}")),
            )
        })
    }

    /// Read-modify-write of the room's power levels under the room lock.
    ///
    /// `apply` returns whether it changed the document; nothing is written
    /// when it did not. Returns `true` when a write was issued.
    pub(crate) async fn update_power_levels<F>(&self, room_id: &str, apply: F) -> Result<bool, SyncError>
    where
        F: FnOnce(&mut PowerLevels) -> bool,
    {
        let _guard = self.locks.lock(room_id).await;

        let mut pl = self.power_levels(room_id).await?;
        if !apply(&mut pl) {
            return Ok(false);
        }

        let body = serde_json::to_value(&pl).map_err(|e| {
            SyncError::step(
                SyncStep::WritePowerLevels,
                room_id,
                msync_api::ApiError::decode(format!("power levels encode failed: {e}")),
            )
        })?;
        self.api
            .put(&paths::power_levels(room_id), &body)
            .await
            .map_err(|e| {
                error!(room_id, error = %e, "power levels update failed");
                SyncError::step(SyncStep::WritePowerLevels, room_id, e)
            })?;
        info!(
            room_id,
            events_default = pl.events_default,
            invite = pl.invite,
            "power levels updated"
        );
        Ok(true)
    }
}
