use msync_api::{paths, HomeserverApi};
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncStep};
use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The invite was accepted. `false` covers "already invited/joined" and
    /// any other swallowed invite failure.
    pub invited: bool,
}

impl<A: HomeserverApi> Engine<A> {
    /// Invite `person_id` from the sync identity, then force-join them.
    ///
    /// No membership pre-check: both calls are issued on every pass. A failed
    /// invite is swallowed (the person is usually already a member); a failed
    /// join is returned.
    pub async fn join_person(&self, person_id: &str, room_id: &str) -> Result<JoinOutcome, SyncError> {
        let body = json!({ "user_id": person_id });

        let invited = match self.api.post(&paths::invite(room_id), &body).await {
            Ok(_) => {
                info!(user_id = person_id, room_id, "user invited");
                true
            }
            Err(e) => {
                debug!(user_id = person_id, room_id, kind = %e.kind, error = %e, "invite skipped");
                false
            }
        };

        self.api
            .post(&paths::admin_join(room_id), &body)
            .await
            .map_err(|e| {
                error!(user_id = person_id, room_id, error = %e, "join failed");
                SyncError::step(SyncStep::Join, room_id, e)
            })?;
        info!(user_id = person_id, room_id, "user joined");

        Ok(JoinOutcome { invited })
    }
}
