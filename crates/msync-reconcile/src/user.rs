use msync_api::{paths, HomeserverApi};
use msync_schemas::Person;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncStep};
use crate::Engine;

/// Password set on created accounts. Nobody logs in with it: access goes
/// through admin calls or the shared-secret login.
fn throwaway_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl<A: HomeserverApi> Engine<A> {
    /// Create `person`'s account unless it already exists.
    ///
    /// Only a 404 from the lookup leads to creation; any other failure is
    /// returned so a flaky lookup cannot trigger a duplicate create.
    /// Returns `true` when the account was created.
    pub async fn ensure_user(&self, person: &Person) -> Result<bool, SyncError> {
        match self.api.get(&paths::admin_user(&person.id)).await {
            Ok(_) => {
                debug!(user_id = %person.id, "user found");
                Ok(false)
            }
            Err(e) if e.is_not_found() => {
                debug!(user_id = %person.id, "user not there yet");
                self.create_user(person).await?;
                Ok(true)
            }
            Err(e) => {
                error!(user_id = %person.id, error = %e, "user lookup failed");
                Err(SyncError::step(SyncStep::LookupUser, &person.id, e))
            }
        }
    }

    async fn create_user(&self, person: &Person) -> Result<(), SyncError> {
        let threepids = match person.email.as_deref() {
            Some(address) if !address.trim().is_empty() => {
                vec![json!({ "medium": "email", "address": address })]
            }
            _ => Vec::new(),
        };
        let body = json!({
            "password": throwaway_password(),
            "displayname": person.display_name,
            "threepids": threepids,
            "admin": false,
            "deactivated": false,
        });

        self.api
            .put(&paths::admin_user(&person.id), &body)
            .await
            .map_err(|e| {
                error!(user_id = %person.id, error = %e, "user create failed");
                SyncError::step(SyncStep::CreateUser, &person.id, e)
            })?;

        info!(user_id = %person.id, "user created");
        Ok(())
    }
}
