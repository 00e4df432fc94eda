use futures_util::future::join_all;
use msync_api::HomeserverApi;
use msync_schemas::{
    Person, RoomAlias, RoomSpec, SyncPayload, DEFAULT_SEND_LEVEL_RESTRICTED, MODERATOR_LEVEL,
};
use tracing::{error, info, info_span, Instrument};

use crate::error::{RoomFailure, SyncError};
use crate::membership::JoinOutcome;
use crate::permissions::ModeratorChange;
use crate::report::{SyncAction, SyncReport};
use crate::room::ResolvedRoom;
use crate::Engine;

fn resolved_actions(alias: &RoomAlias, name: &str, room: &ResolvedRoom) -> Vec<SyncAction> {
    let mut out = Vec::new();
    if room.created {
        out.push(SyncAction::RoomCreated {
            alias: alias.as_str().to_string(),
            room_id: room.room_id.clone(),
        });
    }
    if room.renamed {
        out.push(SyncAction::RoomRenamed {
            room_id: room.room_id.clone(),
            name: name.to_string(),
        });
    }
    if room.invite_threshold_set {
        out.push(SyncAction::InviteThresholdSet {
            room_id: room.room_id.clone(),
            level: msync_schemas::INVITE_THRESHOLD,
        });
    }
    out
}

fn join_actions(room_id: &str, user_id: &str, outcome: JoinOutcome) -> Vec<SyncAction> {
    let mut out = Vec::with_capacity(2);
    if outcome.invited {
        out.push(SyncAction::Invited {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        });
    }
    out.push(SyncAction::Joined {
        room_id: room_id.to_string(),
        user_id: user_id.to_string(),
    });
    out
}

fn moderator_action(room_id: &str, user_id: &str, change: ModeratorChange) -> Option<SyncAction> {
    let room_id = room_id.to_string();
    let user_id = user_id.to_string();
    match change {
        ModeratorChange::Granted => Some(SyncAction::ModeratorGranted { room_id, user_id }),
        ModeratorChange::Revoked => Some(SyncAction::ModeratorRevoked { room_id, user_id }),
        ModeratorChange::Unchanged => None,
    }
}

impl<A: HomeserverApi> Engine<A> {
    /// One full reconciliation pass for the payload's person.
    ///
    /// The account is ensured first. Every payload room then runs
    /// concurrently and to completion; if any of them failed the pass fails
    /// with every failed room listed and the fixed school rooms are skipped.
    pub async fn sync(&self, payload: &SyncPayload) -> Result<SyncReport, SyncError> {
        let span = info_span!(
            "sync",
            user_id = %payload.user.id,
            school_id = %payload.school.id
        );
        self.run_pass(payload).instrument(span).await
    }

    async fn run_pass(&self, payload: &SyncPayload) -> Result<SyncReport, SyncError> {
        let person = &payload.user;
        let mut report = SyncReport::start(&person.id);
        info!(rooms = payload.rooms.len(), "sync started");

        if self.ensure_user(person).await? {
            report.push(SyncAction::UserCreated {
                user_id: person.id.clone(),
            });
        }

        let results = join_all(
            payload
                .rooms
                .iter()
                .map(|spec| self.sync_room(&payload.school.name, person, spec)),
        )
        .await;

        let mut failures = Vec::new();
        for (spec, result) in payload.rooms.iter().zip(results) {
            match result {
                Ok(actions) => report.extend(actions),
                Err(e) => failures.push(RoomFailure {
                    alias: spec.alias().as_str().to_string(),
                    error: e,
                }),
            }
        }
        if !failures.is_empty() {
            error!(failed = failures.len(), "room sync failed");
            return Err(SyncError::Rooms { failures });
        }

        if payload.school.has_all_hands_channel {
            report.extend(self.sync_announcement_room(payload).await?);
        }
        if person.is_school_teacher {
            report.extend(self.sync_staff_room(payload).await?);
        }

        let report = report.finish();
        info!(
            actions = report.actions.len(),
            converged = report.is_converged(),
            "sync finished"
        );
        Ok(report)
    }

    /// resolve, join, then send level and moderator status together.
    async fn sync_room(
        &self,
        school_name: &str,
        person: &Person,
        spec: &RoomSpec,
    ) -> Result<Vec<SyncAction>, SyncError> {
        let alias = spec.alias();
        let fq = alias.qualify(&self.options.servername);
        let topic = spec.topic();

        let room = self
            .resolve_room(&fq, &spec.name, school_name, topic.as_deref())
            .await?;
        let mut actions = resolved_actions(&alias, &spec.name, &room);

        let joined = self.join_person(&person.id, &room.room_id).await?;
        actions.extend(join_actions(&room.room_id, &person.id, joined));

        let level = spec.events_default();
        let (level_set, moderator) = tokio::try_join!(
            self.set_default_send_level(&room.room_id, level),
            self.set_moderator(&room.room_id, &person.id, spec.is_moderator),
        )?;
        if level_set {
            actions.push(SyncAction::EventsDefaultSet {
                room_id: room.room_id.clone(),
                level,
            });
        }
        actions.extend(moderator_action(&room.room_id, &person.id, moderator));

        Ok(actions)
    }

    async fn sync_announcement_room(&self, payload: &SyncPayload) -> Result<Vec<SyncAction>, SyncError> {
        let person = &payload.user;
        let alias = RoomAlias::announcement(&payload.school.id);
        let name = &self.options.announcement_room_name;

        let room = self
            .resolve_room(
                &alias.qualify(&self.options.servername),
                name,
                &payload.school.name,
                Some(&payload.school.name),
            )
            .await?;
        let mut actions = resolved_actions(&alias, name, &room);

        // Read before anything else touches the power levels.
        let admin_level = if person.is_school_admin {
            Some(self.user_power_level(&room.room_id, &person.id).await?)
        } else {
            None
        };

        if self
            .set_default_send_level(&room.room_id, DEFAULT_SEND_LEVEL_RESTRICTED)
            .await?
        {
            actions.push(SyncAction::EventsDefaultSet {
                room_id: room.room_id.clone(),
                level: DEFAULT_SEND_LEVEL_RESTRICTED,
            });
        }

        let joined = self.join_person(&person.id, &room.room_id).await?;
        actions.extend(join_actions(&room.room_id, &person.id, joined));

        if let Some(current) = admin_level {
            actions.extend(self.promote_admin(&room.room_id, &person.id, current).await?);
        }
        Ok(actions)
    }

    async fn sync_staff_room(&self, payload: &SyncPayload) -> Result<Vec<SyncAction>, SyncError> {
        let person = &payload.user;
        let alias = RoomAlias::staff(&payload.school.id);
        let name = &self.options.staff_room_name;

        let room = self
            .resolve_room(
                &alias.qualify(&self.options.servername),
                name,
                &payload.school.name,
                Some(&payload.school.name),
            )
            .await?;
        let mut actions = resolved_actions(&alias, name, &room);

        let joined = self.join_person(&person.id, &room.room_id).await?;
        actions.extend(join_actions(&room.room_id, &person.id, joined));

        if person.is_school_admin {
            let current = self.user_power_level(&room.room_id, &person.id).await?;
            actions.extend(self.promote_admin(&room.room_id, &person.id, current).await?);
        }
        Ok(actions)
    }

    /// Promote a school admin in a fixed room unless `current` already is the
    /// moderator level.
    async fn promote_admin(
        &self,
        room_id: &str,
        person_id: &str,
        current: Option<i64>,
    ) -> Result<Option<SyncAction>, SyncError> {
        if current == Some(MODERATOR_LEVEL) {
            return Ok(None);
        }
        let change = self.set_moderator(room_id, person_id, true).await?;
        Ok(moderator_action(room_id, person_id, change))
    }
}
