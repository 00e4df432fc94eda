//! Test support for msync crates.
//!
//! [`FakeHomeserver`] is a deterministic in-memory homeserver: no network,
//! no randomness, every call recorded. Payload builders produce the
//! desired-state records the scenario tests feed to the engine.

mod fake_homeserver;

pub use fake_homeserver::{Call, FakeHomeserver, SERVERNAME, SYNC_USER};

use msync_schemas::{Person, RoomSpec, School, SyncPayload};

pub fn school(id: &str, has_all_hands_channel: bool) -> School {
    School {
        id: id.to_string(),
        name: format!("Schule {id}"),
        has_all_hands_channel,
    }
}

pub fn person(localpart: &str) -> Person {
    Person {
        id: format!("@{localpart}:{SERVERNAME}"),
        display_name: localpart.to_string(),
        email: Some(format!("{localpart}@example.org")),
        is_school_admin: false,
        is_school_teacher: false,
    }
}

pub fn course(id: &str, name: &str) -> RoomSpec {
    RoomSpec {
        id: id.to_string(),
        room_type: "course".to_string(),
        name: name.to_string(),
        description: None,
        bidirectional: false,
        is_moderator: false,
    }
}

pub fn team(id: &str, name: &str) -> RoomSpec {
    RoomSpec {
        room_type: "team".to_string(),
        bidirectional: true,
        ..course(id, name)
    }
}

pub fn payload(school: School, user: Person, rooms: Vec<RoomSpec>) -> SyncPayload {
    SyncPayload { school, user, rooms }
}
