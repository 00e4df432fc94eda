use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use msync_api::{ApiError, HomeserverApi};
use msync_schemas::PowerLevels;
use serde_json::{json, Value};

pub const SERVERNAME: &str = "example.org";
pub const SYNC_USER: &str = "@sync:example.org";

/// One recorded call.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

impl Call {
    pub fn is_write(&self) -> bool {
        self.method != "GET"
    }
}

#[derive(Clone, Debug, Default)]
struct FakeRoom {
    name: Option<String>,
    topic: Option<String>,
    power_levels: Value,
    invited: BTreeSet<String>,
    joined: BTreeSet<String>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<String, Value>,
    /// `#alias:server` -> room id
    aliases: BTreeMap<String, String>,
    rooms: BTreeMap<String, FakeRoom>,
    calls: Vec<Call>,
    failures: Vec<(&'static str, String, ApiError)>,
    next_room: u64,
}

/// In-memory stand-in for the homeserver's client + admin API.
///
/// Implements the subset of endpoints the engine uses, with the status codes
/// and Matrix error bodies a real homeserver answers with.
pub struct FakeHomeserver {
    inner: Mutex<Inner>,
}

impl Default for FakeHomeserver {
    fn default() -> Self {
        Self::new()
    }
}

fn default_power_levels() -> Value {
    json!({
        "ban": 50,
        "events": {
            "m.room.name": 50,
            "m.room.power_levels": 100
        },
        "events_default": 0,
        "invite": 0,
        "kick": 50,
        "redact": 50,
        "state_default": 50,
        "users": { SYNC_USER: 100 },
        "users_default": 0
    })
}

fn not_found(what: &str) -> ApiError {
    ApiError::from_response(
        404,
        &json!({ "errcode": "M_NOT_FOUND", "error": what }).to_string(),
    )
}

fn forbidden(what: &str) -> ApiError {
    ApiError::from_response(
        403,
        &json!({ "errcode": "M_FORBIDDEN", "error": what }).to_string(),
    )
}

fn bad_request(errcode: &str, what: &str) -> ApiError {
    ApiError::from_response(400, &json!({ "errcode": errcode, "error": what }).to_string())
}

fn decode_alias(segment: &str) -> String {
    segment.replacen("%23", "#", 1)
}

impl FakeHomeserver {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    pub fn with_user(self, user_id: &str) -> Self {
        self.lock()
            .users
            .insert(user_id.to_string(), json!({ "name": user_id }));
        self
    }

    /// Seed a room reachable under `alias` (local part). Returns the room id.
    pub fn seed_room(&self, alias: &str, name: Option<&str>) -> String {
        let mut inner = self.lock();
        let room_id = Self::allocate_room(&mut inner);
        inner.rooms.insert(
            room_id.clone(),
            FakeRoom {
                name: name.map(str::to_string),
                power_levels: default_power_levels(),
                ..FakeRoom::default()
            },
        );
        inner
            .aliases
            .insert(format!("#{alias}:{SERVERNAME}"), room_id.clone());
        room_id
    }

    pub fn set_power_levels(&self, room_id: &str, pl: &PowerLevels) {
        let mut inner = self.lock();
        if let Some(room) = inner.rooms.get_mut(room_id) {
            room.power_levels = serde_json::to_value(pl).unwrap_or(Value::Null);
        }
    }

    /// Store a power levels document exactly as given.
    pub fn set_raw_power_levels(&self, room_id: &str, content: Value) {
        if let Some(room) = self.lock().rooms.get_mut(room_id) {
            room.power_levels = content;
        }
    }

    pub fn raw_power_levels(&self, room_id: &str) -> Option<Value> {
        self.lock().rooms.get(room_id).map(|r| r.power_levels.clone())
    }

    pub fn add_member(&self, room_id: &str, user_id: &str) {
        let mut inner = self.lock();
        if let Some(room) = inner.rooms.get_mut(room_id) {
            room.joined.insert(user_id.to_string());
        }
    }

    /// Make every call whose method matches and whose path contains
    /// `path_fragment` fail with `err`. Checked before routing.
    pub fn fail_on(&self, method: &'static str, path_fragment: &str, err: ApiError) {
        self.lock()
            .failures
            .push((method, path_fragment.to_string(), err));
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    /// Number of calls with `method` whose path contains `path_fragment`.
    pub fn count(&self, method: &str, path_fragment: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path.contains(path_fragment))
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.lock().users.contains_key(user_id)
    }

    pub fn user(&self, user_id: &str) -> Option<Value> {
        self.lock().users.get(user_id).cloned()
    }

    pub fn room_id_for(&self, alias: &str) -> Option<String> {
        self.lock()
            .aliases
            .get(&format!("#{alias}:{SERVERNAME}"))
            .cloned()
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn room_name(&self, room_id: &str) -> Option<String> {
        self.lock().rooms.get(room_id).and_then(|r| r.name.clone())
    }

    pub fn room_topic(&self, room_id: &str) -> Option<String> {
        self.lock().rooms.get(room_id).and_then(|r| r.topic.clone())
    }

    pub fn power_levels(&self, room_id: &str) -> Option<PowerLevels> {
        let inner = self.lock();
        let room = inner.rooms.get(room_id)?;
        serde_json::from_value(room.power_levels.clone()).ok()
    }

    pub fn is_joined(&self, room_id: &str, user_id: &str) -> bool {
        self.lock()
            .rooms
            .get(room_id)
            .map(|r| r.joined.contains(user_id))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    fn allocate_room(inner: &mut Inner) -> String {
        inner.next_room += 1;
        format!("!room{}:{SERVERNAME}", inner.next_room)
    }

    fn record(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<(), ApiError> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        let injected = inner
            .failures
            .iter()
            .find(|(m, frag, _)| *m == method && path.contains(frag.as_str()))
            .map(|(_, _, e)| e.clone());
        match injected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn route(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.record(method, path, body)?;
        let body = body.cloned().unwrap_or(Value::Null);
        let mut inner = self.lock();

        if let Some(user_id) = path.strip_prefix("/_synapse/admin/v2/users/") {
            return match method {
                "GET" => inner
                    .users
                    .get(user_id)
                    .cloned()
                    .ok_or_else(|| not_found("User not found")),
                "PUT" => {
                    inner.users.insert(user_id.to_string(), body);
                    Ok(json!({ "name": user_id }))
                }
                _ => Err(bad_request("M_UNRECOGNIZED", "Unrecognized request")),
            };
        }

        if let Some(room_id) = path.strip_prefix("/_synapse/admin/v1/join/") {
            let user_id = body["user_id"].as_str().unwrap_or_default().to_string();
            if !inner.users.contains_key(&user_id) {
                return Err(not_found("User not found"));
            }
            let room = inner
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| not_found("Room not found"))?;
            room.invited.remove(&user_id);
            room.joined.insert(user_id);
            return Ok(json!({ "room_id": room_id }));
        }

        if let Some(segment) = path.strip_prefix("/_matrix/client/r0/directory/room/") {
            let alias = decode_alias(segment);
            return inner
                .aliases
                .get(&alias)
                .map(|room_id| json!({ "room_id": room_id, "servers": [SERVERNAME] }))
                .ok_or_else(|| not_found(&format!("Room alias {alias} not found")));
        }

        if path == "/_matrix/client/r0/createRoom" {
            let alias_local = body["room_alias_name"].as_str().unwrap_or_default();
            let alias = format!("#{alias_local}:{SERVERNAME}");
            if inner.aliases.contains_key(&alias) {
                return Err(bad_request("M_ROOM_IN_USE", "Room alias already taken"));
            }
            let room_id = Self::allocate_room(&mut inner);
            inner.rooms.insert(
                room_id.clone(),
                FakeRoom {
                    name: body["name"].as_str().map(str::to_string),
                    topic: body["topic"].as_str().map(str::to_string),
                    power_levels: default_power_levels(),
                    joined: [SYNC_USER.to_string()].into_iter().collect(),
                    ..FakeRoom::default()
                },
            );
            inner.aliases.insert(alias, room_id.clone());
            return Ok(json!({ "room_id": room_id }));
        }

        if let Some(rest) = path.strip_prefix("/_matrix/client/r0/rooms/") {
            let (room_id, tail) = rest.split_once('/').unwrap_or((rest, ""));
            let room = inner
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| forbidden("User not in room"))?;

            return match (method, tail) {
                ("GET", "state/m.room.name") => room
                    .name
                    .clone()
                    .map(|n| json!({ "name": n }))
                    .ok_or_else(|| not_found("Event not found")),
                ("PUT", "state/m.room.name") => {
                    room.name = body["name"].as_str().map(str::to_string);
                    Ok(json!({ "event_id": "$name" }))
                }
                ("GET", "state/m.room.power_levels") => Ok(room.power_levels.clone()),
                ("PUT", "state/m.room.power_levels") => {
                    room.power_levels = body;
                    Ok(json!({ "event_id": "$pl" }))
                }
                ("GET", "state") => {
                    let mut events = vec![json!({
                        "type": "m.room.power_levels",
                        "state_key": "",
                        "content": room.power_levels.clone()
                    })];
                    if let Some(n) = &room.name {
                        events.push(json!({
                            "type": "m.room.name",
                            "state_key": "",
                            "content": { "name": n }
                        }));
                    }
                    Ok(Value::Array(events))
                }
                ("POST", "invite") => {
                    let user_id = body["user_id"].as_str().unwrap_or_default().to_string();
                    if room.joined.contains(&user_id) {
                        return Err(forbidden(&format!("{user_id} is already in the room.")));
                    }
                    room.invited.insert(user_id);
                    Ok(json!({}))
                }
                _ => Err(bad_request("M_UNRECOGNIZED", "Unrecognized request")),
            };
        }

        Err(bad_request("M_UNRECOGNIZED", "Unrecognized request"))
    }
}

#[async_trait]
impl HomeserverApi for FakeHomeserver {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.route("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.route("POST", path, Some(body))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.route("PUT", path, Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msync_api::ErrorKind;

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let hs = FakeHomeserver::new();
        let err = hs.get("/_synapse/admin/v2/users/@x:example.org").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn created_room_resolves_by_alias() {
        let hs = FakeHomeserver::new();
        let created = hs
            .post(
                "/_matrix/client/r0/createRoom",
                &json!({ "room_alias_name": "course_1", "name": "Mathe", "topic": "Kurs" }),
            )
            .await
            .unwrap();
        let found = hs
            .get("/_matrix/client/r0/directory/room/%23course_1:example.org")
            .await
            .unwrap();
        assert_eq!(created["room_id"], found["room_id"]);
        assert_eq!(hs.writes().len(), 1);
    }

    #[tokio::test]
    async fn second_invite_of_member_is_conflict() {
        let hs = FakeHomeserver::new().with_user("@a:example.org");
        let room = hs.seed_room("course_1", Some("Mathe"));
        hs.add_member(&room, "@a:example.org");
        let err = hs
            .post(
                &format!("/_matrix/client/r0/rooms/{room}/invite"),
                &json!({ "user_id": "@a:example.org" }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn injected_failure_wins_over_routing() {
        let hs = FakeHomeserver::new().with_user("@a:example.org");
        hs.fail_on("GET", "/users/", ApiError::transport("boom"));
        let err = hs.get("/_synapse/admin/v2/users/@a:example.org").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(hs.calls().len(), 1);
    }
}
