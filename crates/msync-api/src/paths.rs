//! Endpoint paths on the homeserver, relative to its base URI.

use std::fmt::Write;

pub const CLIENT: &str = "/_matrix/client/r0";

/// Percent-encode `raw` for use as one path segment. Characters legal in a
/// segment (RFC 3986 `pchar`) pass through, so ordinary Matrix ids stay readable.
pub fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        let keep = b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&b);
        if keep {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

pub fn admin_user(user_id: &str) -> String {
    format!("/_synapse/admin/v2/users/{}", segment(user_id))
}

pub fn admin_join(room_id: &str) -> String {
    format!("/_synapse/admin/v1/join/{}", segment(room_id))
}

pub fn login() -> String {
    format!("{CLIENT}/login")
}

/// `alias_segment` must already be path-encoded (`%23alias:server`).
pub fn directory_room(alias_segment: &str) -> String {
    format!("{CLIENT}/directory/room/{alias_segment}")
}

pub fn create_room() -> String {
    format!("{CLIENT}/createRoom")
}

pub fn room_state(room_id: &str) -> String {
    format!("{CLIENT}/rooms/{}/state", segment(room_id))
}

pub fn room_name(room_id: &str) -> String {
    format!("{CLIENT}/rooms/{}/state/m.room.name", segment(room_id))
}

pub fn power_levels(room_id: &str) -> String {
    format!("{CLIENT}/rooms/{}/state/m.room.power_levels", segment(room_id))
}

pub fn invite(room_id: &str) -> String {
    format!("{CLIENT}/rooms/{}/invite", segment(room_id))
}
