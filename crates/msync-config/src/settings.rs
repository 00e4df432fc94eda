//! Typed view over the merged config JSON.

use anyhow::{anyhow, bail, Result};
use msync_schemas::DemotionPolicy;
use serde_json::Value;

pub const DEFAULT_ANNOUNCEMENT_ROOM_NAME: &str = "Ankündigungen";
pub const DEFAULT_STAFF_ROOM_NAME: &str = "Lehrerzimmer";

/// Non-secret settings consumed by the engine, CLI and daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Matrix server name used in user ids and room aliases (`example.org`).
    pub servername: String,
    /// Base URI of the homeserver's HTTP API (`https://matrix.example.org`).
    pub homeserver_uri: String,
    /// Localpart of the privileged sync identity.
    pub sync_user_name: String,
    pub announcement_room_name: String,
    pub staff_room_name: String,
    pub demotion: DemotionPolicy,
    pub daemon_bind_addr: Option<String>,
}

impl SyncSettings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let servername = require_str(config, "/homeserver/servername")?;
        let homeserver_uri = require_str(config, "/homeserver/uri")?;
        let sync_user_name = require_str(config, "/sync_user/name")?;

        if !homeserver_uri.starts_with("http://") && !homeserver_uri.starts_with("https://") {
            bail!(
                "CONFIG_INVALID /homeserver/uri: expected http(s) URI, got '{}'",
                homeserver_uri
            );
        }

        let demotion = match read_str(config, "/policy/demotion") {
            Some(s) => s
                .parse::<DemotionPolicy>()
                .map_err(|e| anyhow!("CONFIG_INVALID /policy/demotion: {e}"))?,
            None => DemotionPolicy::default(),
        };

        Ok(Self {
            servername,
            homeserver_uri: homeserver_uri.trim_end_matches('/').to_string(),
            sync_user_name,
            announcement_room_name: read_str(config, "/rooms/announcement_name")
                .unwrap_or_else(|| DEFAULT_ANNOUNCEMENT_ROOM_NAME.to_string()),
            staff_room_name: read_str(config, "/rooms/staff_name")
                .unwrap_or_else(|| DEFAULT_STAFF_ROOM_NAME.to_string()),
            demotion,
            daemon_bind_addr: read_str(config, "/daemon/bind_addr"),
        })
    }

    /// Full Matrix id of the sync identity (`@name:servername`).
    pub fn sync_user_id(&self) -> String {
        format!("@{}:{}", self.sync_user_name, self.servername)
    }
}

fn read_str(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn require_str(config: &Value, pointer: &str) -> Result<String> {
    match read_str(config, pointer) {
        Some(s) => Ok(s),
        None => bail!("CONFIG_MISSING required key {} is absent or empty", pointer),
    }
}
