//! msync-config
//!
//! Layered YAML configuration for the sync engine.
//!
//! - Docs are merged in order (later overrides earlier) into one JSON value.
//! - The merged value is canonicalized and hashed so a run can be tied to the
//!   exact configuration that produced it.
//! - Secret-looking literals are rejected: YAML carries env var NAMES only,
//!   values are resolved by [`secrets::resolve_secrets`].
//! - [`report_unused_keys`] flags leaves nothing reads.

pub mod secrets;
pub mod settings;

pub use secrets::{resolve_secrets, ResolvedSecrets, SyncAuth};
pub use settings::SyncSettings;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Known secret-like prefixes. A leaf string starting with one of these aborts
/// loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "syt_",         // homeserver access token
    "-----BEGIN",   // PEM key material
    "ghp_",         // GitHub token
    "glpat-",       // GitLab token
    "AKIA",         // AWS key id
];

/// JSON-pointer prefixes read by the engine, CLI and daemon.
///
/// Keep this in step with `settings.rs` and `secrets.rs`: only list pointers
/// that code actually reads.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/homeserver/servername",
    "/homeserver/uri",
    "/sync_user/name",
    "/sync_user/env/password",
    "/sync_user/env/shared_secret",
    "/sync_user/env/token",
    "/rooms/announcement_name",
    "/rooms/staff_name",
    "/policy/demotion",
    "/daemon/bind_addr",
];

/// What [`report_unused_keys`] does when it finds keys nothing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Pointers the analysis treated as read, sorted.
    pub consumed_prefixes: Vec<String>,
    /// Leaves under none of them, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Compare the config's leaves against [`CONSUMED_POINTERS`].
///
/// Under [`UnusedKeyPolicy::Fail`] a non-empty result is an error tagged
/// `CONFIG_UNUSED_KEYS`.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut consumed_prefixes: Vec<String> =
        CONSUMED_POINTERS.iter().map(|p| p.to_string()).collect();
    consumed_prefixes.sort();

    let mut unused_leaf_pointers: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed_prefixes.iter().any(|c| covers(c, ptr)))
        .collect();
    unused_leaf_pointers.sort();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(10)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} key(s) are not read by msync: {}",
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }

    Ok(report)
}

/// `consumed` covers `leaf` when they are equal or `leaf` lies below it.
fn covers(consumed: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(consumed) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Every scalar in `root` with its JSON pointer (RFC 6901), in document order.
/// Empty objects and arrays contribute nothing.
fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((ptr, v)) = stack.pop() {
        match v {
            Value::Object(map) => {
                for (k, child) in map.iter().rev() {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    stack.push((format!("{ptr}/{token}"), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{ptr}/{i}"), child));
                }
            }
            scalar => out.push((ptr, scalar)),
        }
    }
    out
}

/// Merged configuration plus the hash that identifies it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the keys the engine reads.
    pub fn settings(&self) -> Result<SyncSettings> {
        SyncSettings::from_config_json(&self.config_json)
    }
}

/// Read and merge YAML files; later paths override earlier ones.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("config layer unreadable: {p}")))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: Value = serde_yaml::from_str(raw)
            .with_context(|| format!("config layer {i} is not valid yaml"))?;
        overlay(&mut merged, layer);
    }

    reject_secret_literals(&merged)?;

    // serde_json::Map is a BTreeMap (no preserve_order), so keys serialize
    // sorted and the text does not depend on layer order.
    let canonical_json = serde_json::to_string(&merged).context("config serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; any other value in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                match dst.get_mut(&k) {
                    Some(existing) => overlay(existing, v),
                    None => {
                        dst.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn reject_secret_literals(config: &Value) -> Result<()> {
    for (ptr, v) in leaves(config) {
        let Some(s) = v.as_str() else { continue };
        let s = s.trim();
        if s.len() >= 8 && SECRET_PREFIXES.iter().any(|p| s.starts_with(p)) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}
