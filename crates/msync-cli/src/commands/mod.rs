//! Command handler modules for msync-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod check;
pub mod sync;

use anyhow::{Context, Result};
use msync_config::LoadedConfig;
use msync_schemas::SyncPayload;
use std::fs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    msync_config::load_layered_yaml(&path_refs)
}

/// Load a sync payload from a JSON file. A UTF-8 BOM is tolerated.
pub fn load_payload(path: &str) -> Result<SyncPayload> {
    let bytes = fs::read(path).with_context(|| format!("read payload-file failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("payload-file must be UTF-8 text")?;
    serde_json::from_str(raw.trim()).context("payload-file must contain a valid sync payload")
}
