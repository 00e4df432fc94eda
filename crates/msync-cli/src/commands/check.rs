use anyhow::Result;
use msync_config::{report_unused_keys, resolve_secrets, SyncAuth, UnusedKeyPolicy};

use super::load_config;

pub fn run(config_paths: &[String], strict: bool) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let settings = loaded.settings()?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for p in &report.unused_leaf_pointers {
        println!("unused_key={}", p);
    }

    let secrets = resolve_secrets(&loaded.config_json)?;
    let auth = match secrets.sync_auth() {
        Some(SyncAuth::Token(_)) => "token",
        Some(SyncAuth::Password(_)) => "password",
        Some(SyncAuth::SharedSecret(_)) => "shared_secret",
        None => "none",
    };

    println!("config_hash={}", loaded.config_hash);
    println!("servername={}", settings.servername);
    println!("homeserver_uri={}", settings.homeserver_uri);
    println!("sync_user_id={}", settings.sync_user_id());
    println!("demotion={}", settings.demotion);
    println!("auth={}", auth);
    println!("unused_keys_clean={}", report.is_clean());
    Ok(())
}
