use anyhow::{Context, Result};
use msync_api::HttpHomeserverClient;
use msync_reconcile::{Engine, EngineOptions};
use msync_schemas::DemotionPolicy;
use tracing::info;

use super::{load_config, load_payload};

pub async fn run(payload_file: &str, config_paths: &[String], demotion: Option<DemotionPolicy>) -> Result<()> {
    let payload = load_payload(payload_file)?;

    let loaded = load_config(config_paths)?;
    let settings = loaded.settings()?;
    let secrets = msync_config::resolve_secrets(&loaded.config_json)?;

    let mut options = EngineOptions::from_settings(&settings);
    if let Some(d) = demotion {
        options.demotion = d;
    }

    let client = HttpHomeserverClient::from_settings(&settings, &secrets)
        .context("homeserver client setup failed")?;
    let engine = Engine::new(client, options);

    info!(
        config_hash = %loaded.config_hash,
        homeserver = %settings.homeserver_uri,
        user_id = %payload.user.id,
        "sync starting"
    );
    let report = engine
        .sync(&payload)
        .await
        .with_context(|| format!("sync failed for {}", payload.user.id))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
