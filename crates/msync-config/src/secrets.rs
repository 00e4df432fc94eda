//! Runtime secret resolution for the sync identity.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** under `/sync_user/env/*`.
//! - Callers invoke [`resolve_secrets`] once at startup and hand the result
//!   to the credential provider. No other code reads these env vars.
//! - `Debug` output redacts every value; errors name the variable, never its value.
//!
//! At least one of token, password or shared secret must resolve.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_PASSWORD_VAR: &str = "MSYNC_SYNC_USER_PASSWORD";
pub const DEFAULT_SHARED_SECRET_VAR: &str = "MSYNC_SHARED_SECRET";
pub const DEFAULT_TOKEN_VAR: &str = "MSYNC_SYNC_USER_TOKEN";

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Pre-issued access token for the sync identity. Skips login entirely.
    pub sync_token: Option<String>,
    /// Directly configured password for the sync identity.
    pub sync_password: Option<String>,
    /// Shared secret used to derive per-user passwords.
    pub shared_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("sync_token", &self.sync_token.as_ref().map(|_| "<REDACTED>"))
            .field(
                "sync_password",
                &self.sync_password.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// How the sync identity authenticates, in priority order.
#[derive(Clone, PartialEq, Eq)]
pub enum SyncAuth {
    Token(String),
    Password(String),
    SharedSecret(String),
}

impl std::fmt::Debug for SyncAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAuth::Token(_) => f.write_str("SyncAuth::Token(<REDACTED>)"),
            SyncAuth::Password(_) => f.write_str("SyncAuth::Password(<REDACTED>)"),
            SyncAuth::SharedSecret(_) => f.write_str("SyncAuth::SharedSecret(<REDACTED>)"),
        }
    }
}

impl ResolvedSecrets {
    /// Token wins over password, password wins over shared secret.
    pub fn sync_auth(&self) -> Option<SyncAuth> {
        if let Some(t) = &self.sync_token {
            return Some(SyncAuth::Token(t.clone()));
        }
        if let Some(p) = &self.sync_password {
            return Some(SyncAuth::Password(p.clone()));
        }
        self.shared_secret
            .as_ref()
            .map(|s| SyncAuth::SharedSecret(s.clone()))
    }
}

struct SecretEnvNames {
    password_var: String,
    shared_secret_var: String,
    token_var: String,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// `None` when the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        password_var: read_str_at(config_json, "/sync_user/env/password")
            .unwrap_or_else(|| DEFAULT_PASSWORD_VAR.to_string()),
        shared_secret_var: read_str_at(config_json, "/sync_user/env/shared_secret")
            .unwrap_or_else(|| DEFAULT_SHARED_SECRET_VAR.to_string()),
        token_var: read_str_at(config_json, "/sync_user/env/token")
            .unwrap_or_else(|| DEFAULT_TOKEN_VAR.to_string()),
    }
}

/// Resolve the sync identity's secrets from the environment.
///
/// # Errors
/// `SECRETS_MISSING` when none of token, password or shared secret is set;
/// the message lists the variable names that were consulted.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);

    let secrets = ResolvedSecrets {
        sync_token: resolve_env(&names.token_var),
        sync_password: resolve_env(&names.password_var),
        shared_secret: resolve_env(&names.shared_secret_var),
    };

    if secrets.sync_auth().is_none() {
        bail!(
            "SECRETS_MISSING: no authentication configured for the sync user; \
             set one of '{}', '{}' or '{}'",
            names.token_var,
            names.password_var,
            names.shared_secret_var,
        );
    }

    Ok(secrets)
}
