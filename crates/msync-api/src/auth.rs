//! Credential provider for the privileged sync identity.
//!
//! Tokens come from one of three places, in order: a pre-issued token from
//! the environment, a password-grant login with a configured password, or a
//! password-grant login with a password derived from the shared secret
//! (`hex(HMAC-SHA-512(key = secret, msg = user_id))`, the scheme the
//! homeserver's shared-secret auth module expects).
//!
//! The cache is owned by whoever owns the provider. It tracks the expiry the
//! homeserver reports and is cleared explicitly via [`CredentialProvider::invalidate`].

use std::fmt;
use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use msync_config::{ResolvedSecrets, SyncAuth};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::paths;

type HmacSha512 = Hmac<Sha512>;

const DEVICE_DISPLAY_NAME: &str = "sync-display-name";
const DEVICE_ID: &str = "sync-device-id";

/// Password for `user_id` under the shared-secret scheme.
pub fn derive_password(user_id: &str, shared_secret: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(shared_secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(user_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[derive(Debug)]
pub enum AuthError {
    /// Login request never produced a response.
    Transport(String),
    /// Homeserver answered the login with a non-2xx status.
    Rejected { status: u16, body: String },
    /// Login response could not be decoded.
    Decode(String),
    /// Nothing configured to authenticate with.
    Config(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Transport(msg) => write!(f, "login transport error: {msg}"),
            AuthError::Rejected { status, body } => {
                write!(f, "login rejected status={status}: {body}")
            }
            AuthError::Decode(msg) => write!(f, "login decode error: {msg}"),
            AuthError::Config(msg) => write!(f, "auth config error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Transport(msg) => ApiError::transport(format!("sync login: {msg}")),
            AuthError::Rejected { status, body } => {
                let mut err = ApiError::from_response(status, &body);
                err.message = format!("sync login: {}", err.message);
                err
            }
            AuthError::Decode(msg) => ApiError::decode(format!("sync login: {msg}")),
            AuthError::Config(msg) => ApiError::decode(format!("sync login: {msg}")),
        }
    }
}

/// A bearer token plus the identity it belongs to.
#[derive(Clone)]
pub struct AccessToken {
    pub user_id: String,
    pub homeserver_url: String,
    pub access_token: String,
    /// `None` when the homeserver issued a non-expiring token.
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("user_id", &self.user_id)
            .field("homeserver_url", &self.homeserver_url)
            .field("access_token", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Single-slot token cache with expiry tracking.
///
/// The slot stays locked for the whole login so concurrent callers wait for
/// one login instead of each issuing their own.
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token if present and not expired at `now`.
    pub async fn current(&self, now: Instant) -> Option<AccessToken> {
        let slot = self.slot.lock().await;
        slot.as_ref().filter(|t| !t.is_expired(now)).cloned()
    }

    pub async fn store(&self, token: AccessToken) {
        *self.slot.lock().await = Some(token);
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "type")]
    login_type: &'static str,
    user: &'a str,
    password: &'a str,
    initial_device_display_name: &'static str,
    device_id: &'static str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    expires_in_ms: Option<u64>,
}

/// Resolves bearer tokens for the sync identity and mints per-person tokens.
pub struct CredentialProvider {
    http: reqwest::Client,
    base_url: String,
    sync_user_id: String,
    auth: SyncAuth,
    shared_secret: Option<String>,
    cache: TokenCache,
}

impl fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("base_url", &self.base_url)
            .field("sync_user_id", &self.sync_user_id)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider {
    pub fn new(
        base_url: impl Into<String>,
        sync_user_id: impl Into<String>,
        secrets: &ResolvedSecrets,
    ) -> Result<Self, AuthError> {
        Self::with_http(reqwest::Client::new(), base_url, sync_user_id, secrets)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        sync_user_id: impl Into<String>,
        secrets: &ResolvedSecrets,
    ) -> Result<Self, AuthError> {
        let auth = secrets
            .sync_auth()
            .ok_or_else(|| AuthError::Config("no authentication configuration given".into()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sync_user_id: sync_user_id.into(),
            auth,
            shared_secret: secrets.shared_secret.clone(),
            cache: TokenCache::new(),
        })
    }

    pub fn sync_user_id(&self) -> &str {
        &self.sync_user_id
    }

    /// Bearer token for the sync identity, logging in when nothing valid is cached.
    pub async fn sync_token(&self) -> Result<String, AuthError> {
        if let SyncAuth::Token(t) = &self.auth {
            return Ok(t.clone());
        }

        let mut slot = self.cache.slot.lock().await;
        if let Some(tok) = slot.as_ref() {
            if !tok.is_expired(Instant::now()) {
                return Ok(tok.access_token.clone());
            }
            debug!(user_id = %self.sync_user_id, "cached sync token expired");
        }

        let password = match &self.auth {
            SyncAuth::SharedSecret(s) => derive_password(&self.sync_user_id, s),
            SyncAuth::Password(p) => p.clone(),
            SyncAuth::Token(t) => t.clone(),
        };
        let token = self.login(&self.sync_user_id, &password).await?;
        let out = token.access_token.clone();
        *slot = Some(token);
        Ok(out)
    }

    /// Drop the cached sync token; the next call logs in again.
    pub async fn invalidate(&self) {
        if matches!(self.auth, SyncAuth::Token(_)) {
            warn!("pre-issued sync token was rejected; it cannot be refreshed by login");
        }
        self.cache.invalidate().await;
    }

    /// Log in as `user_id` with its shared-secret-derived password.
    pub async fn user_token(&self, user_id: &str) -> Result<AccessToken, AuthError> {
        let secret = self.shared_secret.as_deref().ok_or_else(|| {
            AuthError::Config("per-user login requires a shared secret".into())
        })?;
        self.login(user_id, &derive_password(user_id, secret)).await
    }

    async fn login(&self, user_id: &str, password: &str) -> Result<AccessToken, AuthError> {
        let url = format!("{}{}", self.base_url, paths::login());
        let req = LoginRequest {
            login_type: "m.login.password",
            user: user_id,
            password,
            initial_device_display_name: DEVICE_DISPLAY_NAME,
            device_id: DEVICE_ID,
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(user_id = %user_id, status = status.as_u16(), "login rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        info!(user_id = %user_id, "obtained access token");
        Ok(AccessToken {
            user_id: user_id.to_string(),
            homeserver_url: self.base_url.clone(),
            access_token: body.access_token,
            expires_at: body
                .expires_in_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
        })
    }
}
