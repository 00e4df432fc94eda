//! Authenticated HTTP verbs against the homeserver's client and admin APIs.
//!
//! [`HomeserverApi`] is the seam the reconciliation engine is written
//! against. It surfaces non-2xx responses as classified [`ApiError`]s and
//! otherwise does not interpret them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use msync_config::{ResolvedSecrets, SyncSettings};

use crate::auth::{AuthError, CredentialProvider};
use crate::error::ApiError;

/// Homeserver contract.
///
/// `path` is relative to the homeserver base URI and already encoded.
/// Successful calls return the decoded JSON body, or `Value::Null` for an
/// empty body.
#[async_trait]
pub trait HomeserverApi: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, ApiError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError>;
}

#[async_trait]
impl<T: HomeserverApi + ?Sized> HomeserverApi for Arc<T> {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        (**self).get(path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        (**self).post(path, body).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        (**self).put(path, body).await
    }
}

/// reqwest-backed [`HomeserverApi`] carrying the sync identity's bearer token.
#[derive(Debug, Clone)]
pub struct HttpHomeserverClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialProvider>,
}

impl HttpHomeserverClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<CredentialProvider>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, credentials)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<CredentialProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Client for the configured homeserver, authenticated as the sync user.
    /// Both the client and its login share one reqwest connection pool.
    pub fn from_settings(settings: &SyncSettings, secrets: &ResolvedSecrets) -> Result<Self, AuthError> {
        let http = reqwest::Client::new();
        let credentials = CredentialProvider::with_http(
            http.clone(),
            &settings.homeserver_uri,
            settings.sync_user_id(),
            secrets,
        )?;
        Ok(Self::with_http(
            http,
            &settings.homeserver_uri,
            Arc::new(credentials),
        ))
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let token = self.credentials.sync_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut req = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(b) = body {
            req = req.json(b);
        }

        debug!(%method, path, "homeserver request");
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("{method} {path}: {e}")))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("{method} {path}: reading body: {e}")))?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &text);
            warn!(
                %method,
                path,
                status = status.as_u16(),
                kind = %err.kind,
                body = %text,
                headers = ?headers,
                "homeserver returned non-success status"
            );
            if err.is_unknown_token() {
                self.credentials.invalidate().await;
            }
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::decode(format!("{method} {path}: response json decode failed: {e}")))
    }
}

#[async_trait]
impl HomeserverApi for HttpHomeserverClient {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }
}
