//! Error taxonomy for homeserver calls.
//!
//! Callers branch on [`ErrorKind`], never on raw status codes:
//! - `NotFound`: the addressed user/room/alias does not exist (HTTP 404 only).
//! - `Conflict`: the change is already in effect (already invited/joined, 409).
//! - `Transient`: no response, rate limited or 5xx. Retrying later may succeed.
//! - `Fatal`: anything else, including undecodable bodies.

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Transient,
    Fatal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed homeserver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status, `None` when no response was received.
    pub status: Option<u16>,
    /// Matrix `errcode` from the response body (`M_NOT_FOUND`, ...).
    pub errcode: Option<String>,
    pub message: String,
}

/// Standard Matrix error body.
#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            errcode: None,
            message: message.into(),
        }
    }

    /// Request never produced a response (connect, timeout, TLS, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Classify a non-2xx response. `body` is the raw response text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<MatrixErrorBody> = serde_json::from_str(body).ok();
        let errcode = parsed.as_ref().and_then(|b| b.errcode.clone());
        let message = parsed
            .and_then(|b| b.error)
            .unwrap_or_else(|| body.trim().to_string());

        Self {
            kind: classify(status, &message),
            status: Some(status),
            errcode,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Homeserver rejected the bearer token; any cached token is stale.
    pub fn is_unknown_token(&self) -> bool {
        self.status == Some(401) || self.errcode.as_deref() == Some("M_UNKNOWN_TOKEN")
    }
}

fn classify(status: u16, message: &str) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        400 | 403 if is_already_member(message) => ErrorKind::Conflict,
        429 | 500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

fn is_already_member(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("already in the room")
        || m.contains("already joined")
        || m.contains("already invited")
        || m.contains("is already a member")
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.errcode) {
            (Some(s), Some(code)) => write!(
                f,
                "homeserver error kind={} status={} errcode={}: {}",
                self.kind, s, code, self.message
            ),
            (Some(s), None) => write!(
                f,
                "homeserver error kind={} status={}: {}",
                self.kind, s, self.message
            ),
            (None, _) => write!(f, "homeserver error kind={}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}
