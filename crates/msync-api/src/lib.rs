//! msync-api
//!
//! Homeserver access for the sync engine: the [`HomeserverApi`] seam the
//! engine is written against, its reqwest-backed implementation, the
//! credential provider that feeds it bearer tokens, and the error taxonomy
//! every remote call reports through.
//!
//! Nothing here interprets homeserver state. Decisions live in msync-reconcile.

pub mod auth;
pub mod client;
pub mod error;
pub mod paths;

pub use auth::{derive_password, AccessToken, AuthError, CredentialProvider, TokenCache};
pub use client::{HomeserverApi, HttpHomeserverClient};
pub use error::{ApiError, ErrorKind};
