//! reqwest client + credential provider against a mock homeserver.
//!
//! Covers:
//! 1. Shared-secret login happens once; the token is cached and sent as bearer.
//! 2. Non-2xx responses are classified (404 → NotFound with errcode).
//! 3. A 401 M_UNKNOWN_TOKEN drops the cached token so the next call logs in again.
//! 4. PUT bodies are sent as JSON; an empty 200 body decodes to `Value::Null`.
//! 5. No response at all is Transient.
//! 6. Per-person login uses the derived password.

use std::sync::Arc;

use httpmock::prelude::*;
use msync_api::{derive_password, CredentialProvider, ErrorKind, HomeserverApi, HttpHomeserverClient};
use msync_config::ResolvedSecrets;
use serde_json::{json, Value};

const SYNC_USER: &str = "@sync:example.org";

fn secret_only() -> ResolvedSecrets {
    ResolvedSecrets {
        sync_token: None,
        sync_password: None,
        shared_secret: Some("s3cr3t".to_string()),
    }
}

fn client_for(server: &MockServer, secrets: &ResolvedSecrets) -> HttpHomeserverClient {
    let creds = CredentialProvider::new(server.base_url(), SYNC_USER, secrets).unwrap();
    HttpHomeserverClient::new(server.base_url(), Arc::new(creds))
}

#[tokio::test]
async fn login_once_then_reuse_cached_bearer() {
    let server = MockServer::start_async().await;
    let password = derive_password(SYNC_USER, "s3cr3t");

    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/_matrix/client/r0/login")
                .json_body_partial(
                    json!({
                        "type": "m.login.password",
                        "user": SYNC_USER,
                        "password": password,
                        "device_id": "sync-device-id"
                    })
                    .to_string(),
                );
            then.status(200).json_body(json!({ "access_token": "tok-1" }));
        })
        .await;

    let user = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v2/users/@anna:example.org")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(json!({ "name": "@anna:example.org" }));
        })
        .await;

    let client = client_for(&server, &secret_only());
    let a = client.get("/_synapse/admin/v2/users/@anna:example.org").await.unwrap();
    let b = client.get("/_synapse/admin/v2/users/@anna:example.org").await.unwrap();

    assert_eq!(a["name"], "@anna:example.org");
    assert_eq!(a, b);
    login.assert_async().await;
    assert_eq!(user.hits_async().await, 2);
}

#[tokio::test]
async fn not_found_is_classified() {
    let server = MockServer::start_async().await;
    let secrets = ResolvedSecrets {
        sync_token: Some("preissued".to_string()),
        sync_password: None,
        shared_secret: None,
    };

    server
        .mock_async(|when, then| {
            when.method(GET).path("/_synapse/admin/v2/users/@ghost:example.org");
            then.status(404)
                .json_body(json!({ "errcode": "M_NOT_FOUND", "error": "User not found" }));
        })
        .await;

    let client = client_for(&server, &secrets);
    let err = client
        .get("/_synapse/admin/v2/users/@ghost:example.org")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.status, Some(404));
    assert_eq!(err.errcode.as_deref(), Some("M_NOT_FOUND"));
}

#[tokio::test]
async fn unknown_token_forces_fresh_login() {
    let server = MockServer::start_async().await;

    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/_matrix/client/r0/login");
            then.status(200).json_body(json!({ "access_token": "tok-n" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rejects");
            then.status(401).json_body(
                json!({ "errcode": "M_UNKNOWN_TOKEN", "error": "Invalid access token passed." }),
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/accepts");
            then.status(200).json_body(json!({}));
        })
        .await;

    let secrets = ResolvedSecrets {
        sync_token: None,
        sync_password: Some("pw".to_string()),
        shared_secret: None,
    };
    let client = client_for(&server, &secrets);

    let err = client.get("/rejects").await.unwrap_err();
    assert!(err.is_unknown_token());
    assert_eq!(err.kind, ErrorKind::Fatal);

    client.get("/accepts").await.unwrap();
    assert_eq!(login.hits_async().await, 2, "stale token must not be reused");
}

#[tokio::test]
async fn put_sends_json_and_empty_body_is_null() {
    let server = MockServer::start_async().await;
    let secrets = ResolvedSecrets {
        sync_token: Some("preissued".to_string()),
        sync_password: None,
        shared_secret: None,
    };

    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/_matrix/client/r0/rooms/!r1:example.org/state/m.room.name")
                .header("authorization", "Bearer preissued")
                .json_body(json!({ "name": "Mathe 7b" }));
            then.status(200).body("");
        })
        .await;

    let client = client_for(&server, &secrets);
    let out = client
        .put(
            "/_matrix/client/r0/rooms/!r1:example.org/state/m.room.name",
            &json!({ "name": "Mathe 7b" }),
        )
        .await
        .unwrap();
    assert_eq!(out, Value::Null);
    put.assert_async().await;
}

#[tokio::test]
async fn no_response_is_transient() {
    let secrets = ResolvedSecrets {
        sync_token: Some("preissued".to_string()),
        sync_password: None,
        shared_secret: None,
    };
    let creds = CredentialProvider::new("http://127.0.0.1:9", SYNC_USER, &secrets).unwrap();
    let client = HttpHomeserverClient::new("http://127.0.0.1:9", Arc::new(creds));

    let err = client.get("/_synapse/admin/v2/users/@a:example.org").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transient);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn user_token_logs_in_with_derived_password() {
    let server = MockServer::start_async().await;
    let password = derive_password("@anna:example.org", "s3cr3t");

    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/_matrix/client/r0/login")
                .json_body_partial(
                    json!({ "user": "@anna:example.org", "password": password }).to_string(),
                );
            then.status(200)
                .json_body(json!({ "access_token": "anna-tok", "expires_in_ms": 60000 }));
        })
        .await;

    let creds = CredentialProvider::new(server.base_url(), SYNC_USER, &secret_only()).unwrap();
    let tok = creds.user_token("@anna:example.org").await.unwrap();

    assert_eq!(tok.user_id, "@anna:example.org");
    assert_eq!(tok.access_token, "anna-tok");
    assert!(tok.expires_at.is_some());
    login.assert_async().await;
}

#[tokio::test]
async fn rejected_login_surfaces_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/_matrix/client/r0/login");
            then.status(403)
                .json_body(json!({ "errcode": "M_FORBIDDEN", "error": "Invalid password" }));
        })
        .await;

    let client = client_for(&server, &secret_only());
    let err = client.get("/_synapse/admin/v2/users/@a:example.org").await.unwrap_err();
    assert_eq!(err.status, Some(403));
    assert_eq!(err.kind, ErrorKind::Fatal);
    assert!(err.message.contains("Invalid password"), "got: {err}");
}
