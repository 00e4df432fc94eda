use std::sync::Arc;

use msync_api::{ApiError, ErrorKind};
use msync_reconcile::*;
use msync_testkit::{course, payload, person, school, FakeHomeserver, SERVERNAME};

fn engine(hs: &Arc<FakeHomeserver>) -> Engine<Arc<FakeHomeserver>> {
    Engine::new(Arc::clone(hs), EngineOptions::new(SERVERNAME))
}

#[tokio::test]
async fn scenario_transient_user_lookup_never_creates() {
    let hs = Arc::new(FakeHomeserver::new());
    hs.fail_on(
        "GET",
        "/_synapse/admin/v2/users/",
        ApiError::from_response(502, "Bad Gateway"),
    );

    let err = engine(&hs)
        .sync(&payload(school("s1", false), person("anna"), vec![course("1", "Mathe")]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(matches!(
        err,
        SyncError::Step {
            step: SyncStep::LookupUser,
            ..
        }
    ));
    assert_eq!(hs.count("PUT", "/_synapse/admin/v2/users/"), 0);
    assert_eq!(hs.count("GET", "/directory/room/"), 0);
}

#[tokio::test]
async fn scenario_transient_room_lookup_never_creates() {
    let hs = Arc::new(FakeHomeserver::new());
    hs.fail_on("GET", "/directory/room/", ApiError::transport("connection reset"));
    let fq = msync_schemas::RoomAlias::for_room("course", "1").qualify(SERVERNAME);

    let err = engine(&hs)
        .resolve_room(&fq, "Mathe", "Schule", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(hs.count("POST", "/createRoom"), 0);
}

#[tokio::test]
async fn scenario_failed_room_reported_and_siblings_complete() {
    let hs = Arc::new(FakeHomeserver::new());
    hs.fail_on("GET", "%23course_2:", ApiError::transport("timeout"));
    let p = payload(
        school("s1", true),
        person("anna"),
        vec![course("1", "Mathe"), course("2", "Physik"), course("3", "Chemie")],
    );

    let err = engine(&hs).sync(&p).await.unwrap_err();

    match &err {
        SyncError::Rooms { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].alias, "course_2");
            assert_eq!(failures[0].error.kind(), ErrorKind::Transient);
        }
        other => panic!("expected room failures, got {other:?}"),
    }
    assert!(hs.room_id_for("course_1").is_some());
    assert!(hs.room_id_for("course_3").is_some());
    // fixed rooms are not reached after a failed pass
    assert!(hs.room_id_for("news_s1").is_none());
}

#[tokio::test]
async fn scenario_failed_join_propagates_and_swallowed_invite_does_not() {
    let anna = person("anna");
    let hs = Arc::new(FakeHomeserver::new().with_user(&anna.id));
    let room_id = hs.seed_room("course_1", Some("Mathe"));
    hs.fail_on("POST", "/invite", ApiError::from_response(500, ""));

    let outcome = engine(&hs).join_person(&anna.id, &room_id).await.unwrap();
    assert!(!outcome.invited);
    assert!(hs.is_joined(&room_id, &anna.id));

    hs.fail_on("POST", "/_synapse/admin/v1/join/", ApiError::from_response(403, ""));
    let err = engine(&hs).join_person(&anna.id, &room_id).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Step {
            step: SyncStep::Join,
            ..
        }
    ));
}

#[tokio::test]
async fn scenario_power_level_write_failure_names_room() {
    let hs = Arc::new(FakeHomeserver::new());
    let room_id = hs.seed_room("course_1", Some("Mathe"));
    hs.fail_on(
        "PUT",
        "/state/m.room.power_levels",
        ApiError::from_response(403, r#"{"errcode":"M_FORBIDDEN","error":"no"}"#),
    );

    let err = engine(&hs)
        .set_default_send_level(&room_id, 50)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert!(err.to_string().starts_with(&format!(
        "write_power_levels failed for {room_id}:"
    )));
}
