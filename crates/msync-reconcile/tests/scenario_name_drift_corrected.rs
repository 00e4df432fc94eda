use std::sync::Arc;

use msync_reconcile::*;
use msync_testkit::{course, payload, person, school, FakeHomeserver, SERVERNAME};

#[tokio::test]
async fn scenario_name_drift_corrected_without_create() {
    let anna = person("anna");
    let hs = Arc::new(FakeHomeserver::new().with_user(&anna.id));
    let room_id = hs.seed_room("course_1", Some("Mathe (alt)"));
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));

    let report = engine
        .sync(&payload(school("s1", false), anna.clone(), vec![course("1", "Mathe")]))
        .await
        .unwrap();

    assert_eq!(hs.count("POST", "/createRoom"), 0);
    assert_eq!(hs.count("PUT", "/_synapse/admin/v2/users/"), 0);
    assert_eq!(hs.count("PUT", "/state/m.room.name"), 1);
    assert_eq!(hs.room_name(&room_id).as_deref(), Some("Mathe"));
    assert_eq!(hs.room_count(), 1);
    assert!(report.actions.contains(&SyncAction::RoomRenamed {
        room_id: room_id.clone(),
        name: "Mathe".into()
    }));
}

#[tokio::test]
async fn scenario_room_without_name_state_gets_named() {
    let anna = person("anna");
    let hs = Arc::new(FakeHomeserver::new().with_user(&anna.id));
    let room_id = hs.seed_room("course_1", None);
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));

    let renamed = engine.ensure_room_name(&room_id, "Mathe").await.unwrap();
    assert!(renamed);
    assert_eq!(hs.room_name(&room_id).as_deref(), Some("Mathe"));

    let again = engine.ensure_room_name(&room_id, "Mathe").await.unwrap();
    assert!(!again);
    assert_eq!(hs.count("PUT", "/state/m.room.name"), 1);
}

#[tokio::test]
async fn scenario_resolve_twice_writes_at_most_once() {
    let hs = Arc::new(FakeHomeserver::new());
    hs.seed_room("team_9", Some("Alt"));
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));
    let fq = msync_schemas::RoomAlias::for_room("team", "9").qualify(SERVERNAME);

    let first = engine.resolve_room(&fq, "Neu", "Schule", None).await.unwrap();
    let second = engine.resolve_room(&fq, "Neu", "Schule", None).await.unwrap();

    assert_eq!(first.room_id, second.room_id);
    assert!(first.renamed);
    assert!(!second.renamed);
    assert_eq!(hs.writes().len(), 1);
}
