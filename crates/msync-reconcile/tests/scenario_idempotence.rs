use std::sync::Arc;

use msync_reconcile::*;
use msync_testkit::{course, payload, person, school, team, FakeHomeserver, SERVERNAME};

#[tokio::test]
async fn scenario_second_pass_only_reasserts_membership() {
    let hs = Arc::new(FakeHomeserver::new());
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));
    let mut anna = person("anna");
    anna.is_school_admin = true;
    anna.is_school_teacher = true;
    let mut t = team("2", "Theater");
    t.is_moderator = true;
    let p = payload(school("s1", true), anna, vec![course("1", "Mathe"), t]);

    let first = engine.sync(&p).await.unwrap();
    assert!(!first.is_converged());

    hs.clear_calls();
    let second = engine.sync(&p).await.unwrap();

    assert!(second.is_converged(), "{:?}", second.actions);
    for call in hs.writes() {
        assert_eq!(call.method, "POST", "unexpected write {call:?}");
        assert!(
            call.path.ends_with("/invite") || call.path.starts_with("/_synapse/admin/v1/join/"),
            "unexpected write {call:?}"
        );
    }
    // one invite and one join per room: two payload rooms, two fixed rooms
    assert_eq!(hs.count("POST", "/invite"), 4);
    assert_eq!(hs.count("POST", "/_synapse/admin/v1/join/"), 4);
}

#[tokio::test]
async fn scenario_set_moderator_twice_writes_once() {
    let anna = person("anna");
    let hs = Arc::new(FakeHomeserver::new().with_user(&anna.id));
    let room_id = hs.seed_room("team_1", Some("Theater"));
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));

    let first = engine.set_moderator(&room_id, &anna.id, true).await.unwrap();
    let second = engine.set_moderator(&room_id, &anna.id, true).await.unwrap();

    assert_eq!(first, ModeratorChange::Granted);
    assert_eq!(second, ModeratorChange::Unchanged);
    assert_eq!(hs.count("PUT", "/state/m.room.power_levels"), 1);
    assert_eq!(
        engine.user_power_level(&room_id, &anna.id).await.unwrap(),
        Some(50)
    );
}

#[tokio::test]
async fn scenario_default_send_level_follows_bidirectional_flag() {
    let hs = Arc::new(FakeHomeserver::new());
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));
    let p = payload(
        school("s1", false),
        person("anna"),
        vec![course("1", "Mathe"), team("2", "Theater")],
    );

    engine.sync(&p).await.unwrap();

    let course_room = hs.room_id_for("course_1").unwrap();
    let team_room = hs.room_id_for("team_2").unwrap();
    assert_eq!(hs.power_levels(&course_room).unwrap().events_default, 50);
    assert_eq!(hs.power_levels(&team_room).unwrap().events_default, 0);

    // drift back is corrected
    let mut pl = hs.power_levels(&team_room).unwrap();
    pl.events_default = 50;
    hs.set_power_levels(&team_room, &pl);
    assert!(engine.set_default_send_level(&team_room, 0).await.unwrap());
    assert!(!engine.set_default_send_level(&team_room, 0).await.unwrap());
    assert_eq!(hs.power_levels(&team_room).unwrap().events_default, 0);
}

#[tokio::test]
async fn scenario_user_power_level_absent_is_none() {
    let hs = Arc::new(FakeHomeserver::new());
    let room_id = hs.seed_room("team_1", None);
    let engine = Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME));

    assert_eq!(
        engine.user_power_level(&room_id, "@nobody:example.org").await.unwrap(),
        None
    );
}
