use std::sync::Arc;

use msync_reconcile::*;
use msync_testkit::{payload, person, school, team, FakeHomeserver, SERVERNAME};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_concurrent_moderator_grants_in_one_room_all_land() {
    let hs = Arc::new(FakeHomeserver::new());
    let room_id = hs.seed_room("team_1", Some("Theater"));
    let engine = Arc::new(Engine::new(Arc::clone(&hs), EngineOptions::new(SERVERNAME)));

    let mut room = team("1", "Theater");
    room.is_moderator = true;

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        let p = payload(school("s1", false), person(&format!("p{i}")), vec![room.clone()]);
        handles.push(tokio::spawn(async move { engine.sync(&p).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let pl = hs.power_levels(&room_id).unwrap();
    for i in 0..8 {
        assert_eq!(pl.level_of(&format!("@p{i}:example.org")), Some(50), "p{i}");
    }
    assert_eq!(hs.count("PUT", "/state/m.room.power_levels"), 8);
}
