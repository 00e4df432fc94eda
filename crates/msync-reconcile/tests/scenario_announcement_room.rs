use std::sync::Arc;

use msync_reconcile::*;
use msync_testkit::{payload, person, school, FakeHomeserver, SERVERNAME};

fn engine(hs: &Arc<FakeHomeserver>) -> Engine<Arc<FakeHomeserver>> {
    Engine::new(Arc::clone(hs), EngineOptions::new(SERVERNAME))
}

#[tokio::test]
async fn scenario_admin_already_moderator_gets_no_moderator_write() {
    let mut admin = person("rektor");
    admin.is_school_admin = true;
    let hs = Arc::new(FakeHomeserver::new().with_user(&admin.id));
    let room_id = hs.seed_room("news_s1", Some("Ankündigungen"));
    let mut pl = hs.power_levels(&room_id).unwrap();
    pl.events_default = 50;
    pl.set_level(&admin.id, 50);
    hs.set_power_levels(&room_id, &pl);
    hs.add_member(&room_id, &admin.id);

    let report = engine(&hs)
        .sync(&payload(school("s1", true), admin.clone(), vec![]))
        .await
        .unwrap();

    assert_eq!(hs.count("PUT", "/state/m.room.power_levels"), 0);
    // membership is re-asserted on every pass
    assert_eq!(hs.count("POST", "/invite"), 1);
    assert_eq!(hs.count("POST", "/_synapse/admin/v1/join/"), 1);
    assert!(report.is_converged());
    assert_eq!(
        report.actions,
        vec![SyncAction::Joined {
            room_id,
            user_id: admin.id.clone()
        }]
    );
}

#[tokio::test]
async fn scenario_announcement_room_created_and_restricted() {
    let hs = Arc::new(FakeHomeserver::new());
    let anna = person("anna");

    engine(&hs)
        .sync(&payload(school("s1", true), anna.clone(), vec![]))
        .await
        .unwrap();

    let room_id = hs.room_id_for("news_s1").expect("announcement room");
    assert_eq!(hs.room_name(&room_id).as_deref(), Some("Ankündigungen"));
    assert_eq!(hs.room_topic(&room_id).as_deref(), Some("Schule s1"));
    let pl = hs.power_levels(&room_id).unwrap();
    assert_eq!(pl.events_default, 50);
    assert_eq!(pl.invite, 70);
    assert_eq!(pl.level_of(&anna.id), None);
    assert!(hs.is_joined(&room_id, &anna.id));
    assert_eq!(hs.count("GET", "/state"), hs.count("GET", "/state/m.room."));
}

#[tokio::test]
async fn scenario_admin_promoted_in_announcement_room() {
    let mut admin = person("rektor");
    admin.is_school_admin = true;
    let hs = Arc::new(FakeHomeserver::new());

    let report = engine(&hs)
        .sync(&payload(school("s1", true), admin.clone(), vec![]))
        .await
        .unwrap();

    let room_id = hs.room_id_for("news_s1").unwrap();
    assert_eq!(hs.power_levels(&room_id).unwrap().level_of(&admin.id), Some(50));
    assert!(report.actions.contains(&SyncAction::ModeratorGranted {
        room_id,
        user_id: admin.id.clone()
    }));
}

#[tokio::test]
async fn scenario_no_all_hands_channel_means_no_announcement_room() {
    let hs = Arc::new(FakeHomeserver::new());
    hs.seed_room("news_s1", Some("Ankündigungen"));

    engine(&hs)
        .sync(&payload(school("s1", false), person("anna"), vec![]))
        .await
        .unwrap();

    assert_eq!(hs.count("GET", "/directory/room/"), 0);
    assert_eq!(hs.room_count(), 1);
}

#[tokio::test]
async fn scenario_configured_room_names_are_used() {
    let hs = Arc::new(FakeHomeserver::new());
    let mut options = EngineOptions::new(SERVERNAME);
    options.announcement_room_name = "News".into();
    let engine = Engine::new(Arc::clone(&hs), options);

    engine
        .sync(&payload(school("s1", true), person("anna"), vec![]))
        .await
        .unwrap();

    let room_id = hs.room_id_for("news_s1").unwrap();
    assert_eq!(hs.room_name(&room_id).as_deref(), Some("News"));
}
