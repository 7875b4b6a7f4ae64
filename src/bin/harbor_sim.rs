//! Small harbor simulation: one same-map ferry and one cross-map zeppelin,
//! ticking until ctrl-c.

use ferry_async::{
    events::{Announcer, DockSignalTable, SessionLayer, SoundId},
    launch_tick_thread,
    math::{Point3, Vec3},
    path::InMemoryPathSource,
    platform::{spawn_platforms, PlatformConfig, ScriptedAttachment},
    world::{Entity, EntityId, MapId, MapInfo, ScriptedTemplate, World},
};
use std::sync::Arc;
use tracing::info;

const NORTHERN_CONTINENT: u32 = 0x1;

const PATH_ROWS: &str = r#"[
    {"path": 10, "seq": 0, "map": 1, "pos": {"x": -20.0, "y": 0.0, "z": 0.0}, "action": "teleport_anchor"},
    {"path": 10, "seq": 1, "map": 1, "pos": {"x": 0.0, "y": 0.0, "z": 0.0}, "action": "stop", "wait_secs": 8},
    {"path": 10, "seq": 2, "map": 1, "pos": {"x": 300.0, "y": 80.0, "z": 0.0}},
    {"path": 10, "seq": 3, "map": 1, "pos": {"x": 600.0, "y": 0.0, "z": 0.0}, "action": "stop", "wait_secs": 8},
    {"path": 10, "seq": 4, "map": 1, "pos": {"x": 620.0, "y": 0.0, "z": 0.0}, "action": "teleport_anchor"},

    {"path": 11, "seq": 0, "map": 1, "pos": {"x": 0.0, "y": 100.0, "z": 0.0}, "action": "teleport_anchor"},
    {"path": 11, "seq": 1, "map": 1, "pos": {"x": 0.0, "y": 120.0, "z": 30.0}, "action": "stop", "wait_secs": 10},
    {"path": 11, "seq": 2, "map": 1, "pos": {"x": 100.0, "y": 200.0, "z": 60.0}},
    {"path": 11, "seq": 3, "map": 2, "pos": {"x": 0.0, "y": 0.0, "z": 60.0}},
    {"path": 11, "seq": 4, "map": 2, "pos": {"x": 0.0, "y": 0.0, "z": 60.0}},
    {"path": 11, "seq": 5, "map": 2, "pos": {"x": 120.0, "y": 40.0, "z": 30.0}, "action": "stop", "wait_secs": 10},
    {"path": 11, "seq": 6, "map": 2, "pos": {"x": 140.0, "y": 40.0, "z": 30.0}, "action": "teleport_anchor"}
]"#;

struct LogBroadcast;

impl Announcer for LogBroadcast {
    fn dock_signal(&self, platform_entry: u32, sound: SoundId) {
        info!(platform_entry, sound, "dock signal");
    }
}

impl SessionLayer for LogBroadcast {
    fn transfer_pending(&self, entity: EntityId, dest_map: MapId, platform_entry: u32, src_map: MapId) {
        info!(entity, dest_map, platform_entry, src_map, "transfer pending");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ferry_async=debug".into()),
        )
        .init();

    let world = World::new();
    world.register_map(1, MapInfo::open(Point3::new(-50., 0., 0.)));
    world.register_map(2, MapInfo::gated(NORTHERN_CONTINENT, Point3::zero()));
    world.register_template(ScriptedTemplate {
        entry: 500,
        name: "deckhand".into(),
    });

    let source = InMemoryPathSource::from_json_str(PATH_ROWS).expect("valid path rows");
    let configs = vec![
        PlatformConfig {
            entry: 20,
            name: "harbor ferry".into(),
            visual_class: 3015,
            path: 10,
            oscillation_period_ms: None,
        },
        PlatformConfig {
            entry: 21,
            name: "northbound zeppelin".into(),
            visual_class: 3031,
            path: 11,
            oscillation_period_ms: None,
        },
    ];
    let attachments = vec![ScriptedAttachment {
        platform_entry: 20,
        template: 500,
        offset: Vec3::new(0., 2., 1.),
    }];

    let broadcast = Arc::new(LogBroadcast);
    let platforms = spawn_platforms(
        &world,
        &configs,
        &attachments,
        &source,
        broadcast.clone(),
        broadcast,
        Arc::new(DockSignalTable::standard()),
    );

    // one traveler with northern access rides the zeppelin
    let traveler = Entity::new(1, 1, Point3::new(0., 120., 30.));
    traveler.grant_entitlement(NORTHERN_CONTINENT);
    world.insert_entity(traveler.clone());
    if let Some(zeppelin) = platforms.iter().find(|p| p.entry() == 21) {
        zeppelin.board(&traveler);
    }

    let mut handles = Vec::new();
    for platform in platforms {
        info!(
            platform = platform.name(),
            period_ms = platform.period_ms(),
            "launching tick thread"
        );
        handles.push(launch_tick_thread(platform, world.clone()));
    }

    tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    info!("shutting down");
    for (stop, handle) in handles {
        let _ = stop.send(());
        let _ = handle.await;
    }
}
