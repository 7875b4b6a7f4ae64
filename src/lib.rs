pub mod cohort;
pub mod events;
pub mod math;
pub mod path;
pub mod platform;
pub mod timeline;
pub mod world;

use platform::Platform;
use std::sync::{LazyLock, LockResult};
use std::time::Duration;
use tokio::{
    select,
    sync::oneshot::{self, Sender},
    task::JoinHandle,
};
use tracing::{info, warn};
use world::World;

/// cadence of the runtime cycle driver
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

static EPOCH: LazyLock<tokio::time::Instant> = LazyLock::new(tokio::time::Instant::now);

/// Milliseconds on the wall clock shared by every platform, so their phases
/// stay aligned with each other.
pub fn wall_clock_ms() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}

pub trait IgnoreMutexErr<T> {
    fn unwrap_ignore_poison(self) -> T;
}

impl<T> IgnoreMutexErr<T> for LockResult<T> {
    fn unwrap_ignore_poison(self) -> T {
        match self {
            Ok(r) => r,
            Err(poisoned) => {
                // Handle mutex poisoning
                let guard = poisoned.into_inner();
                warn!("mutex was poisoned, recovering from mutex poisoning");
                guard
            }
        }
    }
}

async fn tick_loop(platform: &Platform, world: &World) {
    let mut interval = tokio::time::interval(TICK_PERIOD);
    loop {
        interval.tick().await; // first tick ticks immediately that's why it's at the beginning
        platform.tick(wall_clock_ms(), world);
    }
}

/// Registers a recurring tick for one platform.  Ticks of the same platform
/// never overlap; the returned sender tears the platform down, letting any
/// in-flight tick finish and releasing its passengers.
pub fn launch_tick_thread(platform: Platform, world: World) -> (Sender<()>, JoinHandle<()>) {
    let (stop_sender, stop_receiver) = oneshot::channel();
    let handle = tokio::spawn(async move {
        select! {
            _ = tick_loop(&platform, &world) => {}
            _ = stop_receiver => {
                info!(platform = platform.name(), "tick thread received stop signal")
            }
        };

        platform.release_passengers();
    });
    (stop_sender, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DockSignalTable, NullAnnouncer, NullSessionLayer};
    use crate::math::Point3;
    use crate::path::{ActionFlag, InMemoryPathSource, PathNode};
    use crate::platform::PlatformConfig;
    use crate::world::{Entity, MapInfo};
    use std::sync::Arc;

    fn ferry() -> (World, Platform) {
        let world = World::new();
        world.register_map(1, MapInfo::open(Point3::zero()));
        let mut source = InMemoryPathSource::new();
        source.insert(
            10,
            vec![
                PathNode::new(1, Point3::zero(), ActionFlag::TeleportAnchor, 0),
                PathNode::new(1, Point3::zero(), ActionFlag::Stop, 5),
                PathNode::new(1, Point3::new(100., 0., 0.), ActionFlag::Stop, 5),
                PathNode::new(1, Point3::new(100., 0., 0.), ActionFlag::TeleportAnchor, 0),
            ],
        );
        let config = PlatformConfig {
            entry: 1,
            name: "test ferry".into(),
            visual_class: 3015,
            path: 10,
            oscillation_period_ms: None,
        };
        let platform = Platform::create(
            &config,
            &source,
            Arc::new(NullSessionLayer),
            Arc::new(NullAnnouncer),
            Arc::new(DockSignalTable::standard()),
        )
        .expect("ferry builds");
        (world, platform)
    }

    #[tokio::test]
    async fn launch_and_teardown_release_passengers() {
        let (world, platform) = ferry();
        let rider = Entity::new(1, 1, Point3::new(1., 0., 0.));
        world.insert_entity(rider.clone());
        platform.board(&rider);
        assert!(platform.boarded_offset(1).is_some());

        let (stop, handle) = launch_tick_thread(platform.clone(), world);
        tokio::time::sleep(Duration::from_millis(250)).await;

        stop.send(()).expect("tick thread alive");
        handle.await.expect("tick thread joins");
        assert_eq!(platform.boarded_offset(1), None);
    }
}
