//! The platform aggregate and its runtime cycle driver.

use crate::cohort::{Cohort, TransferOutcome};
use crate::events::{Announcer, DockSignalTable, SessionLayer, VisualClassId};
use crate::math::{Point3, Vec3};
use crate::path::{PathId, PathSource};
use crate::timeline::{build_keyframes, sample_timeline, BuildError, Timeline};
use crate::world::{Entity, EntityId, MapId, TemplateId, World};
use crate::IgnoreMutexErr;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub type EntryId = u32;

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PlatformConfig {
    pub entry: EntryId,
    pub name: String,
    pub visual_class: VisualClassId,
    pub path: PathId,
    /// externally configured oscillation period; must agree with the period
    /// derived from the path data, `None` adopts the derived one
    #[serde(default)]
    pub oscillation_period_ms: Option<u32>,
}

/// Spawn-time binding of a scripted template to a platform.
#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct ScriptedAttachment {
    pub platform_entry: EntryId,
    pub template: TemplateId,
    pub offset: Vec3,
}

/// Current and next sample indices; always timeline-adjacent under the
/// cyclic ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RuntimeCursor {
    current: usize,
    next: usize,
}

/// A cyclically moving platform.  Cheap to clone; the timeline is shared
/// immutably and the runtime state sits behind mutexes that only the owning
/// tick task mutates.
#[derive(Clone)]
pub struct Platform {
    entry: EntryId,
    name: String,
    visual_class: VisualClassId,
    timeline: Arc<Timeline>,
    cursor: Arc<Mutex<RuntimeCursor>>,
    map: Arc<Mutex<MapId>>,
    pos: Arc<Mutex<Point3>>,
    cohort: Arc<Mutex<Cohort>>,
    sessions: Arc<dyn SessionLayer>,
    announcer: Arc<dyn Announcer>,
    signals: Arc<DockSignalTable>,
}

impl Platform {
    /// Builds the timeline from path data and places the platform at its
    /// first sample.  Any failure leaves the platform unregistered.
    pub fn create(
        config: &PlatformConfig,
        source: &dyn PathSource,
        sessions: Arc<dyn SessionLayer>,
        announcer: Arc<dyn Announcer>,
        signals: Arc<DockSignalTable>,
    ) -> Result<Platform, BuildError> {
        let nodes = source.nodes_for(config.path);
        if nodes.is_empty() {
            return Err(BuildError::MissingPathData(config.path));
        }
        let frames = build_keyframes(&nodes)?;
        let timeline = sample_timeline(&frames)?;
        if let Some(configured) = config.oscillation_period_ms {
            if configured != timeline.period_ms() {
                return Err(BuildError::PeriodMismatch {
                    configured,
                    derived: timeline.period_ms(),
                });
            }
        }

        let first = *timeline.waypoint(0);
        Ok(Platform {
            entry: config.entry,
            name: config.name.clone(),
            visual_class: config.visual_class,
            timeline: Arc::new(timeline),
            cursor: Arc::new(Mutex::new(RuntimeCursor { current: 0, next: 1 })),
            map: Arc::new(Mutex::new(first.map)),
            pos: Arc::new(Mutex::new(first.pos)),
            cohort: Arc::new(Mutex::new(Cohort::default())),
            sessions,
            announcer,
            signals,
        })
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_map(&self) -> MapId {
        *self.map.lock().unwrap_ignore_poison()
    }

    pub fn get_pos(&self) -> Point3 {
        *self.pos.lock().unwrap_ignore_poison()
    }

    pub fn period_ms(&self) -> u32 {
        self.timeline.period_ms()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn board(&self, entity: &Entity) {
        self.cohort
            .lock()
            .unwrap_ignore_poison()
            .board(entity, self.get_pos());
    }

    pub fn disembark(&self, entity: &Entity) {
        self.cohort
            .lock()
            .unwrap_ignore_poison()
            .disembark(entity.get_id());
    }

    pub fn boarded_offset(&self, id: EntityId) -> Option<Vec3> {
        self.cohort.lock().unwrap_ignore_poison().boarded_offset(id)
    }

    pub fn add_loose_rider(&self, entity: &Entity) {
        self.cohort
            .lock()
            .unwrap_ignore_poison()
            .add_loose_rider(entity);
    }

    /// Spawns a scripted template and binds it at `offset` for the
    /// platform's lifetime.  An unknown template id is skipped; that is a
    /// data-integrity condition, not a runtime fault.
    pub fn attach_scripted_entity(&self, world: &World, template: TemplateId, offset: Vec3) {
        match world.spawn_scripted(template, self.get_map(), self.get_pos() + offset) {
            Some(entity) => {
                self.cohort
                    .lock()
                    .unwrap_ignore_poison()
                    .attach(entity, offset);
            }
            None => {
                debug!(template, platform = %self.name, "unknown scripted template, skipped");
            }
        }
    }

    /// One step of the runtime cycle driver, invoked at the tick cadence.
    ///
    /// The phase is the wall clock modulo the timeline period; the cursor
    /// advances while the phase has reached or passed the next sample,
    /// with all comparisons in modular time so the wrap boundary behaves.
    /// At most one map change happens per tick.
    pub fn tick(&self, wall_clock_ms: u64, world: &World) {
        let timeline = &self.timeline;
        if timeline.len() <= 1 {
            return;
        }
        let phase = (wall_clock_ms % timeline.period_ms() as u64) as u32;

        loop {
            let cursor = *self.cursor.lock().unwrap_ignore_poison();
            let cur_key = timeline.key(cursor.current);
            let next_key = timeline.key(cursor.next);
            if timeline.cyclic_delta(cur_key, phase) < timeline.cyclic_delta(cur_key, next_key) {
                break;
            }

            let advanced = RuntimeCursor {
                current: cursor.next,
                next: timeline.next_index(cursor.next),
            };
            *self.cursor.lock().unwrap_ignore_poison() = advanced;
            let waypoint = *timeline.waypoint(advanced.current);

            if waypoint.map != self.get_map() || waypoint.teleport {
                self.change_map(world, waypoint.map, waypoint.pos);
                // at most one map change per tick
                break;
            }

            {
                let mut pos = self.pos.lock().unwrap_ignore_poison();
                *pos = waypoint.pos;
            }
            self.cohort
                .lock()
                .unwrap_ignore_poison()
                .move_all(waypoint.pos);

            if waypoint.delayed {
                let sound = self.signals.signal_for(self.visual_class);
                debug!(platform = %self.name, at = phase, sound, "docked");
                self.announcer.dock_signal(self.entry, sound);
            }
        }
    }

    fn change_map(&self, world: &World, dest_map: MapId, dest_pos: Point3) {
        let src_map = self.get_map();
        let mut cohort = self.cohort.lock().unwrap_ignore_poison();
        cohort.clear_loose_riders();
        let outcomes = cohort.relocate_across_maps(
            world,
            self.sessions.as_ref(),
            self.entry,
            dest_map,
            dest_pos,
            src_map,
        );
        for (entity, outcome) in &outcomes {
            if *outcome != TransferOutcome::Transferred {
                debug!(platform = %self.name, entity, ?outcome, "passenger left the cohort");
            }
        }

        // the platform itself switches only after every passenger was handled
        {
            let mut map = self.map.lock().unwrap_ignore_poison();
            let mut pos = self.pos.lock().unwrap_ignore_poison();
            *map = dest_map;
            *pos = dest_pos;
        }
        cohort.carry_attached(dest_map, dest_pos);
        debug!(platform = %self.name, from = src_map, to = dest_map, "map change complete");
    }

    /// Drops every rider back to an ownerless state.  Called once the tick
    /// task has stopped.
    pub fn release_passengers(&self) {
        self.cohort.lock().unwrap_ignore_poison().release_all();
    }
}

/// Loads every configured platform, attaches scripted entities, and returns
/// the active set.  A platform that fails construction is logged and
/// excluded; it never affects its siblings.
pub fn spawn_platforms(
    world: &World,
    configs: &[PlatformConfig],
    attachments: &[ScriptedAttachment],
    source: &dyn PathSource,
    sessions: Arc<dyn SessionLayer>,
    announcer: Arc<dyn Announcer>,
    signals: Arc<DockSignalTable>,
) -> Vec<Platform> {
    info!("loading {} platform configurations", configs.len());
    let mut platforms = Vec::new();
    for config in configs {
        match Platform::create(
            config,
            source,
            sessions.clone(),
            announcer.clone(),
            signals.clone(),
        ) {
            Ok(platform) => {
                debug!(
                    entry = config.entry,
                    name = %config.name,
                    period_ms = platform.period_ms(),
                    "platform loaded"
                );
                platforms.push(platform);
            }
            Err(e) => {
                error!(name = %config.name, error = ?e, "platform failed creation, excluded");
            }
        }
    }

    for attachment in attachments {
        match platforms
            .iter()
            .find(|p| p.entry() == attachment.platform_entry)
        {
            Some(platform) => {
                platform.attach_scripted_entity(world, attachment.template, attachment.offset)
            }
            None => warn!(
                entry = attachment.platform_entry,
                "no active platform for scripted attachment"
            ),
        }
    }

    info!("{} platforms active", platforms.len());
    platforms
}
