//! Entities riding a platform and the cross-map relocation protocol.

use crate::events::SessionLayer;
use crate::math::{Point3, Vec3};
use crate::world::{Entity, EntityId, MapId, World};
use std::collections::HashMap;
use tracing::{debug, warn};

/// What happened to one boarded passenger during a map change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Transferred,
    /// missing destination entitlement; sent to the fallback point and dropped
    RedirectedToFallback,
    /// no longer present in the registry
    Dropped,
    /// destination map unresolvable; left in place, no retry
    Stranded,
}

#[derive(Default)]
pub struct Cohort {
    boarded: HashMap<EntityId, (Entity, Vec3)>,
    attached: Vec<(Entity, Vec3)>,
    loose: HashMap<EntityId, Entity>,
}

impl Cohort {
    /// Starts tracking a boarded passenger.  Idempotent: a repeated board
    /// keeps the offset captured the first time.
    pub fn board(&mut self, entity: &Entity, platform_pos: Point3) {
        self.boarded
            .entry(entity.get_id())
            .or_insert_with(|| (entity.clone(), entity.get_pos() - platform_pos));
    }

    /// Stops tracking without moving the entity.
    pub fn disembark(&mut self, id: EntityId) {
        self.boarded.remove(&id);
    }

    pub fn boarded_offset(&self, id: EntityId) -> Option<Vec3> {
        self.boarded.get(&id).map(|(_, offset)| *offset)
    }

    pub fn boarded_count(&self) -> usize {
        self.boarded.len()
    }

    /// Binds a scripted entity at a fixed offset for the platform's lifetime.
    pub fn attach(&mut self, entity: Entity, offset: Vec3) {
        self.attached.push((entity, offset));
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn add_loose_rider(&mut self, entity: &Entity) {
        self.loose.insert(entity.get_id(), entity.clone());
    }

    pub fn clear_loose_riders(&mut self) {
        self.loose.clear();
    }

    pub fn loose_rider_count(&self) -> usize {
        self.loose.len()
    }

    /// Same-map repositioning: boarded and attached entities follow the
    /// platform at their stored offsets.
    pub fn move_all(&self, platform_pos: Point3) {
        for (entity, offset) in self.boarded.values() {
            entity.set_pos(platform_pos + *offset);
        }
        for (entity, offset) in &self.attached {
            entity.set_pos(platform_pos + *offset);
        }
    }

    /// Carries the bound scripted entities into the destination map.  They
    /// are moved in lockstep, never routed through the relocation protocol.
    pub fn carry_attached(&self, dest_map: MapId, platform_pos: Point3) {
        for (entity, offset) in &self.attached {
            entity.relocate(dest_map, platform_pos + *offset);
        }
    }

    /// Cross-map relocation protocol.  Every boarded passenger is handled
    /// independently; one passenger's failure never blocks the others, and
    /// the caller switches the platform's own map only after this returns.
    pub fn relocate_across_maps(
        &mut self,
        world: &World,
        sessions: &dyn SessionLayer,
        platform_entry: u32,
        dest_map: MapId,
        dest_pos: Point3,
        src_map: MapId,
    ) -> Vec<(EntityId, TransferOutcome)> {
        let dest_info = world.map_info(dest_map);
        let mut outcomes = Vec::with_capacity(self.boarded.len());

        let ids: Vec<EntityId> = self.boarded.keys().copied().collect();
        for id in ids {
            // the registry is the source of truth, stale handles are dropped
            let Some(entity) = world.entity(id) else {
                self.boarded.remove(&id);
                outcomes.push((id, TransferOutcome::Dropped));
                continue;
            };

            let Some(dest_info) = dest_info else {
                warn!(
                    entity = id,
                    map = dest_map,
                    "destination map not in registry, passenger stranded"
                );
                self.boarded.remove(&id);
                outcomes.push((id, TransferOutcome::Stranded));
                continue;
            };

            if !entity.has_entitlement(dest_info.required_entitlement) {
                // no access to the destination content: repop at the fallback
                // point of the map the passenger is currently on
                if let Some(here) = world.map_info(entity.get_map()) {
                    entity.set_pos(here.fallback_point);
                }
                debug!(entity = id, map = dest_map, "passenger lacks entitlement, redirected");
                self.boarded.remove(&id);
                outcomes.push((id, TransferOutcome::RedirectedToFallback));
                continue;
            }

            sessions.transfer_pending(id, dest_map, platform_entry, src_map);
            let offset = self
                .boarded
                .get(&id)
                .map(|(_, offset)| *offset)
                .unwrap_or_default();
            entity.relocate(dest_map, dest_pos + offset);
            outcomes.push((id, TransferOutcome::Transferred));
        }

        outcomes
    }

    /// Drops all tracking; riders keep whatever position they last had.
    pub fn release_all(&mut self) {
        self.boarded.clear();
        self.attached.clear();
        self.loose.clear();
    }
}
