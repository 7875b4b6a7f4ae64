//! Map/entity registry.
//!
//! An explicit registry object is threaded through construction and ticking
//! instead of process-wide singletons.  Handles are cheap to clone: every
//! mutable field sits behind its own `Arc<Mutex<_>>`.

use crate::math::Point3;
use crate::IgnoreMutexErr;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type MapId = u32;
pub type EntityId = u64;
pub type TemplateId = u32;

/// Bitmask of content packs an account has access to.  0 means no requirement.
pub type EntitlementFlags = u32;

#[derive(Clone, Copy, Debug)]
pub struct MapInfo {
    /// entitlement an entity must hold to enter this map
    pub required_entitlement: EntitlementFlags,
    /// where entities without the entitlement get redirected
    pub fallback_point: Point3,
}

impl MapInfo {
    pub fn open(fallback_point: Point3) -> Self {
        Self {
            required_entitlement: 0,
            fallback_point,
        }
    }

    pub fn gated(required_entitlement: EntitlementFlags, fallback_point: Point3) -> Self {
        Self {
            required_entitlement,
            fallback_point,
        }
    }
}

/// Template for an entity scripted onto a platform (crew, vendors).
#[derive(Clone, Debug)]
pub struct ScriptedTemplate {
    pub entry: TemplateId,
    pub name: String,
}

#[derive(Clone, Default)]
pub struct Entity {
    id: EntityId,
    pos: Arc<Mutex<Point3>>,
    map: Arc<Mutex<MapId>>,
    entitlements: Arc<Mutex<EntitlementFlags>>,
}

impl Entity {
    pub fn new(id: EntityId, map: MapId, pos: Point3) -> Self {
        Self {
            id,
            pos: Arc::new(Mutex::new(pos)),
            map: Arc::new(Mutex::new(map)),
            entitlements: Arc::new(Mutex::new(0)),
        }
    }

    pub fn get_id(&self) -> EntityId {
        self.id
    }

    pub fn get_pos(&self) -> Point3 {
        *self.pos.lock().unwrap_ignore_poison()
    }

    pub fn set_pos(&self, pos: Point3) {
        *self.pos.lock().unwrap_ignore_poison() = pos;
    }

    pub fn get_map(&self) -> MapId {
        *self.map.lock().unwrap_ignore_poison()
    }

    /// Move the entity into another map under its own identity.
    pub fn relocate(&self, map: MapId, pos: Point3) {
        *self.map.lock().unwrap_ignore_poison() = map;
        *self.pos.lock().unwrap_ignore_poison() = pos;
    }

    pub fn grant_entitlement(&self, flags: EntitlementFlags) {
        *self.entitlements.lock().unwrap_ignore_poison() |= flags;
    }

    pub fn has_entitlement(&self, required: EntitlementFlags) -> bool {
        required == 0 || (*self.entitlements.lock().unwrap_ignore_poison() & required) == required
    }
}

#[derive(Clone, Default)]
pub struct World {
    maps: Arc<Mutex<HashMap<MapId, MapInfo>>>,
    entities: Arc<Mutex<HashMap<EntityId, Entity>>>,
    templates: Arc<Mutex<HashMap<TemplateId, ScriptedTemplate>>>,
    // id allocator for scripted entities, kept on the registry rather than in a global
    next_scripted_id: Arc<Mutex<EntityId>>,
}

const SCRIPTED_ID_BASE: EntityId = 1 << 48;

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_map(&self, id: MapId, info: MapInfo) {
        self.maps.lock().unwrap_ignore_poison().insert(id, info);
    }

    pub fn map_info(&self, id: MapId) -> Option<MapInfo> {
        self.maps.lock().unwrap_ignore_poison().get(&id).copied()
    }

    pub fn insert_entity(&self, entity: Entity) {
        self.entities
            .lock()
            .unwrap_ignore_poison()
            .insert(entity.get_id(), entity);
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.lock().unwrap_ignore_poison().get(&id).cloned()
    }

    pub fn remove_entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.lock().unwrap_ignore_poison().remove(&id)
    }

    pub fn register_template(&self, template: ScriptedTemplate) {
        self.templates
            .lock()
            .unwrap_ignore_poison()
            .insert(template.entry, template);
    }

    pub fn template(&self, id: TemplateId) -> Option<ScriptedTemplate> {
        self.templates.lock().unwrap_ignore_poison().get(&id).cloned()
    }

    /// Instantiate a scripted template as a live entity.  Returns `None` for
    /// an unknown template id.
    pub fn spawn_scripted(&self, template: TemplateId, map: MapId, pos: Point3) -> Option<Entity> {
        let info = self.template(template)?;
        let id = {
            let mut next = self.next_scripted_id.lock().unwrap_ignore_poison();
            *next += 1;
            SCRIPTED_ID_BASE | *next
        };
        debug!(template, id, name = %info.name, "spawned scripted entity");
        let entity = Entity::new(id, map, pos);
        self.insert_entity(entity.clone());
        Some(entity)
    }
}
