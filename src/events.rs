//! Outbound collaborator seams: dock announcements and session transfers.

use crate::world::{EntityId, MapId};
use std::collections::HashMap;

pub type SoundId = u32;
pub type VisualClassId = u32;

pub const SOUND_LIGHTHOUSE_HORN: SoundId = 5154;
pub const SOUND_ZEPPELIN_HORN: SoundId = 11804;
pub const SOUND_DOCKING_WARNING: SoundId = 5495;

/// Audio/broadcast collaborator for dock arrivals.
pub trait Announcer: Send + Sync {
    fn dock_signal(&self, platform_entry: u32, sound: SoundId);
}

/// Session layer of a passenger, told about a transfer before the map switch.
pub trait SessionLayer: Send + Sync {
    fn transfer_pending(&self, entity: EntityId, dest_map: MapId, platform_entry: u32, src_map: MapId);
}

/// Maps a platform's visual class to its dock-arrival signal.
pub struct DockSignalTable {
    by_class: HashMap<VisualClassId, SoundId>,
    fallback: SoundId,
}

impl DockSignalTable {
    /// Stock assignments: ship hulls get the lighthouse horn, zeppelins their
    /// own horn, anything else the generic docking warning.
    pub fn standard() -> Self {
        let mut by_class = HashMap::new();
        by_class.insert(3015, SOUND_LIGHTHOUSE_HORN);
        by_class.insert(7087, SOUND_LIGHTHOUSE_HORN);
        by_class.insert(3031, SOUND_ZEPPELIN_HORN);
        Self {
            by_class,
            fallback: SOUND_DOCKING_WARNING,
        }
    }

    pub fn with_signal(mut self, class: VisualClassId, sound: SoundId) -> Self {
        self.by_class.insert(class, sound);
        self
    }

    pub fn signal_for(&self, class: VisualClassId) -> SoundId {
        self.by_class.get(&class).copied().unwrap_or(self.fallback)
    }
}

impl Default for DockSignalTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Announcer that drops every signal, for tools that only need motion.
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn dock_signal(&self, _platform_entry: u32, _sound: SoundId) {}
}

/// Session layer that drops every notification.
pub struct NullSessionLayer;

impl SessionLayer for NullSessionLayer {
    fn transfer_pending(
        &self,
        _entity: EntityId,
        _dest_map: MapId,
        _platform_entry: u32,
        _src_map: MapId,
    ) {
    }
}
