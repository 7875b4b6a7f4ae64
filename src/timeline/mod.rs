//! Dense, time-indexed motion schedule for one full loop of a path.
//!
//! Built once at platform creation: raw nodes are filtered into keyframes,
//! keyframe distances become times under the bounded-acceleration law, and
//! the sampler expands keyframe pairs into a size-bounded set of samples.
//! Immutable afterwards; the runtime cycle driver only reads it.

mod keyframe;
mod sampler;

pub use keyframe::{build_keyframes, travel_time_ms, Keyframe, MAX_SPEED};
pub use sampler::sample_timeline;

use crate::math::Point3;
use crate::path::PathId;
use crate::world::MapId;
use std::collections::BTreeMap;

#[derive(Debug)]
pub enum BuildError {
    MissingPathData(PathId),
    TooFewKeyframes(usize),
    EmptyTimeline,
    ZeroPeriod,
    PeriodMismatch { configured: u32, derived: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub map: MapId,
    pub pos: Point3,
    /// reached by a map jump rather than by sailing
    pub teleport: bool,
    /// dock dwell long enough to warrant an arrival announcement
    pub delayed: bool,
}

/// Ordered `elapsed ms -> waypoint` schedule.  Keys are strictly increasing,
/// the first key is 0 and the last key is below `period_ms`.  Cyclic access
/// goes through explicit modular index arithmetic, not a linked ring.
pub struct Timeline {
    samples: Vec<(u32, Waypoint)>,
    period_ms: u32,
}

impl Timeline {
    pub(crate) fn from_samples(
        samples: BTreeMap<u32, Waypoint>,
        period_ms: u32,
    ) -> Result<Self, BuildError> {
        if samples.len() < 2 {
            return Err(BuildError::EmptyTimeline);
        }
        if period_ms == 0 {
            return Err(BuildError::ZeroPeriod);
        }
        Ok(Self {
            samples: samples.into_iter().collect(),
            period_ms,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn key(&self, index: usize) -> u32 {
        self.samples[index].0
    }

    pub fn waypoint(&self, index: usize) -> &Waypoint {
        &self.samples[index].1
    }

    /// Successor index, wrapping past the last entry to the first.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.samples.len()
    }

    /// Elapsed ms from `from_ms` forward to `to_ms` on the cyclic clock.
    pub fn cyclic_delta(&self, from_ms: u32, to_ms: u32) -> u32 {
        (to_ms % self.period_ms + self.period_ms - from_ms % self.period_ms) % self.period_ms
    }

    pub fn entries(&self) -> impl Iterator<Item = &(u32, Waypoint)> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint() -> Waypoint {
        Waypoint {
            map: 1,
            pos: Point3::zero(),
            teleport: false,
            delayed: false,
        }
    }

    fn timeline(keys: &[u32], period_ms: u32) -> Timeline {
        let samples: BTreeMap<u32, Waypoint> = keys.iter().map(|k| (*k, waypoint())).collect();
        Timeline::from_samples(samples, period_ms).expect("valid timeline")
    }

    #[test]
    fn rejects_degenerate_schedules() {
        let one: BTreeMap<u32, Waypoint> = [(0, waypoint())].into_iter().collect();
        assert!(matches!(
            Timeline::from_samples(one, 1000),
            Err(BuildError::EmptyTimeline)
        ));

        let two: BTreeMap<u32, Waypoint> = [(0, waypoint()), (500, waypoint())]
            .into_iter()
            .collect();
        assert!(matches!(
            Timeline::from_samples(two, 0),
            Err(BuildError::ZeroPeriod)
        ));
    }

    #[test]
    fn next_index_wraps() {
        let tl = timeline(&[0, 1000, 2000], 3000);
        assert_eq!(tl.next_index(0), 1);
        assert_eq!(tl.next_index(2), 0);
    }

    #[test]
    fn cyclic_delta_handles_the_wrap_boundary() {
        let tl = timeline(&[0, 1000, 2000], 3000);
        assert_eq!(tl.cyclic_delta(0, 2500), 2500);
        assert_eq!(tl.cyclic_delta(2000, 500), 1500);
        assert_eq!(tl.cyclic_delta(2000, 2000), 0);
        // wrap from the last key back to key 0
        assert_eq!(tl.cyclic_delta(2000, 0), 1000);
    }

    #[test]
    fn every_phase_resolves_to_exactly_one_bracket() {
        let tl = timeline(&[0, 700, 1500, 2400], 3000);
        for phase in 0..3000u32 {
            let mut brackets = 0;
            for i in 0..tl.len() {
                let next = tl.next_index(i);
                if tl.cyclic_delta(tl.key(i), phase) < tl.cyclic_delta(tl.key(i), tl.key(next)) {
                    brackets += 1;
                }
            }
            assert_eq!(brackets, 1, "phase {phase} must fall in one bracket");
        }
    }
}
