//! Keyframe builder and the distance-to-time motion law.

use super::BuildError;
use crate::math::Point3;
use crate::path::{ActionFlag, PathNode};
use crate::world::MapId;

/// velocity cap in units/s; acceleration is a constant 1 unit/s^2
pub const MAX_SPEED: f32 = 30.;

/// distance covered while accelerating from standstill to the cap
const ACCEL_DIST: f32 = 0.5 * MAX_SPEED * MAX_SPEED;

/// time in ms spent accelerating from standstill to the cap
const ACCEL_TIME_MS: f32 = MAX_SPEED * 1000.;

#[derive(Clone, Copy, Debug)]
pub struct Keyframe {
    pub map: MapId,
    pub pos: Point3,
    pub action: ActionFlag,
    pub wait_secs: u32,
    /// euclidean distance to the cyclically prior keyframe, 0 across a jump
    pub dist_from_prev: f32,
    pub dist_since_stop: f32,
    pub dist_until_stop: f32,
    pub time_from_stop_ms: f32,
    pub time_to_stop_ms: f32,
}

impl Keyframe {
    fn from_node(node: &PathNode) -> Self {
        Self {
            map: node.map,
            pos: node.pos,
            action: node.action,
            wait_secs: node.wait_secs,
            dist_from_prev: 0.,
            dist_since_stop: 0.,
            dist_until_stop: 0.,
            time_from_stop_ms: 0.,
            time_to_stop_ms: 0.,
        }
    }

    fn is_stop(&self) -> bool {
        self.action == ActionFlag::Stop
    }
}

/// Time in ms to cover `dist` units starting from standstill: constant
/// 1 unit/s^2 acceleration up to the cap, then the cap.
pub fn travel_time_ms(dist: f32) -> f32 {
    if dist < ACCEL_DIST {
        1000. * (2. * dist).sqrt()
    } else {
        1000. * (((dist - ACCEL_DIST) / MAX_SPEED) + MAX_SPEED)
    }
}

/// Inverse of [`travel_time_ms`]: distance covered after `t_ms` from standstill.
pub(super) fn dist_at(t_ms: f32) -> f32 {
    if t_ms <= ACCEL_TIME_MS {
        0.5 * (t_ms / 1000.).powi(2)
    } else {
        ACCEL_DIST + MAX_SPEED * ((t_ms - ACCEL_TIME_MS) / 1000.)
    }
}

/// Turns raw path nodes into interpolatable keyframes.
///
/// The first and last nodes are map-transition anchors and never emitted.
/// Runs of nodes sharing a map become keyframes; a map change consumes
/// exactly one transition node.  Distances close the loop: the first
/// keyframe's previous neighbour is the last keyframe.
pub fn build_keyframes(path: &[PathNode]) -> Result<Vec<Keyframe>, BuildError> {
    let mut frames: Vec<Keyframe> = Vec::new();
    let mut map_change = 0u32;
    for i in 1..path.len().saturating_sub(1) {
        if map_change == 0 {
            if path[i].map == path[i + 1].map {
                frames.push(Keyframe::from_node(&path[i]));
            } else {
                map_change = 1;
            }
        } else {
            map_change -= 1;
        }
    }

    if frames.len() < 2 {
        return Err(BuildError::TooFewKeyframes(frames.len()));
    }
    let n = frames.len();

    for i in 0..n {
        let prev = (i + n - 1) % n;
        let jump = frames[prev].action == ActionFlag::TeleportAnchor
            || frames[prev].map != frames[i].map;
        frames[i].dist_from_prev = if jump {
            0.
        } else {
            frames[prev].pos.distance_to(frames[i].pos)
        };
    }

    let stops: Vec<usize> = (0..n).filter(|&i| frames[i].is_stop()).collect();
    if stops.is_empty() {
        // non-stopping loop: plain cumulative distances, no resets
        let mut acc = 0.;
        for frame in frames.iter_mut() {
            acc += frame.dist_from_prev;
            frame.dist_since_stop = acc;
        }
        let mut acc = 0.;
        for i in (0..n).rev() {
            acc += frames[(i + 1) % n].dist_from_prev;
            frames[i].dist_until_stop = acc;
        }
    } else {
        let first_stop = stops[0];
        let last_stop = stops[stops.len() - 1];

        // forward pass from the last stop, resetting at every stop
        let mut acc = 0.;
        for k in 0..n {
            let j = (last_stop + k) % n;
            if frames[j].is_stop() {
                acc = 0.;
            } else {
                acc += frames[j].dist_from_prev;
            }
            frames[j].dist_since_stop = acc;
        }

        // backward pass ending at the first stop; a stop's own entry carries
        // the full span to the next stop ahead
        let mut acc = 0.;
        for k in 0..n {
            let j = (first_stop + n - 1 - k) % n;
            let next = (j + 1) % n;
            if frames[next].is_stop() {
                acc = 0.;
            }
            acc += frames[next].dist_from_prev;
            frames[j].dist_until_stop = acc;
        }
    }

    for frame in frames.iter_mut() {
        frame.time_from_stop_ms = travel_time_ms(frame.dist_since_stop);
        frame.time_to_stop_ms = travel_time_ms(frame.dist_until_stop);
    }

    Ok(frames)
}
