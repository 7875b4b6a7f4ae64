//! Expands keyframes into the dense time-indexed schedule.

use super::keyframe::{dist_at, Keyframe};
use super::{BuildError, Timeline, Waypoint};
use crate::path::ActionFlag;
use std::collections::BTreeMap;

/// simulated-time step while walking a leg
const STEP_MS: u32 = 100;

/// minimum spacing between retained samples; teleport edges are always kept
const RETAIN_MS: u32 = 1000;

/// dwell above this (strictly) marks the arrival as delayed
const DELAY_THRESHOLD_SECS: u32 = 5;

/// Walks every cyclic keyframe pair `(k[i], k[(i+1) % n])` and samples the
/// interpolated position in 100 ms steps, keeping a sample when it is a
/// teleport edge or at least a second has passed since the last kept one.
/// Each leg ends with an exact-arrival sample and the arrival keyframe's
/// dwell added to elapsed time; the closing leg arrives back at the t=0
/// sample, and the elapsed time at that point is the period.
pub fn sample_timeline(frames: &[Keyframe]) -> Result<Timeline, BuildError> {
    let n = frames.len();
    debug_assert!(n >= 2);

    // the t=0 sample doubles as the closing leg's arrival, so the first
    // keyframe's dwell decides its announcement
    let mut samples: BTreeMap<u32, Waypoint> = BTreeMap::new();
    samples.insert(
        0,
        Waypoint {
            map: frames[0].map,
            pos: frames[0].pos,
            teleport: frames[n - 1].map != frames[0].map,
            delayed: frames[0].wait_secs > DELAY_THRESHOLD_SECS,
        },
    );
    let mut t: u32 = frames[0].wait_secs * 1000;
    let mut last_t: u32 = 0;
    let mut cur_map = frames[0].map;

    for i in 0..n {
        let next = (i + 1) % n;
        let leg_dist = frames[next].dist_from_prev;
        let mut t_from = frames[i].time_from_stop_ms;
        let mut t_to = frames[i].time_to_stop_ms;
        let mut d = 0.;

        if leg_dist > 0. && t_to > 0. {
            while d < leg_dist && t_to > 0. {
                t_from += STEP_MS as f32;
                t_to -= STEP_MS as f32;

                if d > 0. {
                    let teleport = frames[i].map != cur_map;
                    if teleport {
                        cur_map = frames[i].map;
                    }
                    if teleport || t - last_t >= RETAIN_MS {
                        samples.insert(
                            t,
                            Waypoint {
                                map: frames[i].map,
                                pos: frames[i].pos.lerp(frames[next].pos, d / leg_dist),
                                teleport,
                                delayed: false,
                            },
                        );
                        last_t = t;
                    }
                }

                // whichever dock is closer in time governs the local speed
                d = if t_from < t_to {
                    dist_at(t_from) - frames[i].dist_since_stop
                } else {
                    frames[i].dist_until_stop - dist_at(t_to)
                };
                t += STEP_MS;
            }
            t -= STEP_MS;
        }

        // snap to the exact arrival time
        if frames[next].time_from_stop_ms > frames[next].time_to_stop_ms {
            t += STEP_MS - (frames[next].time_to_stop_ms as u32 % STEP_MS);
        } else {
            t += frames[next].time_to_stop_ms as u32 % STEP_MS;
        }

        let teleport = frames[next].action == ActionFlag::TeleportAnchor
            || frames[next].map != frames[i].map;
        if teleport {
            cur_map = frames[next].map;
        }

        if next == 0 {
            // closing leg: the arrival is the existing t=0 sample and the
            // first keyframe's dwell was already counted up front
            break;
        }

        samples.entry(t).or_insert(Waypoint {
            map: frames[next].map,
            pos: frames[next].pos,
            teleport,
            delayed: frames[next].wait_secs > DELAY_THRESHOLD_SECS,
        });
        last_t = t;
        t += frames[next].wait_secs * 1000;
    }

    Timeline::from_samples(samples, t)
}

#[cfg(test)]
mod tests {
    use super::super::{build_keyframes, travel_time_ms};
    use super::*;
    use crate::math::Point3;
    use crate::path::PathNode;
    use crate::world::MapId;

    fn node(map: MapId, x: f32, action: ActionFlag, wait_secs: u32) -> PathNode {
        PathNode::new(map, Point3::new(x, 0., 0.), action, wait_secs)
    }

    fn build(path: &[PathNode]) -> Timeline {
        sample_timeline(&build_keyframes(path).expect("keyframes")).expect("timeline")
    }

    /// Out-and-back ferry: two stops 100 units apart, 5 s dwell each.
    fn ferry_path() -> Vec<PathNode> {
        vec![
            node(1, 0., ActionFlag::TeleportAnchor, 0),
            node(1, 0., ActionFlag::Stop, 5),
            node(1, 100., ActionFlag::Stop, 5),
            node(1, 100., ActionFlag::TeleportAnchor, 0),
        ]
    }

    #[test]
    fn keys_strictly_increase_and_stay_below_the_period() {
        let tl = build(&ferry_path());
        let keys: Vec<u32> = tl.entries().map(|(k, _)| *k).collect();
        assert_eq!(keys[0], 0);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(*keys.last().expect("non-empty") < tl.period_ms());
    }

    #[test]
    fn ferry_period_covers_both_legs_and_both_dwells() {
        let tl = build(&ferry_path());
        // travel one way: accelerate-from-stop over 100 units
        let travel = travel_time_ms(100.) as u32;
        let expected = 2 * travel + 2 * 5000;
        assert!(
            (tl.period_ms() as i64 - expected as i64).abs() <= 2,
            "period {} vs expected {}",
            tl.period_ms(),
            expected
        );
    }

    #[test]
    fn ferry_timeline_starts_at_the_first_stop() {
        let tl = build(&ferry_path());
        let (k, wp) = tl.entries().next().expect("first sample");
        assert_eq!(*k, 0);
        assert_eq!(wp.pos, Point3::new(0., 0., 0.));
        assert!(!wp.teleport);
        assert!(!wp.delayed);
    }

    #[test]
    fn travel_samples_are_spaced_about_a_second_apart() {
        let tl = build(&ferry_path());
        let travel_keys: Vec<u32> = tl
            .entries()
            .map(|(k, _)| *k)
            .filter(|k| (5000..19000).contains(k))
            .collect();
        assert!(travel_keys.len() > 10);
        assert!(travel_keys.windows(2).all(|w| w[1] - w[0] == 1000));
    }

    #[test]
    fn arrival_sample_lands_on_the_far_dock_at_the_exact_travel_time() {
        let tl = build(&ferry_path());
        let arrival = 5000 + travel_time_ms(100.) as u32;
        let (_, wp) = tl
            .entries()
            .find(|(k, _)| *k == arrival)
            .expect("arrival sample present");
        assert_eq!(wp.pos, Point3::new(100., 0., 0.));
        // a 5 s dwell is not strictly above the threshold
        assert!(!wp.delayed);
    }

    #[test]
    fn single_stop_loop_is_round_trip_plus_one_dwell() {
        let path = vec![
            node(1, 0., ActionFlag::TeleportAnchor, 0),
            node(1, 0., ActionFlag::Stop, 5),
            node(1, 100., ActionFlag::None, 0),
            node(1, 100., ActionFlag::TeleportAnchor, 0),
        ];
        let tl = build(&path);

        // the lone dwell is served once, before the outbound leg
        let turnaround = tl
            .entries()
            .find(|(_, wp)| wp.pos == Point3::new(100., 0., 0.))
            .expect("turnaround sample present")
            .0;
        assert!(turnaround > 5000);

        // the return leg decelerates into the stop, so its duration is the
        // exact law time; the outbound handoff may arrive up to a step early
        let return_leg = tl.period_ms() - turnaround;
        let law = travel_time_ms(100.) as u32;
        assert!(return_leg <= law + STEP_MS && return_leg + STEP_MS >= law);

        // period = outbound + return + one dwell, and nothing more
        let outbound = turnaround - 5000;
        assert!(outbound > 0 && outbound <= law + STEP_MS);
        assert_eq!(tl.period_ms(), 5000 + outbound + return_leg);
    }

    #[test]
    fn long_dwell_marks_the_arrival_delayed() {
        let path = vec![
            node(1, 0., ActionFlag::TeleportAnchor, 0),
            node(1, 0., ActionFlag::Stop, 5),
            node(1, 100., ActionFlag::Stop, 6),
            node(1, 100., ActionFlag::TeleportAnchor, 0),
        ];
        let tl = build(&path);
        let delayed: Vec<&Waypoint> = tl
            .entries()
            .filter(|(_, wp)| wp.delayed)
            .map(|(_, wp)| wp)
            .collect();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].pos, Point3::new(100., 0., 0.));
    }

    #[test]
    fn long_dwell_at_the_first_stop_marks_the_start_delayed() {
        let path = vec![
            node(1, 0., ActionFlag::TeleportAnchor, 0),
            node(1, 0., ActionFlag::Stop, 6),
            node(1, 100., ActionFlag::Stop, 5),
            node(1, 100., ActionFlag::TeleportAnchor, 0),
        ];
        let tl = build(&path);
        // the closing leg sails back into the first stop, so its 6 s dwell
        // warrants an announcement on the t=0 sample
        assert!(tl.waypoint(0).delayed);
        assert!(!tl.waypoint(0).teleport);
    }

    #[test]
    fn teleport_edges_are_never_skipped() {
        let path = vec![
            node(1, 0., ActionFlag::TeleportAnchor, 0),
            node(1, 0., ActionFlag::Stop, 2),
            node(1, 10., ActionFlag::None, 0),
            node(2, 0., ActionFlag::None, 0),
            node(2, 0., ActionFlag::None, 0),
            node(2, 50., ActionFlag::Stop, 6),
            node(2, 60., ActionFlag::TeleportAnchor, 0),
        ];
        let tl = build(&path);
        // wrap back from map 2 to map 1 happens at the t=0 sample
        assert!(tl.waypoint(0).teleport);
        assert_eq!(tl.waypoint(0).map, 1);
        // the jump onto map 2 is a retained teleport sample
        let (_, jump) = tl
            .entries()
            .find(|(_, wp)| wp.map == 2 && wp.teleport)
            .expect("teleport sample onto map 2");
        assert_eq!(jump.pos, Point3::new(0., 0., 0.));
    }
}
