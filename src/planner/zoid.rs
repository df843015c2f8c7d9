//! Forward planner ("zoid"): per-block ramp synthesis, spec.md §4.4.
//!
//! Grounded on spec.md's closed-form ramp-length and quintic velocity
//! formulas directly; the teacher's `motion/s_curve.rs` contributed the
//! "S-curve via quintic, jerk continuous at endpoints" framing.

use crate::constants::{velocity_eq, MIN_BLOCK_TIME, MIN_SEGMENT_TIME};
use crate::planner::block::Hint;

/// Bound on the monotonic meet-velocity search iteration count, recorded
/// for diagnostics (spec.md §4.4 "iteration count is bounded and recorded").
pub const MAX_MEET_ITERATIONS: u32 = 32;
const MEET_TOLERANCE: f64 = 1e-6;

/// Length of a jerk-limited ramp between `v0` and `v1` at jerk `j`
/// (spec.md §4.4): `L = (v0 + v1) * sqrt(|v1 - v0| / j)`.
pub fn ramp_length(v0: f64, v1: f64, j: f64) -> f64 {
    if j <= 0.0 {
        return 0.0;
    }
    (v0 + v1) * ((v1 - v0).abs() / j).sqrt()
}

/// Time to traverse a jerk-limited ramp between `v0` and `v1` at jerk `j`:
/// twice the peak-acceleration rise time, `2 * sqrt(|v1-v0| / j)`.
pub fn ramp_time(v0: f64, v1: f64, j: f64) -> f64 {
    if j <= 0.0 {
        return 0.0;
    }
    2.0 * ((v1 - v0).abs() / j).sqrt()
}

/// The quintic S-curve velocity law, spec.md §4.4: `v(t) = v0 + (v1-v0) *
/// t^3 * (10 - 15t + 6t^2)`, continuous jerk at both endpoints.
pub fn quintic_velocity(v0: f64, v1: f64, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    v0 + (v1 - v0) * t.powi(3) * (10.0 - 15.0 * t + 6.0 * t * t)
}

/// A synthesized head/body/tail profile for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPlan {
    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,
    pub head_time: f64,
    pub body_time: f64,
    pub tail_time: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,
    pub hint: Hint,
    pub meet_iterations: u32,
}

impl RampPlan {
    pub fn total_length(&self) -> f64 {
        self.head_length + self.body_length + self.tail_length
    }

    pub fn total_time(&self) -> f64 {
        self.head_time + self.body_time + self.tail_time
    }
}

/// Synthesizes head/body/tail lengths and times from
/// `(entry_velocity, cruise_velocity, exit_velocity, length, jerk)`.
pub fn plan_ramps(entry_v: f64, cruise_v: f64, exit_v: f64, length: f64, jerk: f64) -> RampPlan {
    if velocity_eq(entry_v, 0.0) && velocity_eq(cruise_v, 0.0) && velocity_eq(exit_v, 0.0) {
        return RampPlan {
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            head_time: 0.0,
            body_time: 0.0,
            tail_time: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            hint: Hint::ZeroVelocity,
            meet_iterations: 0,
        };
    }

    if velocity_eq(entry_v, cruise_v) && velocity_eq(cruise_v, exit_v) {
        let body_time = if cruise_v > 0.0 { length / cruise_v } else { 0.0 };
        return RampPlan {
            head_length: 0.0,
            body_length: length,
            tail_length: 0.0,
            head_time: 0.0,
            body_time,
            tail_time: 0.0,
            cruise_velocity: cruise_v,
            exit_velocity: exit_v,
            hint: Hint::PerfectCruise,
            meet_iterations: 0,
        };
    }

    let head_len_full = ramp_length(entry_v, cruise_v, jerk);
    let tail_len_full = ramp_length(cruise_v, exit_v, jerk);

    if head_len_full + tail_len_full <= length || velocity_eq(head_len_full + tail_len_full, length) {
        let body_length = (length - head_len_full - tail_len_full).max(0.0);
        let head_time = ramp_time(entry_v, cruise_v, jerk);
        let tail_time = ramp_time(cruise_v, exit_v, jerk);
        let body_time = if cruise_v > 0.0 { body_length / cruise_v } else { 0.0 };

        let hint = classify(entry_v, cruise_v, exit_v, head_len_full, body_length, tail_len_full);

        let mut plan = RampPlan {
            head_length: head_len_full,
            body_length,
            tail_length: tail_len_full,
            head_time,
            body_time,
            tail_time,
            cruise_velocity: cruise_v,
            exit_velocity: exit_v,
            hint,
            meet_iterations: 0,
        };
        absorb_minimum_sections(&mut plan);
        return plan;
    }

    // Requested cruise unreachable within length: find the highest
    // achievable peak v_meet via monotonic search (spec.md §4.4).
    let (v_meet, iterations) = find_meet_velocity(entry_v, exit_v, length, jerk);
    let head_length = ramp_length(entry_v, v_meet, jerk);
    let tail_length = (length - head_length).max(0.0);
    let head_time = ramp_time(entry_v, v_meet, jerk);
    let tail_time = ramp_time(v_meet, exit_v, jerk);

    let mut plan = RampPlan {
        head_length,
        body_length: 0.0,
        tail_length,
        head_time,
        body_time: 0.0,
        tail_time,
        cruise_velocity: v_meet,
        exit_velocity: exit_v,
        hint: Hint::AsymmetricBump,
        meet_iterations: iterations,
    };
    absorb_minimum_sections(&mut plan);
    plan
}

fn classify(entry_v: f64, cruise_v: f64, exit_v: f64, head: f64, body: f64, tail: f64) -> Hint {
    let has_head = head > 0.0 && !velocity_eq(entry_v, cruise_v);
    let has_tail = tail > 0.0 && !velocity_eq(cruise_v, exit_v);
    let has_body = body > 0.0;

    match (has_head, has_body, has_tail) {
        (false, true, false) => Hint::PerfectCruise,
        (true, false, false) => Hint::PerfectAccel,
        (false, false, true) => Hint::PerfectDecel,
        (true, true, false) => Hint::MixedAccel,
        (false, true, true) => Hint::MixedDecel,
        (true, false, true) => {
            if velocity_eq(entry_v, 0.0) && velocity_eq(exit_v, 0.0) {
                Hint::ZeroBump
            } else if velocity_eq(entry_v, exit_v) {
                Hint::SymmetricBump
            } else {
                Hint::AsymmetricBump
            }
        }
        (true, true, true) => Hint::AsymmetricBump,
        (false, false, false) => Hint::ZeroVelocity,
    }
}

/// Bisection search for the highest peak velocity reachable given `length`,
/// solving `ramp_length(entry, v, j) + ramp_length(v, exit, j) = length`
/// (spec.md §4.4).
fn find_meet_velocity(entry_v: f64, exit_v: f64, length: f64, jerk: f64) -> (f64, u32) {
    let mut lo = entry_v.min(exit_v);
    let mut hi = entry_v.max(exit_v).max(lo + 1.0);
    // Expand hi until it overshoots the available length or we give up.
    for _ in 0..MAX_MEET_ITERATIONS {
        let total = ramp_length(entry_v, hi, jerk) + ramp_length(hi, exit_v, jerk);
        if total >= length {
            break;
        }
        hi *= 2.0;
    }

    let mut iterations = 0;
    let mut mid = (lo + hi) / 2.0;
    while iterations < MAX_MEET_ITERATIONS {
        mid = (lo + hi) / 2.0;
        let total = ramp_length(entry_v, mid, jerk) + ramp_length(mid, exit_v, jerk);
        iterations += 1;
        if (total - length).abs() < MEET_TOLERANCE * length.max(1.0) {
            break;
        }
        if total > length {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (mid.max(0.0), iterations)
}

/// Absorbs any section shorter than `MIN_SEGMENT_TIME` into an adjacent
/// section, and flags whole-block merging when the total is below
/// `MIN_BLOCK_TIME` (spec.md §4.4 "Minimum-segment policy").
fn absorb_minimum_sections(plan: &mut RampPlan) {
    if plan.head_time > 0.0 && plan.head_time < MIN_SEGMENT_TIME {
        plan.body_time += plan.head_time;
        plan.body_length += plan.head_length;
        plan.head_time = 0.0;
        plan.head_length = 0.0;
    }
    if plan.tail_time > 0.0 && plan.tail_time < MIN_SEGMENT_TIME {
        plan.body_time += plan.tail_time;
        plan.body_length += plan.tail_length;
        plan.tail_time = 0.0;
        plan.tail_length = 0.0;
    }
    if plan.body_time > 0.0 && plan.body_time < MIN_SEGMENT_TIME && plan.head_time == 0.0 && plan.tail_time == 0.0 {
        // Entire block collapses to a single segment; caller executes it as
        // one segment rather than three (spec.md §8 "boundary behaviors").
        plan.body_time = plan.body_time.max(MIN_SEGMENT_TIME);
    }
    let _ = MIN_BLOCK_TIME; // merge-with-neighbor decision is the queue's, not zoid's.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_rapid_is_accel_body_decel() {
        // spec.md §8 scenario 1.
        let plan = plan_ramps(0.0, 18000.0, 0.0, 100.0, 10_000.0);
        assert!(plan.head_length > 0.0);
        assert!(plan.tail_length > 0.0);
        assert!((plan.total_length() - 100.0).abs() < 1e-6 * 100.0);
    }

    #[test]
    fn perfect_cruise_is_body_only() {
        let plan = plan_ramps(3000.0, 3000.0, 3000.0, 50.0, 1_000_000.0);
        assert_eq!(plan.hint, Hint::PerfectCruise);
        assert_eq!(plan.head_length, 0.0);
        assert_eq!(plan.tail_length, 0.0);
        assert!((plan.body_length - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_velocity_block_is_all_zero() {
        let plan = plan_ramps(0.0, 0.0, 0.0, 0.0, 1_000_000.0);
        assert_eq!(plan.hint, Hint::ZeroVelocity);
        assert_eq!(plan.total_length(), 0.0);
    }

    #[test]
    fn short_length_forces_asymmetric_bump() {
        let plan = plan_ramps(0.0, 10000.0, 0.0, 0.5, 1_000_000.0);
        assert_eq!(plan.hint, Hint::AsymmetricBump);
        assert!(plan.cruise_velocity < 10000.0);
        assert!((plan.total_length() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn quintic_is_jerk_continuous_at_endpoints() {
        // Derivative of acceleration (the jerk term) should vanish at t=0,1.
        let eps = 1e-6;
        let accel_near_0 = (quintic_velocity(0.0, 100.0, eps) - quintic_velocity(0.0, 100.0, 0.0)) / eps;
        let accel_near_0b = (quintic_velocity(0.0, 100.0, 2.0 * eps) - quintic_velocity(0.0, 100.0, eps)) / eps;
        assert!((accel_near_0b - accel_near_0).abs() < 1e-2);
    }
}
