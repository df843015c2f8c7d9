//! Shared numeric constants for the motion core.
//!
//! Mirrors the `#define` block in `original_source/g2core/planner.h`.
//! Times are expressed in minutes internally (matching the source) wherever
//! they interact with feed rates expressed in mm/min; millisecond constants
//! are kept alongside for readability at call sites.

/// Number of machine axes: X Y Z A B C.
pub const AXES: usize = 6;

/// Number of motors. 1:1 with axes in the default mapping.
pub const MOTORS: usize = 6;

/// Primary planner queue depth.
pub const PLANNER_QUEUE_SIZE: usize = 48;

/// Secondary (feedhold-actions) planner queue depth.
pub const SECONDARY_QUEUE_SIZE: usize = 12;

/// Buffers to keep free before the parser is backpressured.
pub const PLANNER_BUFFER_HEADROOM: usize = 4;

/// Jerk values are persisted divided by this; multiply back out before use.
pub const JERK_MULTIPLIER: f64 = 1_000_000.0;

pub const JUNCTION_INTEGRATION_MIN: f64 = 0.05;
pub const JUNCTION_INTEGRATION_MAX: f64 = 5.00;
pub const JUNCTION_INTEGRATION_DEFAULT: f64 = 1.2;

/// Minimum segment duration, milliseconds.
pub const MIN_SEGMENT_MS: f64 = 0.75;
/// Nominal segment duration, milliseconds (>= 2x minimum).
pub const NOM_SEGMENT_MS: f64 = MIN_SEGMENT_MS * 2.0;
/// Minimum whole-block duration, milliseconds.
pub const MIN_BLOCK_MS: f64 = MIN_SEGMENT_MS * 2.0;

pub const BLOCK_TIMEOUT_MS: f64 = 30.0;
pub const PHAT_CITY_MS: f64 = 100.0;

pub const NOM_SEGMENT_TIME: f64 = NOM_SEGMENT_MS / 60_000.0;
pub const MIN_SEGMENT_TIME: f64 = MIN_SEGMENT_MS / 60_000.0;
pub const MIN_BLOCK_TIME: f64 = MIN_BLOCK_MS / 60_000.0;
pub const PHAT_CITY_TIME: f64 = PHAT_CITY_MS / 60_000.0;

pub const FEED_OVERRIDE_MIN: f64 = 0.05;
pub const FEED_OVERRIDE_MAX: f64 = 2.00;
pub const FEED_OVERRIDE_RAMP_TIME: f64 = 0.500 / 60.0;
pub const FEED_OVERRIDE_DEFAULT: f64 = 1.00;

pub const TRAVERSE_OVERRIDE_MIN: f64 = 0.05;
pub const TRAVERSE_OVERRIDE_MAX: f64 = 1.00;
pub const TRAVERSE_OVERRIDE_DEFAULT: f64 = 1.00;

/// Minimum cruise velocity any block is allowed to plan to; requests below
/// this round up (spec.md §8 boundary behavior).
pub const MIN_SEGMENT_VELOCITY: f64 = 0.001;

pub const JERK_INPUT_MIN: f64 = 0.01 * JERK_MULTIPLIER;
pub const JERK_INPUT_MAX: f64 = JERK_MULTIPLIER * JERK_MULTIPLIER;

/// Tight numeric tolerance used for the head+body+tail == length invariant.
pub const LENGTH_TOLERANCE_FRACTION: f64 = 1e-6;

/// Tolerant velocity-equality comparisons, straight out of planner.h.
pub fn velocity_eq(v0: f64, v1: f64) -> bool {
    (v0 - v1).abs() < 0.0001
}

pub fn velocity_lt(v0: f64, v1: f64) -> bool {
    (v1 - v0) > 0.0001
}

const VTHR2: f64 = 300.0;
const VEQ2_HI: f64 = 10.0;
const VEQ2_LO: f64 = 1.0;

/// Looser equality used where small scale-dependent velocity jitter is
/// expected (hint assignment, replanning termination).
pub fn velocity_roughly_eq(v0: f64, v1: f64) -> bool {
    if v0 > VTHR2 {
        (v0 - v1).abs() < VEQ2_HI
    } else {
        (v0 - v1).abs() < VEQ2_LO
    }
}
