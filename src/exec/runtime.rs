//! Runtime state (`mr`), spec.md §3 "Runtime state (mr)".
//!
//! Grounded on teacher's `motion/stepper.rs` position-to-steps conversion,
//! generalized to `AXES`/`MOTORS`, plus
//! `original_source/g2core/planner.h` for the `mr` field names.

use crate::canonical::gcode_state::GmState;
use crate::constants::{AXES, MOTORS};
use crate::planner::zoid::RampPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Head,
    Body,
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionSubState {
    #[default]
    NewSection,
    InSection,
    SectionDone,
}

/// Per-block runtime data, held in the running ('r') / pre-planned ('p')
/// pair described by spec.md §9's runtime/planner split.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockRuntime {
    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,
    pub head_time: f64,
    pub body_time: f64,
    pub tail_time: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,
    pub entry_velocity: f64,
    pub valid: bool,
}

impl BlockRuntime {
    pub fn from_plan(plan: &RampPlan, entry_velocity: f64) -> Self {
        Self {
            head_length: plan.head_length,
            body_length: plan.body_length,
            tail_length: plan.tail_length,
            head_time: plan.head_time,
            body_time: plan.body_time,
            tail_time: plan.tail_time,
            cruise_velocity: plan.cruise_velocity,
            exit_velocity: plan.exit_velocity,
            entry_velocity,
            valid: true,
        }
    }
}

/// Five precomputed forward-difference coefficients, the only affordable
/// way to evaluate the quintic at segment rate (spec.md §9).
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardDifference {
    pub coeffs: [f64; 5],
}

impl ForwardDifference {
    /// Initializes the coefficients to evolve `quintic_velocity(v0, v1, t)`
    /// over `segments` equal steps of normalized time.
    pub fn init(v0: f64, v1: f64, segments: usize) -> Self {
        if segments == 0 {
            return Self::default();
        }
        let h = 1.0 / segments as f64;
        // Finite-difference table of t^3*(10-15t+6t^2) sampled at
        // t=0,h,2h,3h,4h scaled by (v1-v0), collapsed to additive deltas.
        let f = |t: f64| v0 + (v1 - v0) * t.powi(3) * (10.0 - 15.0 * t + 6.0 * t * t);
        let samples: [f64; 5] = [f(0.0), f(h), f(2.0 * h), f(3.0 * h), f(4.0 * h)];
        let mut table = samples;
        let mut coeffs = [0.0; 5];
        coeffs[0] = table[0];
        for level in 1..5 {
            for i in 0..(5 - level) {
                table[i] = table[i + 1] - table[i];
            }
            coeffs[level] = table[0];
        }
        Self { coeffs }
    }

    /// Advances one segment and returns the new velocity.
    pub fn step(&mut self) -> f64 {
        for i in 0..4 {
            self.coeffs[i] += self.coeffs[i + 1];
        }
        self.coeffs[0]
    }

    pub fn current(&self) -> f64 {
        self.coeffs[0]
    }
}

/// The executor's private view of motion in progress, distinct from the
/// planner's mutable view (spec.md §9 runtime/planner split). Once a block
/// transitions to RUNNING, only the executor mutates this.
pub struct RuntimeState {
    pub section: Section,
    pub section_sub_state: SectionSubState,

    pub unit_vector: [f64; AXES],
    pub final_target: [f64; AXES],
    pub position: [f64; AXES],
    pub section_waypoint: [f64; AXES],

    pub target_steps: [i64; MOTORS],
    pub position_steps: [i64; MOTORS],
    pub commanded_steps: [i64; MOTORS],
    pub encoder_steps: [i64; MOTORS],
    pub following_error: [i64; MOTORS],

    pub running: BlockRuntime,
    pub planning: BlockRuntime,

    pub segment_count: u32,
    pub segments_in_section: u32,
    pub segment_velocity: f64,
    pub segment_time: f64,

    pub forward_diff: ForwardDifference,

    pub gm_snapshot: Option<GmState>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            section: Section::default(),
            section_sub_state: SectionSubState::default(),
            unit_vector: [0.0; AXES],
            final_target: [0.0; AXES],
            position: [0.0; AXES],
            section_waypoint: [0.0; AXES],
            target_steps: [0; MOTORS],
            position_steps: [0; MOTORS],
            commanded_steps: [0; MOTORS],
            encoder_steps: [0; MOTORS],
            following_error: [0; MOTORS],
            running: BlockRuntime::default(),
            planning: BlockRuntime::default(),
            segment_count: 0,
            segments_in_section: 0,
            segment_velocity: 0.0,
            segment_time: crate::constants::NOM_SEGMENT_TIME,
            forward_diff: ForwardDifference::default(),
            gm_snapshot: None,
        }
    }
}

impl RuntimeState {
    /// A runtime block record is reused cyclically: when 'r' completes,
    /// 'p' becomes 'r' (spec.md §3 lifecycles).
    pub fn rotate_runtime(&mut self) {
        self.running = self.planning;
        self.planning = BlockRuntime::default();
    }

    pub fn update_following_error(&mut self, motor: usize) {
        self.following_error[motor] = self.encoder_steps[motor] - self.commanded_steps[motor];
    }
}
