//! Planner block: the central data structure, spec.md §3 "Planner block".
//!
//! Grounded on `original_source/g2core/planner.h`'s `mpBuffer`, translated
//! from `pv`/`nx` pointers to index arithmetic per spec.md §9 (the queue
//! owns ordering; a block never points at its neighbors).

use crate::canonical::gcode_state::GmState;
use crate::constants::AXES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    #[default]
    Empty,
    Initializing,
    NotPlanned,
    BackPlanned,
    FullyPlanned,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Null,
    Aline,
    Command,
    Dwell,
    JsonWait,
    Tool,
    SpindleSpeed,
    Stop,
    End,
}

impl Default for BlockType {
    fn default() -> Self {
        BlockType::Null
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockRunState {
    #[default]
    Inactive,
    Initial,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hint {
    #[default]
    None,
    Command,
    PerfectAccel,
    PerfectDecel,
    PerfectCruise,
    MixedAccel,
    MixedDecel,
    ZeroVelocity,
    ZeroBump,
    SymmetricBump,
    AsymmetricBump,
}

/// Data carried by a non-`Aline` block, a tagged-variant stand-in for the
/// source's function-pointer dispatch (spec.md §9).
#[derive(Debug, Clone, Default)]
pub enum CommandPayload {
    #[default]
    None,
    Dwell { seconds: f64 },
    JsonWait { text: String },
    Tool { number: u32 },
    SpindleSpeed { rpm: f64 },
    ProgramStop,
    ProgramEnd,
    UserCallback { float_args: Vec<f64>, bool_flags: Vec<bool> },
}

/// One queued motion or command, spec.md §3 "Planner block".
#[derive(Debug, Clone)]
pub struct Block {
    pub buffer_number: usize,
    pub buffer_state: BufferState,
    pub block_type: BlockType,
    pub run_state: BlockRunState,
    pub hint: Hint,

    pub unit_vector: [f64; AXES],
    pub axis_active: [bool; AXES],
    pub length: f64,

    pub cruise_set: f64,
    pub cruise_vmax: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,
    pub exit_vmax: f64,
    pub absolute_vmax: f64,
    pub junction_vmax: f64,

    pub jerk: f64,
    pub jerk_sq: f64,
    pub recip_jerk: f64,
    pub sqrt_jerk: f64,
    /// q / (2*sqrt(jerk)), q = sqrt(10)/cbrt(3); used by the forward planner
    /// length computations (spec.md §3 "Dynamics").
    pub q_over_2_sqrt_jerk: f64,

    pub block_time: f64,
    pub override_factor: f64,

    pub plannable: bool,

    pub gm: GmState,

    pub payload: CommandPayload,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            buffer_number: 0,
            buffer_state: BufferState::Empty,
            block_type: BlockType::Null,
            run_state: BlockRunState::Inactive,
            hint: Hint::None,
            unit_vector: [0.0; AXES],
            axis_active: [false; AXES],
            length: 0.0,
            cruise_set: 0.0,
            cruise_vmax: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            exit_vmax: 0.0,
            absolute_vmax: 0.0,
            junction_vmax: 0.0,
            jerk: 0.0,
            jerk_sq: 0.0,
            recip_jerk: 0.0,
            sqrt_jerk: 0.0,
            q_over_2_sqrt_jerk: 0.0,
            block_time: 0.0,
            override_factor: crate::constants::FEED_OVERRIDE_DEFAULT,
            plannable: true,
            gm: GmState::default(),
            payload: CommandPayload::None,
        }
    }
}

/// q = sqrt(10) / cbrt(3), the constant used by the zoid length formulas.
pub const Q_CONSTANT: f64 = 1.5518456369749506;

impl Block {
    pub fn set_jerk(&mut self, jerk: f64) {
        self.jerk = jerk;
        self.jerk_sq = jerk * jerk;
        self.recip_jerk = if jerk > 0.0 { 1.0 / jerk } else { 0.0 };
        self.sqrt_jerk = jerk.max(0.0).sqrt();
        self.q_over_2_sqrt_jerk = if self.sqrt_jerk > 0.0 {
            Q_CONSTANT / (2.0 * self.sqrt_jerk)
        } else {
            0.0
        };
    }

    pub fn reset(&mut self, buffer_number: usize) {
        *self = Block { buffer_number, ..Block::default() };
    }

    pub fn is_move(&self) -> bool {
        matches!(self.block_type, BlockType::Aline)
    }
}
