//! Canonical machining model, spec.md §4.1, and machine-state orchestration,
//! spec.md §4.7.
//!
//! Enum values/ordering follow `original_source/g2core/{gcode.h,
//! canonical_machine.h}` exactly; the holder is a plain struct rather than a
//! global singleton, per spec.md §9's "explicit Scheduler" redesign note —
//! a `Scheduler` owns one `CanonicalMachine` per planner (primary/secondary).

pub mod gcode_state;
pub mod offsets;

use crate::config::AxisConfig;
use crate::constants::AXES;
use crate::error::{CoreError, CoreResult, StatusCode};
use crate::planner::block::{Block, BlockType, CommandPayload};
use crate::planner::queue::PlannerQueue;

use gcode_state::{DistanceMode, FeedRateMode, GmState, GmxState, MotionMode};
pub use gcode_state::{OverrideRamp, OverrideState};
use offsets::{CoordinateOffsets, ToolTable, COORD_SYSTEM_ABSOLUTE};

/// `cmMachineState` (`original_source/g2core/canonical_machine.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineState {
    #[default]
    Initializing,
    Ready,
    Alarm,
    ProgramStop,
    ProgramEnd,
    Cycle,
    Interlock,
    Shutdown,
    Panic,
}

/// `cmMotionState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Stop,
    Run,
    Hold,
}

/// `cmCycleType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleType {
    #[default]
    None,
    Machining,
    Homing,
    Probe,
    Jog,
}

/// `cmCombinedState` — machine-state + motion-state + cycle-type merged for
/// reporting (`SPEC_FULL.md` §1b).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedState {
    Initializing,
    Ready,
    Alarm,
    ProgramStop,
    ProgramEnd,
    Run,
    Hold,
    Probe,
    Cycle,
    Homing,
    Jog,
    Interlock,
    Shutdown,
    Panic,
}

/// Owns interpreted Gcode state and dispatches to a planner queue. A
/// `Scheduler` holds one of these for the primary program and a second,
/// lighter one for feedhold hold-entry actions.
pub struct CanonicalMachine {
    pub gm: GmState,
    pub gmx: GmxState,
    pub offsets: CoordinateOffsets,
    pub tool_table: ToolTable,
    pub axes: Vec<AxisConfig>,
    pub machine_state: MachineState,
    pub motion_state: MotionState,
    pub cycle_type: CycleType,
    pub soft_limits_enabled: bool,
    next_buffer_number: usize,
}

impl CanonicalMachine {
    pub fn new(axes: Vec<AxisConfig>, soft_limits_enabled: bool) -> Self {
        Self {
            gm: GmState::default(),
            gmx: GmxState::default(),
            offsets: CoordinateOffsets::default(),
            tool_table: ToolTable::default(),
            axes,
            machine_state: MachineState::Initializing,
            motion_state: MotionState::Stop,
            cycle_type: CycleType::None,
            soft_limits_enabled,
            next_buffer_number: 0,
        }
    }

    pub fn combined_state(&self) -> CombinedState {
        use MachineState::*;
        match self.machine_state {
            Initializing => CombinedState::Initializing,
            Ready => CombinedState::Ready,
            Alarm => CombinedState::Alarm,
            ProgramStop => CombinedState::ProgramStop,
            ProgramEnd => CombinedState::ProgramEnd,
            Interlock => CombinedState::Interlock,
            Shutdown => CombinedState::Shutdown,
            Panic => CombinedState::Panic,
            Cycle => match self.motion_state {
                MotionState::Hold => CombinedState::Hold,
                _ => match self.cycle_type {
                    CycleType::Homing => CombinedState::Homing,
                    CycleType::Probe => CombinedState::Probe,
                    CycleType::Jog => CombinedState::Jog,
                    _ => match self.motion_state {
                        MotionState::Run => CombinedState::Run,
                        _ => CombinedState::Cycle,
                    },
                },
            },
        }
    }

    fn check_runnable(&self) -> CoreResult<()> {
        match self.machine_state {
            MachineState::Alarm => Err(CoreError::Rejected(StatusCode::MachineAlarmed)),
            MachineState::Shutdown => Err(CoreError::Rejected(StatusCode::MachineShutdown)),
            MachineState::Panic => Err(CoreError::Rejected(StatusCode::MachinePanicked)),
            _ => Ok(()),
        }
    }

    /// Target composition, spec.md §4.1: `gm.target ± g92_offset ±
    /// coord_offset[active] ± tool_offset`, gated by absolute_override,
    /// distance mode, and G92 enable. In incremental distance mode (G91)
    /// `gm_target` is a delta from the current machine position rather
    /// than a work-coordinate value, so offsets/overrides already baked
    /// into `machine_position` are not re-applied.
    pub fn compose_target(&self, gm_target: &[f64; AXES]) -> [f64; AXES] {
        let mut target = [0.0; AXES];
        if self.gm.distance_mode == DistanceMode::Incremental {
            for i in 0..AXES {
                target[i] = self.gmx.machine_position[i] + gm_target[i];
            }
            return target;
        }
        let coord = self.offsets.get(self.gm.coord_system).copied().unwrap_or([0.0; AXES]);
        for i in 0..AXES {
            let mut t = gm_target[i];
            if !self.gm.absolute_override {
                t += coord[i];
                if self.gmx.g92_enabled {
                    t += self.gmx.g92_offset[i];
                }
            }
            t += self.tool_table.current_tool_offset[i];
            target[i] = t;
        }
        target
    }

    fn check_soft_limits(&self, target: &[f64; AXES], flags: &[bool; AXES]) -> CoreResult<()> {
        if !self.soft_limits_enabled {
            return Ok(());
        }
        for i in 0..AXES {
            if !flags[i] {
                continue;
            }
            let axis = &self.axes[i];
            if target[i] < axis.travel_min || target[i] > axis.travel_max {
                return Err(CoreError::SoftLimitExceeded(StatusCode::SoftLimitExceeded, i));
            }
        }
        Ok(())
    }

    fn next_buffer_number(&mut self) -> usize {
        let n = self.next_buffer_number;
        self.next_buffer_number += 1;
        n
    }

    fn fill_move(&mut self, block: &mut Block, target: &[f64; AXES], flags: &[bool; AXES], jerk_override: Option<f64>) {
        block.buffer_number = self.next_buffer_number();
        let mut delta = [0.0; AXES];
        let mut length_sq = 0.0;
        for i in 0..AXES {
            if !flags[i] {
                continue;
            }
            delta[i] = target[i] - self.gmx.machine_position[i];
            length_sq += delta[i] * delta[i];
            block.axis_active[i] = delta[i].abs() > f64::EPSILON;
        }
        let length = length_sq.sqrt();
        block.length = length;
        if length > 0.0 {
            for i in 0..AXES {
                block.unit_vector[i] = delta[i] / length;
            }
        }

        let mut absolute_vmax = f64::INFINITY;
        let mut jerk_max = f64::INFINITY;
        for i in 0..AXES {
            if !block.axis_active[i] {
                continue;
            }
            let axis = &self.axes[i];
            let u = block.unit_vector[i].abs();
            if u > f64::EPSILON {
                absolute_vmax = absolute_vmax.min(axis.velocity_max / u);
                jerk_max = jerk_max.min(axis.jerk_max_real() / u);
            }
        }
        if !absolute_vmax.is_finite() {
            absolute_vmax = 0.0;
        }
        if !jerk_max.is_finite() {
            jerk_max = 0.0;
        }
        block.absolute_vmax = absolute_vmax;
        block.set_jerk(jerk_override.unwrap_or(jerk_max));

        let requested = self.gm.feed_rate.min(absolute_vmax).max(crate::constants::MIN_SEGMENT_VELOCITY);
        block.cruise_set = requested;
        let override_factor = match self.gm.motion_mode {
            MotionMode::Rapid => self.gmx.traverse_override.current_factor(),
            _ => self.gmx.feed_override.current_factor(),
        };
        block.cruise_vmax = (requested * override_factor).min(absolute_vmax);
        block.override_factor = override_factor;
        block.gm = self.gm.clone();
    }

    /// Rapid traverse (G0): spec.md §6 `straight_traverse`.
    pub fn straight_traverse<const N: usize>(
        &mut self,
        queue: &mut PlannerQueue<N>,
        target: [f64; AXES],
        flags: [bool; AXES],
    ) -> CoreResult<()> {
        self.check_runnable()?;
        let composed = self.compose_target(&target);
        self.check_soft_limits(&composed, &flags)?;

        self.gm.motion_mode = MotionMode::Rapid;
        self.gm.target = composed;

        let block = queue.get_write_buffer()?;
        self.fill_move(block, &composed, &flags, None);
        self.gmx.machine_position = composed;
        queue.commit_write_buffer(BlockType::Aline);
        self.on_motion_committed();
        Ok(())
    }

    /// Feed move (G1): spec.md §6 `straight_feed`.
    pub fn straight_feed<const N: usize>(
        &mut self,
        queue: &mut PlannerQueue<N>,
        target: [f64; AXES],
        flags: [bool; AXES],
    ) -> CoreResult<()> {
        self.check_runnable()?;
        if self.gm.feed_rate_mode == FeedRateMode::InverseTime && self.gm.feed_rate <= 0.0 {
            return Err(CoreError::FeedrateNotSpecified(StatusCode::FeedrateNotSpecified));
        }
        let composed = self.compose_target(&target);
        self.check_soft_limits(&composed, &flags)?;

        self.gm.motion_mode = MotionMode::Feed;
        self.gm.target = composed;

        let block = queue.get_write_buffer()?;
        self.fill_move(block, &composed, &flags, None);
        self.gmx.machine_position = composed;
        queue.commit_write_buffer(BlockType::Aline);
        self.on_motion_committed();
        Ok(())
    }

    pub fn dwell<const N: usize>(&mut self, queue: &mut PlannerQueue<N>, seconds: f64) -> CoreResult<()> {
        self.check_runnable()?;
        let block = queue.get_write_buffer()?;
        block.buffer_number = self.next_buffer_number();
        block.payload = CommandPayload::Dwell { seconds };
        block.gm = self.gm.clone();
        queue.commit_write_buffer(BlockType::Dwell);
        self.on_motion_committed();
        Ok(())
    }

    pub fn queue_command<const N: usize>(
        &mut self,
        queue: &mut PlannerQueue<N>,
        float_args: Vec<f64>,
        bool_flags: Vec<bool>,
    ) -> CoreResult<()> {
        self.check_runnable()?;
        let block = queue.get_write_buffer()?;
        block.buffer_number = self.next_buffer_number();
        block.payload = CommandPayload::UserCallback { float_args, bool_flags };
        block.gm = self.gm.clone();
        queue.commit_write_buffer(BlockType::Command);
        self.on_motion_committed();
        Ok(())
    }

    /// G10: write the persistent offset for a named coordinate system.
    pub fn set_g10_data(&mut self, coord_index: usize, axis_values: [f64; AXES]) -> CoreResult<()> {
        self.check_runnable()?;
        self.offsets.set_g10(coord_index, &axis_values).map_err(|idx| {
            CoreError::InvalidCoordSystem(StatusCode::InvalidCoordSystem, idx as i32)
        })
    }

    pub fn set_coord_system(&mut self, index: usize) -> CoreResult<()> {
        if index >= offsets::COORD_SYSTEM_COUNT {
            return Err(CoreError::InvalidCoordSystem(StatusCode::InvalidCoordSystem, index as i32));
        }
        self.gm.coord_system = index;
        Ok(())
    }

    pub fn set_absolute_override(&mut self, enabled: bool) {
        self.gm.absolute_override = enabled;
        if enabled {
            self.gm.coord_system = COORD_SYSTEM_ABSOLUTE;
        }
    }

    pub fn set_distance_mode(&mut self, mode: DistanceMode) {
        self.gm.distance_mode = mode;
    }

    pub fn set_feed_rate(&mut self, feed_rate: f64, mode: FeedRateMode) {
        self.gm.feed_rate_mode = mode;
        self.gm.feed_rate = feed_rate;
    }

    /// M50: request a new feed-rate override factor, clamped to
    /// `[FEED_OVERRIDE_MIN, FEED_OVERRIDE_MAX]`. Ramps in over
    /// `FEED_OVERRIDE_RAMP_TIME` once the scheduler syncs the request at
    /// the next safe point.
    pub fn request_feed_override(&mut self, factor: f64) {
        self.gmx.feed_override.request(factor, crate::constants::FEED_OVERRIDE_MIN, crate::constants::FEED_OVERRIDE_MAX);
    }

    /// M50.1: request a new traverse (rapid) override factor.
    pub fn request_traverse_override(&mut self, factor: f64) {
        self.gmx.traverse_override.request(
            factor,
            crate::constants::TRAVERSE_OVERRIDE_MIN,
            crate::constants::TRAVERSE_OVERRIDE_MAX,
        );
    }

    /// Resets both override ramps to 1.0 with no pending request (spec.md
    /// §8: "Override ramp across a queue flush: reset on flush").
    pub fn reset_overrides(&mut self) {
        self.gmx.feed_override.reset(crate::constants::FEED_OVERRIDE_DEFAULT);
        self.gmx.traverse_override.reset(crate::constants::TRAVERSE_OVERRIDE_DEFAULT);
    }

    /// G92: set a transient origin offset so the current position reads as
    /// `new_position` without moving the machine.
    pub fn set_g92_offset(&mut self, new_position: [f64; AXES]) {
        for i in 0..AXES {
            self.gmx.g92_offset[i] = self.gmx.machine_position[i] - new_position[i];
        }
        self.gmx.g92_enabled = true;
    }

    /// G92.1: cancel G92 offsets (zero them).
    pub fn cancel_g92_offset(&mut self) {
        self.gmx.g92_offset = [0.0; AXES];
        self.gmx.g92_enabled = false;
    }

    /// G92.2: suspend G92 offsets without clearing their values.
    pub fn suspend_g92_offset(&mut self) {
        self.gmx.g92_enabled = false;
    }

    /// G92.3: resume previously suspended G92 offsets.
    pub fn resume_g92_offset(&mut self) {
        self.gmx.g92_enabled = true;
    }

    fn on_motion_committed(&mut self) {
        if self.machine_state == MachineState::Ready || self.machine_state == MachineState::ProgramStop {
            self.machine_state = MachineState::Cycle;
            self.motion_state = MotionState::Run;
            self.cycle_type = CycleType::Machining;
        }
    }

    /// Queue drains with runtime idle: CYCLE -> PROGRAM_STOP.
    pub fn on_queue_drained(&mut self) {
        if self.machine_state == MachineState::Cycle {
            self.machine_state = MachineState::ProgramStop;
            self.motion_state = MotionState::Stop;
            self.cycle_type = CycleType::None;
        }
    }

    pub fn program_end(&mut self) {
        self.machine_state = MachineState::ProgramEnd;
        self.motion_state = MotionState::Stop;
        self.cycle_type = CycleType::None;
    }

    pub fn cycle_start(&mut self) {
        if matches!(self.machine_state, MachineState::ProgramStop | MachineState::ProgramEnd | MachineState::Ready) {
            self.machine_state = MachineState::Ready;
        }
    }

    pub fn alarm(&mut self) {
        self.machine_state = MachineState::Alarm;
        self.motion_state = MotionState::Stop;
    }

    pub fn shutdown(&mut self) {
        self.machine_state = MachineState::Shutdown;
        self.motion_state = MotionState::Stop;
        self.cycle_type = CycleType::None;
    }

    pub fn panic(&mut self) {
        self.machine_state = MachineState::Panic;
        self.motion_state = MotionState::Stop;
    }

    /// Clears ALARM on explicit clear command (or M30/M2 while draining).
    pub fn clear(&mut self) {
        if self.machine_state == MachineState::Alarm {
            self.machine_state = MachineState::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PrimaryQueue;

    fn default_axes() -> Vec<AxisConfig> {
        (0..AXES).map(|_| AxisConfig::default()).collect()
    }

    #[test]
    fn straight_traverse_rejects_outside_soft_limits() {
        let mut cm = CanonicalMachine::new(default_axes(), true);
        let mut queue = PrimaryQueue::new();
        let mut target = [0.0; AXES];
        target[0] = 99999.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        let err = cm.straight_traverse(&mut queue, target, flags).unwrap_err();
        assert!(matches!(err, CoreError::SoftLimitExceeded(_, 0)));
    }

    #[test]
    fn straight_feed_without_inverse_time_f_is_rejected() {
        let mut cm = CanonicalMachine::new(default_axes(), true);
        let mut queue = PrimaryQueue::new();
        cm.set_feed_rate(0.0, FeedRateMode::InverseTime);
        let mut target = [0.0; AXES];
        target[0] = 10.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        let err = cm.straight_feed(&mut queue, target, flags).unwrap_err();
        assert!(matches!(err, CoreError::FeedrateNotSpecified(_)));
    }

    #[test]
    fn committing_a_move_to_an_empty_queue_enters_cycle() {
        let mut cm = CanonicalMachine::new(default_axes(), true);
        let mut queue = PrimaryQueue::new();
        cm.machine_state = MachineState::Ready;
        cm.set_feed_rate(3000.0, FeedRateMode::UnitsPerMinute);
        let mut target = [0.0; AXES];
        target[0] = 10.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        cm.straight_feed(&mut queue, target, flags).unwrap();
        assert_eq!(cm.machine_state, MachineState::Cycle);
    }

    #[test]
    fn coordinate_offset_round_trip_matches_spec_law() {
        // spec.md §8: offset O, move to absolute target T in that system,
        // switch to G53: reported absolute = T + O.
        let mut cm = CanonicalMachine::new(default_axes(), false);
        let mut queue = PrimaryQueue::new();
        cm.set_feed_rate(3000.0, FeedRateMode::UnitsPerMinute);
        let mut offset = [0.0; AXES];
        offset[0] = 5.0;
        cm.set_g10_data(1, offset).unwrap();
        cm.set_coord_system(1).unwrap();

        let mut target = [0.0; AXES];
        target[0] = 10.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        cm.straight_feed(&mut queue, target, flags).unwrap();

        assert!((cm.gmx.machine_position[0] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn incremental_distance_mode_composes_target_as_a_delta() {
        let mut cm = CanonicalMachine::new(default_axes(), false);
        let mut queue = PrimaryQueue::new();
        cm.set_feed_rate(3000.0, FeedRateMode::UnitsPerMinute);
        cm.set_distance_mode(DistanceMode::Incremental);

        let mut target = [0.0; AXES];
        target[0] = 5.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        cm.straight_feed(&mut queue, target, flags).unwrap();
        cm.straight_feed(&mut queue, target, flags).unwrap();

        assert!((cm.gmx.machine_position[0] - 10.0).abs() < 1e-9);
        assert!((cm.gm.target[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn feed_override_ramps_to_the_requested_factor_over_time() {
        let mut cm = CanonicalMachine::new(default_axes(), false);
        cm.request_feed_override(0.5);
        assert_eq!(cm.gmx.feed_override.current_factor(), 1.0);

        cm.gmx.feed_override.sync();
        cm.gmx.feed_override.tick(crate::constants::FEED_OVERRIDE_RAMP_TIME / 2.0);
        let mid = cm.gmx.feed_override.current_factor();
        assert!(mid < 1.0 && mid > 0.5, "expected a partial ramp, got {mid}");

        cm.gmx.feed_override.tick(crate::constants::FEED_OVERRIDE_RAMP_TIME);
        assert!((cm.gmx.feed_override.current_factor() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn alarm_rejects_subsequent_moves() {
        let mut cm = CanonicalMachine::new(default_axes(), true);
        let mut queue = PrimaryQueue::new();
        cm.alarm();
        let mut target = [0.0; AXES];
        target[0] = 10.0;
        let mut flags = [false; AXES];
        flags[0] = true;
        let err = cm.straight_feed(&mut queue, target, flags).unwrap_err();
        assert!(matches!(err, CoreError::Rejected(StatusCode::MachineAlarmed)));
    }
}
