//! Gcode-level state: the `gm`/`gmx` split from `spec.md` §3.
//!
//! `GmState` is copied into every planner block at commit time; `GmxState`
//! is not copied and lives only on the canonical machine. Enum names and
//! values follow `original_source/g2core/gcode.h`.

use crate::constants::AXES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionMode {
    #[default]
    Rapid,
    Feed,
    ArcCw,
    ArcCcw,
    Probe,
    Cancel,
    CannedCycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedRateMode {
    #[default]
    UnitsPerMinute,
    InverseTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalPlane {
    #[default]
    Xy,
    Xz,
    Yz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitsMode {
    #[default]
    Millimeters,
    Inches,
    Degrees,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathControl {
    #[default]
    ExactStop,
    ExactPath,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    #[default]
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcDistanceMode {
    #[default]
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramFlow {
    #[default]
    Running,
    Stop,
    End,
}

/// `cmOverrideState` (`MFO_OFF/REQUESTED/SYNC`,
/// `original_source/g2core/canonical_machine.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideState {
    #[default]
    Off,
    Requested,
    Sync,
}

/// Feed/traverse override ramp, spec.md §4.3: "When override is active and
/// ramping, the active factor is a smooth ramp over a configured
/// ramp_time." Grounded on `original_source/g2core/planner.h`'s
/// `mfo_factor`/`mfo_active` and `mp_start_feed_override(ramp_time,
/// override)`.
#[derive(Debug, Clone, Copy)]
pub struct OverrideRamp {
    pub state: OverrideState,
    pub enabled: bool,
    start_factor: f64,
    target_factor: f64,
    elapsed: f64,
    ramp_time: f64,
}

impl OverrideRamp {
    pub fn new(default_factor: f64, ramp_time: f64) -> Self {
        Self {
            state: OverrideState::Off,
            enabled: false,
            start_factor: default_factor,
            target_factor: default_factor,
            elapsed: ramp_time,
            ramp_time,
        }
    }

    /// Linear interpolation between `start_factor` and `target_factor` over
    /// `ramp_time` minutes; holds at the target once the ramp completes.
    pub fn current_factor(&self) -> f64 {
        if self.ramp_time <= 0.0 || self.elapsed >= self.ramp_time {
            self.target_factor
        } else {
            let t = self.elapsed / self.ramp_time;
            self.start_factor + (self.target_factor - self.start_factor) * t
        }
    }

    /// `MFO_OFF -> MFO_REQUESTED`: a new factor has been requested and
    /// clamped to `[min, max]`.
    pub fn request(&mut self, factor: f64, min: f64, max: f64) {
        self.target_factor = factor.clamp(min, max);
        self.enabled = true;
        self.state = OverrideState::Requested;
    }

    /// `MFO_REQUESTED -> MFO_SYNC`: latches the ramp's starting factor at
    /// the next safe point and begins the timed ramp.
    pub fn sync(&mut self) {
        if self.state == OverrideState::Requested {
            self.start_factor = self.current_factor();
            self.elapsed = 0.0;
            self.state = OverrideState::Sync;
        }
    }

    /// Advances the ramp by `elapsed_time` minutes. `MFO_SYNC -> MFO_OFF`
    /// once the target factor is reached.
    pub fn tick(&mut self, elapsed_time: f64) {
        if self.state == OverrideState::Sync {
            self.elapsed += elapsed_time;
            if self.elapsed >= self.ramp_time {
                self.elapsed = self.ramp_time;
                self.state = OverrideState::Off;
            }
        }
    }

    /// Resets to `default_factor` with no pending ramp (spec.md §8:
    /// "Override ramp across a queue flush: reset on flush").
    pub fn reset(&mut self, default_factor: f64) {
        self.state = OverrideState::Off;
        self.enabled = false;
        self.start_factor = default_factor;
        self.target_factor = default_factor;
        self.elapsed = self.ramp_time;
    }
}

/// Per-block Gcode state, copied verbatim into every committed block.
#[derive(Debug, Clone)]
pub struct GmState {
    pub line_number: u32,
    pub motion_mode: MotionMode,
    pub target: [f64; AXES],
    /// Kahan-summation compensation term per axis, carried across moves that
    /// accumulate many small incremental steps.
    pub kahan_compensation: [f64; AXES],
    pub feed_rate: f64,
    pub feed_rate_mode: FeedRateMode,
    pub plane: CanonicalPlane,
    pub units_mode: UnitsMode,
    pub path_control: PathControl,
    pub distance_mode: DistanceMode,
    pub arc_distance_mode: ArcDistanceMode,
    pub absolute_override: bool,
    pub coord_system: usize,
    pub tool: u32,
    pub tool_select: u32,
}

impl Default for GmState {
    fn default() -> Self {
        Self {
            line_number: 0,
            motion_mode: MotionMode::default(),
            target: [0.0; AXES],
            kahan_compensation: [0.0; AXES],
            feed_rate: 0.0,
            feed_rate_mode: FeedRateMode::default(),
            plane: CanonicalPlane::default(),
            units_mode: UnitsMode::default(),
            path_control: PathControl::default(),
            distance_mode: DistanceMode::default(),
            arc_distance_mode: ArcDistanceMode::default(),
            absolute_override: false,
            coord_system: 1, // G54
            tool: 1,
            tool_select: 1,
        }
    }
}

/// Extended Gcode state, not copied per block — lives only on the canonical
/// machine that owns it.
#[derive(Debug, Clone)]
pub struct GmxState {
    pub machine_position: [f64; AXES],
    pub g92_offset: [f64; AXES],
    pub g92_enabled: bool,
    pub g28_position: [f64; AXES],
    pub g30_position: [f64; AXES],
    pub m48_enabled: bool,
    pub feed_override: OverrideRamp,
    pub traverse_override: OverrideRamp,
    pub block_delete_enabled: bool,
    pub program_flow: ProgramFlow,
}

impl Default for GmxState {
    fn default() -> Self {
        Self {
            machine_position: [0.0; AXES],
            g92_offset: [0.0; AXES],
            g92_enabled: false,
            g28_position: [0.0; AXES],
            g30_position: [0.0; AXES],
            m48_enabled: false,
            feed_override: OverrideRamp::new(
                crate::constants::FEED_OVERRIDE_DEFAULT,
                crate::constants::FEED_OVERRIDE_RAMP_TIME,
            ),
            traverse_override: OverrideRamp::new(
                crate::constants::TRAVERSE_OVERRIDE_DEFAULT,
                crate::constants::FEED_OVERRIDE_RAMP_TIME,
            ),
            block_delete_enabled: false,
            program_flow: ProgramFlow::default(),
        }
    }
}
