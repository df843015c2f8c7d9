//! The explicit `Scheduler`, spec.md §9 "Global CM/MR pointers" redesign
//! note: owns both the primary and secondary canonical machines/planners
//! and a "current" selector, rather than a process-wide swapped pointer.
//!
//! Grounded on the teacher's `printer.rs` (`Printer::start()`'s
//! `tokio::spawn` + `broadcast` shutdown + `interval` loops per subsystem).
//! The planner/executor/feedhold logic itself stays synchronous — it must
//! be callable from a bare interrupt context in the real firmware; only the
//! scheduler spawns `tokio` tasks (`SPEC_FULL.md` §1a).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use crate::canonical::CanonicalMachine;
use crate::config::Config;
use crate::error::{CoreError, ExceptionReport};
use crate::exec::segment::{AxisStepScale, SegmentExecutor, TickOutcome};
use crate::exec::stepper::StepperPipeline;
use crate::feedhold::{ActivePlanner, FeedholdExit, FeedholdSequencer, FeedholdType};
use crate::hardware::{HardwareManager, StepperSink};
use crate::planner::backward::BackwardPlanner;
use crate::planner::{PrimaryQueue, SecondaryQueue};

/// Timer-interrupt priorities simulated as distinct `tokio::time::interval`
/// periods, fastest first, since userspace `tokio` has no true interrupt
/// priority (`SPEC_FULL.md` §5).
pub const STEPPER_TICK_PERIOD: Duration = Duration::from_micros(50);
pub const SEGMENT_PREP_PERIOD: Duration = Duration::from_micros(750);
pub const BACKWARD_PLANNER_PUMP_PERIOD: Duration = Duration::from_millis(5);

pub struct Scheduler {
    pub primary_cm: CanonicalMachine,
    pub secondary_cm: CanonicalMachine,
    pub primary_queue: PrimaryQueue,
    pub secondary_queue: SecondaryQueue,
    pub backward_planner: BackwardPlanner,
    pub executor: SegmentExecutor,
    pub stepper: StepperPipeline,
    pub feedhold: FeedholdSequencer,
    pub config: Config,
    pub last_exception: Option<ExceptionReport>,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        let axes = config.axes.clone();
        let motors: Vec<_> = {
            let mut v: Vec<_> = config.motors.values().cloned().collect();
            v.sort_by_key(|m| m.axis);
            v
        };
        let steps_per_unit = {
            let mut arr = [80.0; crate::constants::MOTORS];
            for i in 0..crate::constants::MOTORS {
                arr[i] = config.steps_per_unit(i);
            }
            arr
        };

        Self {
            primary_cm: CanonicalMachine::new(axes.clone(), config.system.soft_limits_enabled),
            secondary_cm: CanonicalMachine::new(axes, config.system.soft_limits_enabled),
            primary_queue: PrimaryQueue::new(),
            secondary_queue: SecondaryQueue::new(),
            backward_planner: BackwardPlanner::new(config.system.junction_integration_time),
            executor: SegmentExecutor::new(AxisStepScale { steps_per_unit }),
            stepper: StepperPipeline::new(motors, config.system.motor_power_timeout_s),
            feedhold: FeedholdSequencer::default(),
            config,
            last_exception: None,
        }
    }

    fn active_cm(&mut self) -> &mut CanonicalMachine {
        match self.feedhold.active_planner {
            ActivePlanner::Primary => &mut self.primary_cm,
            ActivePlanner::Secondary => &mut self.secondary_cm,
        }
    }

    /// One backward-planner pump (the main-loop callback of spec.md §5).
    pub fn pump_backward_planner(&mut self) {
        let jerk_max: [f64; crate::constants::AXES] = {
            let mut arr = [0.0; crate::constants::AXES];
            for (i, axis) in self.primary_cm.axes.iter().enumerate() {
                arr[i] = axis.jerk_max_real();
            }
            arr
        };
        self.backward_planner.sweep(&mut self.primary_queue, &jerk_max);
    }

    /// One segment-executor tick; drives the feedhold intercept at section
    /// boundaries (spec.md §4.5, §4.8) and advances the feed/traverse
    /// override ramps (spec.md §4.3).
    pub fn tick_executor(&mut self) -> TickOutcome {
        self.advance_overrides(crate::constants::NOM_SEGMENT_TIME);
        let outcome = self.executor.tick(&mut self.primary_queue);
        if matches!(outcome, TickOutcome::SectionAdvanced) && !self.feedhold.is_idle() {
            self.advance_feedhold();
        }
        if matches!(outcome, TickOutcome::BlockCompleted) && self.primary_queue.available() == self.primary_queue.capacity() {
            self.primary_cm.on_queue_drained();
        }
        outcome
    }

    /// Syncs any pending override request and advances both ramps by
    /// `elapsed_time` minutes (`MFO_REQUESTED -> MFO_SYNC -> MFO_OFF`).
    fn advance_overrides(&mut self, elapsed_time: f64) {
        self.primary_cm.gmx.feed_override.sync();
        self.primary_cm.gmx.feed_override.tick(elapsed_time);
        self.primary_cm.gmx.traverse_override.sync();
        self.primary_cm.gmx.traverse_override.tick(elapsed_time);
    }

    fn advance_feedhold(&mut self) {
        use crate::feedhold::FeedholdState::*;
        match self.feedhold.state {
            Requested => self.feedhold.sync(),
            Sync => {
                let v = self.executor.runtime.segment_velocity;
                let remaining = self.executor.runtime.running.tail_length;
                let jerk = if self.feedhold.hold_type == Some(FeedholdType::Scram) {
                    self.fastest_axis_jerk() * 10.0
                } else {
                    self.fastest_axis_jerk()
                };
                self.feedhold.decide_decel_fit(v, remaining, jerk);
            }
            DecelContinue | DecelToZero => {
                if self.executor.runtime.segment_velocity <= crate::constants::MIN_SEGMENT_VELOCITY {
                    self.feedhold.decel_complete();
                }
            }
            DecelComplete => self.feedhold.motion_stopping(),
            MotionStopping => self.feedhold.motion_stopped(),
            MotionStopped => self.feedhold.begin_hold_actions(),
            HoldActionsPending => {
                if self.secondary_queue.available() == self.secondary_queue.capacity() {
                    self.feedhold.hold_actions_complete();
                }
            }
            HoldActionsComplete => {
                self.feedhold.enter_hold();
                self.primary_cm.motion_state = crate::canonical::MotionState::Hold;
            }
            _ => {}
        }
    }

    fn fastest_axis_jerk(&self) -> f64 {
        self.primary_cm.axes.iter().map(|a| a.jerk_max_real()).fold(f64::INFINITY, f64::min)
    }

    pub fn request_feedhold(&mut self, hold_type: FeedholdType, exit: FeedholdExit) {
        self.feedhold.request_feedhold(hold_type, exit);
        tracing::warn!("feedhold requested: {:?} / exit {:?}", hold_type, exit);
    }

    pub fn request_cycle_start(&mut self) -> bool {
        let ok = self.feedhold.request_cycle_start();
        if ok {
            self.primary_cm.cycle_start();
            self.primary_cm.motion_state = crate::canonical::MotionState::Run;
        }
        ok
    }

    pub fn request_queue_flush(&mut self) -> Result<(), CoreError> {
        if !self.feedhold.request_queue_flush() {
            return Err(CoreError::Rejected(crate::error::StatusCode::MachineAlarmed));
        }
        self.primary_queue.flush(true);
        self.primary_cm.gmx.machine_position = self.executor.runtime.position;
        self.primary_cm.on_queue_drained();
        self.primary_cm.reset_overrides();
        self.feedhold.reset_to_off();
        tracing::info!("queue flushed after feedhold");
        Ok(())
    }

    pub fn request_job_kill(&mut self) {
        self.feedhold.request_job_kill();
        if self.feedhold.job_kill_ready() {
            self.primary_queue.flush(false);
            self.primary_cm.program_end();
            self.feedhold.job_kill_complete();
            self.feedhold.reset_to_off();
        }
    }

    pub fn halt_motion(&mut self) {
        self.request_feedhold(FeedholdType::Scram, FeedholdExit::Stop);
    }

    pub fn alarm(&mut self, status: crate::error::StatusCode, msg: impl Into<String>) {
        self.primary_cm.alarm();
        self.halt_motion();
        let report = ExceptionReport::new(status, msg);
        tracing::error!("{}", report);
        self.last_exception = Some(report);
    }

    pub fn shutdown_machine(&mut self, status: crate::error::StatusCode, msg: impl Into<String>) {
        self.primary_cm.shutdown();
        let report = ExceptionReport::new(status, msg);
        tracing::error!("{}", report);
        self.last_exception = Some(report);
    }

    pub fn panic_machine(&mut self, status: crate::error::StatusCode, msg: impl Into<String>) {
        self.primary_cm.panic();
        let report = ExceptionReport::new(status, msg);
        tracing::error!("{}", report);
        self.last_exception = Some(report);
    }

    pub fn clear(&mut self) {
        self.primary_cm.clear();
    }

    pub fn primary_cm_mut(&mut self) -> &mut CanonicalMachine {
        &mut self.primary_cm
    }
}

/// Spawns the scheduler's cooperative and preemptive loops on `tokio`,
/// returning the `broadcast::Sender` the caller uses to request shutdown.
pub fn start(scheduler: Arc<RwLock<Scheduler>>, mut hardware: HardwareManager) -> broadcast::Sender<()> {
    let (shutdown_tx, _) = broadcast::channel(1);

    // Stepper pipeline tick: highest priority.
    {
        let scheduler = scheduler.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STEPPER_TICK_PERIOD);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let events = {
                            let mut guard = scheduler.write().await;
                            guard.stepper.tick()
                        };
                        if !events.is_empty() {
                            if let Err(e) = hardware.dispatch(&events).await {
                                tracing::warn!("hardware dispatch failed: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("stepper tick loop shutting down");
                        break;
                    }
                }
            }
        });
    }

    // Segment executor: next priority.
    {
        let scheduler = scheduler.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SEGMENT_PREP_PERIOD);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let mut guard = scheduler.write().await;
                        let outcome = guard.tick_executor();
                        if matches!(outcome, TickOutcome::SegmentEmitted | TickOutcome::SectionAdvanced) {
                            let mut stepper = std::mem::replace(
                                &mut guard.stepper,
                                StepperPipeline::new(Vec::new(), 0.0),
                            );
                            guard.executor.dispatch_to(&mut stepper);
                            guard.stepper = stepper;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("segment executor loop shutting down");
                        break;
                    }
                }
            }
        });
    }

    // Backward planner pump: lowest priority, cooperative.
    {
        let scheduler = scheduler.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BACKWARD_PLANNER_PUMP_PERIOD);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let mut guard = scheduler.write().await;
                        if guard.backward_planner.tick_quiet_clock(BACKWARD_PLANNER_PUMP_PERIOD.as_secs_f64() * 1000.0)
                            || guard.primary_queue.available() < crate::constants::PLANNER_QUEUE_SIZE
                        {
                            guard.pump_backward_planner();
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("backward planner pump loop shutting down");
                        break;
                    }
                }
            }
        });
    }

    shutdown_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedhold::{FeedholdState, JobKillState};

    fn enter_hold(scheduler: &mut Scheduler) {
        scheduler.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        scheduler.feedhold.sync();
        scheduler.feedhold.decide_decel_fit(0.0, 0.0, 10_000.0);
        scheduler.feedhold.decel_complete();
        scheduler.feedhold.motion_stopping();
        scheduler.feedhold.motion_stopped();
        scheduler.feedhold.begin_hold_actions();
        scheduler.feedhold.hold_actions_complete();
        scheduler.feedhold.enter_hold();
        assert_eq!(scheduler.feedhold.state, FeedholdState::Hold);
    }

    /// A feedhold that exits via queue flush must return the sequencer to
    /// OFF, or every subsequent `request_feedhold` silently no-ops.
    #[test]
    fn queue_flush_returns_feedhold_sequencer_to_off() {
        let mut scheduler = Scheduler::new(Config::default());
        enter_hold(&mut scheduler);

        scheduler.request_queue_flush().unwrap();
        assert_eq!(scheduler.feedhold.state, FeedholdState::Off);

        scheduler.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        assert_eq!(scheduler.feedhold.state, FeedholdState::Requested);
    }

    /// Same bug, the job-kill path: killing a job while held must not
    /// leave the sequencer stuck in HOLD either.
    #[test]
    fn job_kill_from_hold_returns_feedhold_sequencer_to_off() {
        let mut scheduler = Scheduler::new(Config::default());
        enter_hold(&mut scheduler);

        scheduler.request_job_kill();
        assert_eq!(scheduler.feedhold.job_kill, JobKillState::Off);
        assert_eq!(scheduler.feedhold.state, FeedholdState::Off);

        scheduler.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        assert_eq!(scheduler.feedhold.state, FeedholdState::Requested);
    }

    /// Open-question decision (DESIGN.md): a queue flush resets both
    /// override ramps to 1.0 with no pending request.
    #[test]
    fn queue_flush_resets_override_factors_to_default() {
        let mut scheduler = Scheduler::new(Config::default());
        scheduler.primary_cm.request_feed_override(0.5);
        scheduler.primary_cm.gmx.feed_override.sync();
        enter_hold(&mut scheduler);

        scheduler.request_queue_flush().unwrap();

        assert_eq!(scheduler.primary_cm.gmx.feed_override.current_factor(), 1.0);
        assert_eq!(scheduler.primary_cm.gmx.feed_override.state, crate::canonical::OverrideState::Off);
    }
}
