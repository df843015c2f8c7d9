//! Feedhold / cycle-start / queue-flush operation sequencer, spec.md §4.8.
//!
//! State names/ordering grounded directly on
//! `original_source/g2core/canonical_machine.h`'s `cmFeedholdType/Exit/
//! State` enums.

use crate::planner::zoid::ramp_length;

/// `cmFeedholdType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedholdType {
    Hold,
    Actions,
    Skip,
    Scram,
}

/// `cmFeedholdExit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedholdExit {
    Cycle,
    Flush,
    Stop,
    End,
    Alarm,
    Shutdown,
    Interlock,
    ResetPosition,
}

/// `cmFeedholdState`, the monotonic state list of spec.md §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedholdState {
    #[default]
    Off,
    Requested,
    Sync,
    DecelContinue,
    DecelToZero,
    DecelComplete,
    MotionStopping,
    MotionStopped,
    HoldActionsPending,
    HoldActionsComplete,
    Hold,
    ExitActionsPending,
    ExitActionsComplete,
}

/// `JOB_KILL_OFF/REQUESTED/RUNNING`, `SPEC_FULL.md` §1b.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobKillState {
    #[default]
    Off,
    Requested,
    Running,
}

/// Which planner (primary vs. the hold-entry-actions secondary) the
/// scheduler should currently route motion through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePlanner {
    Primary,
    Secondary,
}

/// Decision returned by `decide_decel_fit`, spec.md §4.8 "Deceleration fit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecelFit {
    /// `remaining_length` fits a full decel to zero within this block.
    ToZero,
    /// Finish this block at an intermediate velocity; continue decel in
    /// successor blocks until zero is reached.
    Continue,
}

pub struct FeedholdSequencer {
    pub state: FeedholdState,
    pub hold_type: Option<FeedholdType>,
    pub exit: Option<FeedholdExit>,
    pub job_kill: JobKillState,
    pub active_planner: ActivePlanner,
}

impl Default for FeedholdSequencer {
    fn default() -> Self {
        Self {
            state: FeedholdState::Off,
            hold_type: None,
            exit: None,
            job_kill: JobKillState::Off,
            active_planner: ActivePlanner::Primary,
        }
    }
}

impl FeedholdSequencer {
    pub fn is_idle(&self) -> bool {
        self.state == FeedholdState::Off
    }

    /// `request_feedhold(type, exit)`: only accepted from OFF.
    pub fn request_feedhold(&mut self, hold_type: FeedholdType, exit: FeedholdExit) {
        if !self.is_idle() {
            return;
        }
        self.hold_type = Some(hold_type);
        self.exit = Some(exit);
        self.state = FeedholdState::Requested;
    }

    /// Advances REQUESTED -> SYNC, called once the segment executor has
    /// reached a section boundary and can safely begin decel (spec.md
    /// §3 invariant: never honored inside the head acceleration phase).
    pub fn sync(&mut self) {
        if self.state == FeedholdState::Requested {
            self.state = FeedholdState::Sync;
        }
    }

    /// spec.md §4.8 "Deceleration fit": given the current block's jerk,
    /// current velocity, and remaining length, decides whether the
    /// remainder of the current block can absorb a full decel to zero.
    pub fn decide_decel_fit(&mut self, current_velocity: f64, remaining_length: f64, jerk: f64) -> DecelFit {
        let decel_len = ramp_length(current_velocity, 0.0, jerk);
        let fit = if decel_len <= remaining_length { DecelFit::ToZero } else { DecelFit::Continue };
        self.state = match fit {
            DecelFit::ToZero => FeedholdState::DecelToZero,
            DecelFit::Continue => FeedholdState::DecelContinue,
        };
        fit
    }

    pub fn decel_complete(&mut self) {
        if matches!(self.state, FeedholdState::DecelToZero | FeedholdState::DecelContinue) {
            self.state = FeedholdState::DecelComplete;
        }
    }

    pub fn motion_stopping(&mut self) {
        if self.state == FeedholdState::DecelComplete {
            self.state = FeedholdState::MotionStopping;
        }
    }

    /// The remaining block is finalized per spec.md §4.8
    /// "Motion-stopped finalization": SKIP discards it, HOLD retains it
    /// with a shortened length reset to INITIAL so the forward planner
    /// redoes it from zero.
    pub fn motion_stopped(&mut self) {
        if self.state == FeedholdState::MotionStopping {
            self.state = FeedholdState::MotionStopped;
        }
    }

    pub fn begin_hold_actions(&mut self) {
        if self.state != FeedholdState::MotionStopped {
            return;
        }
        self.state = FeedholdState::HoldActionsPending;
        if self.hold_type == Some(FeedholdType::Actions) {
            self.active_planner = ActivePlanner::Secondary;
        }
    }

    /// Called by the scheduler once the secondary planner's queue drains
    /// (spec.md §4.8 "Hold-entry actions").
    pub fn hold_actions_complete(&mut self) {
        if self.state == FeedholdState::HoldActionsPending {
            self.state = FeedholdState::HoldActionsComplete;
            self.active_planner = ActivePlanner::Primary;
        }
    }

    pub fn enter_hold(&mut self) {
        if matches!(self.state, FeedholdState::HoldActionsComplete | FeedholdState::MotionStopped) {
            self.state = FeedholdState::Hold;
        }
    }

    /// `request_cycle_start()`: valid only from HOLD. Runs reverse actions
    /// (resume spindle/coolant, return-move) and clears hold state.
    pub fn request_cycle_start(&mut self) -> bool {
        if self.state != FeedholdState::Hold {
            return false;
        }
        self.state = FeedholdState::ExitActionsPending;
        true
    }

    pub fn exit_actions_complete(&mut self) {
        if self.state == FeedholdState::ExitActionsPending {
            self.state = FeedholdState::ExitActionsComplete;
        }
    }

    /// Final step back to OFF once exit actions have completed.
    pub fn finish_exit(&mut self) {
        if self.state == FeedholdState::ExitActionsComplete {
            self.state = FeedholdState::Off;
            self.hold_type = None;
            self.exit = None;
        }
    }

    /// `request_queue_flush()`: only valid in HOLD.
    pub fn request_queue_flush(&mut self) -> bool {
        self.state == FeedholdState::Hold
    }

    /// Forces the sequencer back to OFF regardless of current state: the
    /// terminal step of the FLUSH/END exit paths (spec.md §4.8 describes
    /// queue-flush and job-kill as ending the hold cycle outright, not
    /// just another state transition within it).
    pub fn reset_to_off(&mut self) {
        self.state = FeedholdState::Off;
        self.hold_type = None;
        self.exit = None;
    }

    /// `request_job_kill()` (^D), spec.md §4.8 "Job kill".
    pub fn request_job_kill(&mut self) {
        match self.job_kill {
            JobKillState::Off => {
                self.job_kill = JobKillState::Requested;
                if self.is_idle() {
                    // No cycle/hold in progress: run the kill directly.
                    self.job_kill = JobKillState::Running;
                } else if self.state != FeedholdState::Hold {
                    // Inject a scram feedhold before running the kill.
                    self.request_feedhold(FeedholdType::Scram, FeedholdExit::End);
                }
            }
            JobKillState::Requested | JobKillState::Running => {}
        }
    }

    pub fn job_kill_ready(&self) -> bool {
        self.job_kill == JobKillState::Requested && (self.is_idle() || self.state == FeedholdState::Hold)
    }

    pub fn job_kill_complete(&mut self) {
        self.job_kill = JobKillState::Off;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decel_fits_to_zero_when_length_sufficient() {
        let mut seq = FeedholdSequencer::default();
        seq.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        seq.sync();
        let fit = seq.decide_decel_fit(1000.0, 1000.0, 10_000.0);
        assert_eq!(fit, DecelFit::ToZero);
        assert_eq!(seq.state, FeedholdState::DecelToZero);
    }

    #[test]
    fn decel_continues_when_length_insufficient() {
        let mut seq = FeedholdSequencer::default();
        seq.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        seq.sync();
        let fit = seq.decide_decel_fit(18000.0, 0.001, 10_000.0);
        assert_eq!(fit, DecelFit::Continue);
    }

    #[test]
    fn full_hold_and_resume_cycle() {
        let mut seq = FeedholdSequencer::default();
        seq.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        seq.sync();
        seq.decide_decel_fit(100.0, 1000.0, 10_000.0);
        seq.decel_complete();
        seq.motion_stopping();
        seq.motion_stopped();
        seq.begin_hold_actions();
        seq.hold_actions_complete();
        seq.enter_hold();
        assert_eq!(seq.state, FeedholdState::Hold);

        assert!(seq.request_cycle_start());
        seq.exit_actions_complete();
        seq.finish_exit();
        assert!(seq.is_idle());
    }

    #[test]
    fn job_kill_with_no_active_cycle_runs_directly() {
        let mut seq = FeedholdSequencer::default();
        seq.request_job_kill();
        assert_eq!(seq.job_kill, JobKillState::Running);
    }

    #[test]
    fn job_kill_during_cycle_injects_scram() {
        let mut seq = FeedholdSequencer::default();
        seq.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
        seq.request_job_kill();
        assert_eq!(seq.hold_type, Some(FeedholdType::Hold));
    }
}
