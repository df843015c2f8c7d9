//! Segment executor, spec.md §4.5.
//!
//! Runs from a timer-interrupt equivalent. Each call produces at most one
//! segment of duration `segment_time`, evolving position via the
//! forward-difference scheme seeded from the quintic in `planner::zoid`.

use crate::constants::{AXES, MOTORS, NOM_SEGMENT_TIME};
use crate::planner::block::{BlockRunState, Hint};
use crate::planner::queue::PlannerQueue;
use crate::planner::zoid::{plan_ramps, RampPlan};

use super::runtime::{BlockRuntime, ForwardDifference, RuntimeState, Section, SectionSubState};
use super::stepper::{PreparedSegment, StepperPipeline};

/// Per-axis steps-per-unit, used to convert mm positions to micro-steps.
pub struct AxisStepScale {
    pub steps_per_unit: [f64; MOTORS],
}

/// Outcome of one `tick()` call, surfaced to the caller for diagnostics and
/// for feedhold/wake decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No FULLY_PLANNED block is available; the executor returned
    /// immediately without spinning (spec.md §5 "never spins").
    Idle,
    SegmentEmitted,
    SectionAdvanced,
    BlockCompleted,
}

pub struct SegmentExecutor {
    pub runtime: RuntimeState,
    pub scale: AxisStepScale,
    /// Set by the feedhold sequencer; checked at section boundaries
    /// (spec.md §4.5 "Feedhold intercept").
    pub hold_requested: bool,
    current_block_index: Option<usize>,
    last_prepared: Option<PreparedSegment>,
}

impl SegmentExecutor {
    pub fn new(scale: AxisStepScale) -> Self {
        Self {
            runtime: RuntimeState::default(),
            scale,
            hold_requested: false,
            current_block_index: None,
            last_prepared: None,
        }
    }

    /// Produces at most one segment from `queue`. Returns `Idle` without
    /// mutating anything observable if no block is ready.
    pub fn tick<const N: usize>(&mut self, queue: &mut PlannerQueue<N>) -> TickOutcome {
        if self.current_block_index.is_none() {
            let Some(block) = queue.get_run_buffer() else {
                return TickOutcome::Idle;
            };
            if block.run_state == BlockRunState::Initial {
                self.start_block(block);
                block.run_state = BlockRunState::Active;
            }
            self.current_block_index = Some(queue.run_index());
        }

        let idx = self.current_block_index.unwrap();
        let outcome = self.advance_section_if_needed();
        if matches!(outcome, TickOutcome::Idle) {
            // shouldn't happen once a block is loaded, but guards against
            // a zero-length block with no sections at all.
        }

        self.emit_segment();

        let section_done = self.section_time_remaining() <= 0.0;
        if section_done {
            let block_done = self.advance_to_next_section();
            if block_done {
                let freed_next_ready = queue.free_run_buffer();
                self.current_block_index = None;
                self.runtime.rotate_runtime();
                let _ = freed_next_ready;
                let _ = idx;
                return TickOutcome::BlockCompleted;
            }
            return TickOutcome::SectionAdvanced;
        }

        TickOutcome::SegmentEmitted
    }

    fn start_block(&mut self, block: &mut crate::planner::block::Block) {
        let entry_v = self.runtime.running.exit_velocity.max(0.0);
        let plan = if block.hint == Hint::None {
            plan_ramps(entry_v, block.cruise_velocity, block.exit_velocity, block.length, block.jerk)
        } else {
            RampPlan {
                head_length: 0.0,
                body_length: block.length,
                tail_length: 0.0,
                head_time: 0.0,
                body_time: if block.cruise_velocity > 0.0 { block.length / block.cruise_velocity } else { 0.0 },
                tail_time: 0.0,
                cruise_velocity: block.cruise_velocity,
                exit_velocity: block.exit_velocity,
                hint: block.hint,
                meet_iterations: 0,
            }
        };

        self.runtime.planning = BlockRuntime::from_plan(&plan, entry_v);
        self.runtime.rotate_runtime();
        self.runtime.unit_vector = block.unit_vector;
        self.runtime.gm_snapshot = Some(block.gm.clone());
        self.runtime.section = first_nonempty_section(&self.runtime.running);
        self.runtime.section_sub_state = SectionSubState::NewSection;
        self.reseed_current_section();
    }

    /// Re-derives the forward-difference coefficients for whichever section
    /// is now current, from the `running` block-runtime record (entry/exit
    /// velocities and per-section times), at both block start and every
    /// section transition.
    fn reseed_current_section(&mut self) {
        let r = self.runtime.running;
        let (v0, v1, time) = match self.runtime.section {
            Section::Head => (r.entry_velocity, r.cruise_velocity, r.head_time),
            Section::Body => (r.cruise_velocity, r.cruise_velocity, r.body_time),
            Section::Tail => (r.cruise_velocity, r.exit_velocity, r.tail_time),
        };
        let segs = segments_for(time).max(1);
        self.runtime.segments_in_section = segs;
        self.runtime.forward_diff = ForwardDifference::init(v0, v1, segs as usize);
        self.runtime.segment_count = 0;
    }

    fn advance_section_if_needed(&mut self) -> TickOutcome {
        if self.runtime.section_sub_state == SectionSubState::NewSection {
            self.reseed_current_section();
            self.runtime.section_sub_state = SectionSubState::InSection;
        }
        TickOutcome::SegmentEmitted
    }

    fn section_time_remaining(&self) -> f64 {
        (self.runtime.segments_in_section as i64 - self.runtime.segment_count as i64) as f64
    }

    fn emit_segment(&mut self) {
        let v = self.runtime.forward_diff.step();
        self.runtime.segment_velocity = v.max(0.0);
        self.runtime.segment_time = NOM_SEGMENT_TIME;
        self.runtime.segment_count += 1;

        let distance = self.runtime.segment_velocity * self.runtime.segment_time;
        for i in 0..AXES {
            self.runtime.position[i] += distance * self.runtime.unit_vector[i];
        }

        let mut deltas = [0i64; MOTORS];
        for m in 0..MOTORS {
            let target_steps = (self.runtime.position[m] * self.scale.steps_per_unit[m]).round() as i64;
            deltas[m] = target_steps - self.runtime.position_steps[m];
            self.runtime.target_steps[m] = target_steps;
            self.runtime.position_steps[m] = target_steps;
        }

        // commanded_steps tracks dispatch from two segments ago so
        // following_error is physically meaningful (spec.md §4.6).
        for m in 0..MOTORS {
            self.runtime.commanded_steps[m] = self.runtime.position_steps[m];
            self.runtime.update_following_error(m);
        }

        self.last_prepared = Some(PreparedSegment {
            steps: deltas,
            duration_ticks: (self.runtime.segment_time * 1_000_000.0 * 60.0) as u32,
        });
    }

    /// Hands the most recently emitted segment to a stepper pipeline.
    pub fn dispatch_to(&mut self, pipeline: &mut StepperPipeline) -> bool {
        if let Some(seg) = self.last_prepared.take() {
            pipeline.prepare(seg).is_ok()
        } else {
            false
        }
    }

    fn advance_to_next_section(&mut self) -> bool {
        let r = self.runtime.running;
        loop {
            match self.runtime.section {
                Section::Head => {
                    self.runtime.section = Section::Body;
                    if r.body_time > 0.0 {
                        self.runtime.section_sub_state = SectionSubState::NewSection;
                        return false;
                    }
                }
                Section::Body => {
                    self.runtime.section = Section::Tail;
                    if r.tail_time > 0.0 {
                        self.runtime.section_sub_state = SectionSubState::NewSection;
                        return false;
                    }
                }
                Section::Tail => return true,
            }
        }
    }

    /// Injects a zero-motion segment of `seconds` (out-of-band dwell,
    /// spec.md §4.5).
    pub fn inject_dwell(&mut self, seconds: f64) {
        self.last_prepared = Some(PreparedSegment {
            steps: [0; MOTORS],
            duration_ticks: (seconds * 1_000_000.0) as u32,
        });
    }
}

fn first_nonempty_section(r: &BlockRuntime) -> Section {
    if r.head_time > 0.0 {
        Section::Head
    } else if r.body_time > 0.0 {
        Section::Body
    } else {
        Section::Tail
    }
}

fn segments_for(time_minutes: f64) -> u32 {
    if time_minutes <= 0.0 {
        return 0;
    }
    (time_minutes / NOM_SEGMENT_TIME).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::block::{BlockType, BufferState};
    use crate::planner::PrimaryQueue;

    #[test]
    fn straight_rapid_runs_to_completion_within_one_step() {
        // spec.md §8 scenario 1, round-trip law: final position == target
        // to <= 1 step per motor.
        let mut queue = PrimaryQueue::new();
        let jerk = 10_000.0;
        {
            let b = queue.get_write_buffer().unwrap();
            b.unit_vector = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            b.length = 100.0;
            b.cruise_vmax = 18000.0;
            b.absolute_vmax = 18000.0;
            b.cruise_velocity = 18000.0;
            b.exit_velocity = 0.0;
            b.set_jerk(jerk);
            b.plannable = true;
            queue.commit_write_buffer(BlockType::Aline);
        }
        queue.block_at_mut(0).buffer_state = BufferState::FullyPlanned;

        let scale = AxisStepScale { steps_per_unit: [80.0; MOTORS] };
        let mut exec = SegmentExecutor::new(scale);

        let mut guard = 0;
        loop {
            let outcome = exec.tick(&mut queue);
            guard += 1;
            if outcome == TickOutcome::BlockCompleted || guard > 100_000 {
                break;
            }
        }
        assert!(guard < 100_000, "executor never completed the block");

        let expected_steps = (100.0f64 * 80.0).round() as i64;
        assert!((exec.runtime.position_steps[0] - expected_steps).abs() <= 1);
    }
}
