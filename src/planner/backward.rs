//! Backward planner: cruise/exit velocity assignment, spec.md §4.3.
//!
//! Grounded on `original_source/g2core/planner.h`'s block-list sweep
//! description: runs from the newest committed block back toward the
//! running one, propagating the braking-length constraint and junction
//! caps. Driven by the `PLANNER_IDLE/STARTUP/PRIMING/BACK_PLANNING`
//! sub-state machine from `SPEC_FULL.md` §1b.

use crate::constants::{velocity_roughly_eq, AXES, BLOCK_TIMEOUT_MS};

use super::block::{BlockType, BufferState, Hint};
use super::junction::junction_velocity;
use super::queue::PlannerQueue;
use super::zoid::ramp_length;

/// Sub-states governing *when* the backward planner sweeps, rather than
/// sweeping unconditionally on every commit (`SPEC_FULL.md` §1b).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlannerRunState {
    #[default]
    Idle,
    Startup,
    Priming,
    BackPlanning,
}

/// Drives backward planning over a `PlannerQueue`. Holds no queue state of
/// its own beyond the assembly-timeout clock; the queue itself is the
/// source of truth for block topology.
#[derive(Debug, Default)]
pub struct BackwardPlanner {
    pub run_state: PlannerRunState,
    quiet_ms: f64,
    pub junction_integration_time: f64,
}

impl BackwardPlanner {
    pub fn new(junction_integration_time: f64) -> Self {
        Self { run_state: PlannerRunState::Idle, quiet_ms: 0.0, junction_integration_time }
    }

    /// Advances the assembly-timeout clock by `elapsed_ms` of queue quiet
    /// time; returns true once the block-assembly timeout (~30 ms) expires
    /// and a sweep should run even if more blocks might still arrive.
    pub fn tick_quiet_clock(&mut self, elapsed_ms: f64) -> bool {
        self.quiet_ms += elapsed_ms;
        self.quiet_ms >= BLOCK_TIMEOUT_MS
    }

    pub fn reset_quiet_clock(&mut self) {
        self.quiet_ms = 0.0;
    }

    pub fn request_sweep(&mut self) {
        if self.run_state == PlannerRunState::Idle {
            self.run_state = PlannerRunState::Priming;
        }
    }

    /// Performs one backward sweep over `queue`: computes junction
    /// velocities between adjacent plannable blocks, then walks newest to
    /// oldest assigning the maximum exit velocity each block's remaining
    /// length supports, pinning blocks whose exit_vmax already matches the
    /// downstream junction velocity.
    pub fn sweep<const N: usize>(&mut self, queue: &mut PlannerQueue<N>, jerk_max: &[f64; AXES]) {
        self.run_state = PlannerRunState::BackPlanning;
        self.reset_quiet_clock();

        let indices = queue.sweep_indices_back_from_newest();
        if indices.is_empty() {
            self.run_state = PlannerRunState::Idle;
            return;
        }

        // Forward pass to compute junction velocities (needs both
        // neighbors' unit vectors, cheapest read oldest-to-newest).
        let mut junctions = vec![f64::INFINITY; indices.len()];
        for (pos, &idx) in indices.iter().enumerate().rev() {
            if pos == indices.len() - 1 {
                continue; // oldest block in this sweep has no predecessor inside it
            }
            let next_idx = indices[pos + 1];
            let block_a = queue.block_at(idx);
            let block_b = queue.block_at(next_idx);
            if !block_a.is_move() || !block_b.is_move() {
                junctions[pos] = 0.0;
                continue;
            }
            let v = junction_velocity(
                &block_a.unit_vector,
                &block_b.unit_vector,
                jerk_max,
                self.junction_integration_time,
                block_a.cruise_vmax,
                block_b.cruise_vmax,
            );
            junctions[pos] = v;
        }

        // Backward pass: newest block's exit target is zero (end of
        // queue); each predecessor's exit is capped by its own
        // junction-limited exit toward the block ahead of it and by how
        // much length it has to decelerate in.
        let mut downstream_exit = 0.0;
        for (pos, &idx) in indices.iter().enumerate() {
            if !queue.block_at(idx).plannable {
                downstream_exit = queue.block_at(idx).exit_velocity;
                continue;
            }
            if queue.block_at(idx).buffer_state == BufferState::Running {
                break;
            }
            if !queue.block_at(idx).is_move() {
                let b = queue.block_at_mut(idx);
                b.exit_velocity = 0.0;
                b.buffer_state = BufferState::BackPlanned;
                downstream_exit = 0.0;
                continue;
            }

            let junction_cap = if pos == 0 { downstream_exit } else { junctions[pos - 1] };
            let b = queue.block_at_mut(idx);
            let max_brake_exit = max_exit_for_length(junction_cap.min(b.cruise_vmax), b.length, b.jerk);
            let exit_vmax = max_brake_exit.min(junction_cap).min(b.cruise_vmax).min(b.absolute_vmax).max(0.0);

            b.exit_vmax = exit_vmax;
            b.exit_velocity = exit_vmax;
            b.cruise_velocity = b.cruise_vmax;
            b.buffer_state = BufferState::BackPlanned;
            if b.hint == Hint::None {
                b.hint = Hint::Command;
            }

            if velocity_roughly_eq(exit_vmax, junction_cap) {
                b.plannable = false;
            }

            downstream_exit = exit_vmax;
        }

        self.run_state = PlannerRunState::Idle;
    }
}

/// The highest exit velocity a block of `length` at jerk `j` can decelerate
/// *to* from `entry_cap`, treating `entry_cap` as both the entry bound and
/// the notional "room available" ceiling. Inverts `ramp_length` by binary
/// search since the braking length is monotonic in `|v1 - entry_cap|`.
fn max_exit_for_length(entry_cap: f64, length: f64, jerk: f64) -> f64 {
    if jerk <= 0.0 || length <= 0.0 {
        return 0.0;
    }
    if ramp_length(entry_cap, entry_cap, jerk) <= length {
        return entry_cap;
    }
    let mut lo = 0.0;
    let mut hi = entry_cap;
    for _ in 0..24 {
        let mid = (lo + hi) / 2.0;
        if ramp_length(mid, entry_cap, jerk) <= length {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::block::BlockType;

    fn commit_move<const N: usize>(
        queue: &mut PlannerQueue<N>,
        unit_vector: [f64; AXES],
        length: f64,
        cruise_vmax: f64,
        jerk: f64,
    ) {
        let b = queue.get_write_buffer().unwrap();
        b.unit_vector = unit_vector;
        b.length = length;
        b.cruise_vmax = cruise_vmax;
        b.absolute_vmax = cruise_vmax;
        b.set_jerk(jerk);
        b.plannable = true;
        queue.commit_write_buffer(BlockType::Aline);
    }

    #[test]
    fn collinear_blocks_plan_continuous_body() {
        let mut queue: PlannerQueue<8> = PlannerQueue::new();
        let jerk_max = [1_000_000.0; AXES];
        commit_move(&mut queue, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10.0, 3000.0, 1_000_000.0);
        commit_move(&mut queue, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10.0, 3000.0, 1_000_000.0);

        let mut bp = BackwardPlanner::new(1.2);
        bp.sweep(&mut queue, &jerk_max);

        assert_eq!(queue.block_at(0).exit_velocity, 3000.0);
    }

    #[test]
    fn ninety_degree_corner_caps_exit_velocity() {
        let mut queue: PlannerQueue<8> = PlannerQueue::new();
        let jerk_max = [1000.0; AXES];
        commit_move(&mut queue, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 50.0, 6000.0, 1000.0);
        commit_move(&mut queue, [0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 50.0, 6000.0, 1000.0);

        let mut bp = BackwardPlanner::new(1.2);
        bp.sweep(&mut queue, &jerk_max);

        assert!((queue.block_at(0).exit_velocity - 1200.0).abs() < 1.0);
    }
}
