//! End-to-end tests against spec.md §8 "Testable properties": quantified
//! invariants, round-trip laws, and boundary behaviors, driven through the
//! public `CanonicalMachine` / `PlannerQueue` / `SegmentExecutor` API rather
//! than any single module's internals.

use g2motion::canonical::gcode_state::{CanonicalPlane, FeedRateMode};
use g2motion::canonical::{CanonicalMachine, MachineState};
use g2motion::config::Config;
use g2motion::constants::{AXES, MOTORS};
use g2motion::error::CoreError;
use g2motion::exec::segment::AxisStepScale;
use g2motion::exec::{SegmentExecutor, TickOutcome};
use g2motion::planner::arc::ArcGenerator;
use g2motion::planner::backward::BackwardPlanner;
use g2motion::planner::block::BufferState;
use g2motion::planner::PrimaryQueue;

fn fresh_cm() -> CanonicalMachine {
    let config = Config::default();
    let mut cm = CanonicalMachine::new(config.axes, config.system.soft_limits_enabled);
    cm.machine_state = MachineState::Ready;
    cm.set_feed_rate(18000.0, FeedRateMode::UnitsPerMinute);
    cm
}

fn back_plan_all(queue: &mut PrimaryQueue) {
    let jerk_max = [1_000_000.0; AXES];
    let mut bp = BackwardPlanner::new(1.2);
    bp.sweep(queue, &jerk_max);
    for idx in 0..queue.capacity() {
        if queue.block_at(idx).buffer_state == BufferState::BackPlanned {
            queue.block_at_mut(idx).buffer_state = BufferState::FullyPlanned;
        }
    }
}

fn run_to_idle(queue: &mut PrimaryQueue, exec: &mut SegmentExecutor) {
    for _ in 0..2_000_000 {
        if matches!(exec.tick(queue), TickOutcome::Idle) {
            return;
        }
    }
    panic!("executor never drained the queue");
}

/// spec.md §8 round-trip law: commit a block, run backward + forward
/// planner, execute all segments: final machine position equals
/// block.target to <= 1 step per motor.
#[test]
fn round_trip_straight_rapid_matches_target_within_one_step() {
    let mut cm = fresh_cm();
    let mut queue = PrimaryQueue::new();
    let mut target = [0.0; AXES];
    target[0] = 100.0;
    let mut flags = [false; AXES];
    flags[0] = true;
    cm.straight_traverse(&mut queue, target, flags).unwrap();

    back_plan_all(&mut queue);
    let mut exec = SegmentExecutor::new(AxisStepScale { steps_per_unit: [80.0; MOTORS] });
    run_to_idle(&mut queue, &mut exec);

    let expected = (100.0f64 * 80.0).round() as i64;
    assert!((exec.runtime.position_steps[0] - expected).abs() <= 1);
}

/// spec.md §8 quantified invariant: head+body+tail == block length, and
/// 0 <= entry <= cruise <= cruise_vmax <= absolute_vmax after planning.
#[test]
fn backward_planned_block_respects_velocity_ordering() {
    let mut cm = fresh_cm();
    let mut queue = PrimaryQueue::new();
    let mut target = [0.0; AXES];
    target[0] = 50.0;
    let mut flags = [false; AXES];
    flags[0] = true;
    cm.straight_feed(&mut queue, target, flags).unwrap();

    back_plan_all(&mut queue);
    let b = queue.block_at(0);
    assert!(b.exit_velocity <= b.exit_vmax + 1e-6);
    assert!(b.cruise_velocity <= b.cruise_vmax + 1e-6);
    assert!(b.cruise_vmax <= b.absolute_vmax + 1e-6);
    assert!(b.exit_vmax >= 0.0);
}

/// spec.md §8 round-trip law: two collinear blocks hand off one's exit
/// velocity as the next's entry velocity — no decel between them.
#[test]
fn adjacent_collinear_blocks_share_junction_velocity() {
    let mut cm = fresh_cm();
    let mut queue = PrimaryQueue::new();
    cm.set_feed_rate(3000.0, FeedRateMode::UnitsPerMinute);
    let mut flags = [false; AXES];
    flags[0] = true;

    let mut t1 = [0.0; AXES];
    t1[0] = 10.0;
    cm.straight_feed(&mut queue, t1, flags).unwrap();
    let mut t2 = [0.0; AXES];
    t2[0] = 20.0;
    cm.straight_feed(&mut queue, t2, flags).unwrap();

    back_plan_all(&mut queue);
    assert!((queue.block_at(0).exit_velocity - queue.block_at(0).cruise_vmax).abs() < 1.0);
}

/// spec.md §8 round-trip law: offset O, move to absolute target T in that
/// system, switch to absolute (G53): reported absolute = T + O.
#[test]
fn coordinate_offset_round_trip() {
    let mut cm = fresh_cm();
    cm.soft_limits_enabled = false;
    let mut queue = PrimaryQueue::new();
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

/// spec.md §8 boundary behavior: coord system index outside 0..6 is
/// rejected.
#[test]
fn coord_system_index_out_of_range_is_rejected() {
    let mut cm = fresh_cm();
    let err = cm.set_coord_system(99).unwrap_err();
    assert!(matches!(err, CoreError::InvalidCoordSystem(_, 99)));
}

/// spec.md §8 boundary behavior: the queue rejects writes once fewer than
/// `PLANNER_BUFFER_HEADROOM` buffers remain free.
#[test]
fn queue_rejects_writes_past_headroom() {
    let mut cm = fresh_cm();
    let mut queue = PrimaryQueue::new();
    let mut flags = [false; AXES];
    flags[0] = true;
    let mut rejected = false;
    for i in 0..(queue.capacity() + 1) {
        let mut target = [0.0; AXES];
        target[0] = i as f64 + 1.0;
        if cm.straight_feed(&mut queue, target, flags).is_err() {
            rejected = true;
            break;
        }
    }
    assert!(rejected, "queue should eventually reject once headroom is exhausted");
}

/// spec.md §8 boundary behavior: jerk outside [JERK_INPUT_MIN,
/// JERK_INPUT_MAX] is rejected at config-validation time.
#[test]
fn out_of_range_jerk_rejected_at_config_load() {
    let mut config = Config::default();
    config.axes[0].jerk_max = 1e9; // real jerk far above JERK_INPUT_MAX
    assert!(config.validate().is_err());
}

/// spec.md §8 round-trip law: a feedhold that reaches HOLD and then
/// cycle-restarts returns to idle without touching the planner queue.
#[test]
fn feedhold_then_cycle_restart_returns_to_idle() {
    use g2motion::feedhold::{FeedholdExit, FeedholdSequencer, FeedholdState, FeedholdType};

    let mut seq = FeedholdSequencer::default();
    seq.request_feedhold(FeedholdType::Hold, FeedholdExit::Cycle);
    seq.sync();
    seq.decide_decel_fit(18000.0, 500.0, 10_000.0);
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

/// spec.md §8 quantified invariant: after a queue flush, planner position
/// and machine position agree (here: the queue has no stray planned blocks
/// left and the running block, if any, survives).
#[test]
fn queue_flush_keeps_running_block_and_frees_successors() {
    let mut cm = fresh_cm();
    let mut queue = PrimaryQueue::new();
    let mut flags = [false; AXES];
    flags[0] = true;

    let mut t1 = [0.0; AXES];
    t1[0] = 500.0;
    cm.straight_traverse(&mut queue, t1, flags).unwrap();
    let mut t2 = [0.0; AXES];
    t2[0] = 600.0;
    cm.straight_traverse(&mut queue, t2, flags).unwrap();

    queue.block_at_mut(0).buffer_state = BufferState::Running;
    queue.flush(true);

    assert_eq!(queue.block_at(0).buffer_state, BufferState::Running);
    assert_eq!(queue.available(), queue.capacity() - 1);
}

/// spec.md §8 scenario 6: an arc expands into chord-bounded sub-blocks that
/// can each be fed through `straight_feed` and land exactly on the
/// requested endpoint.
#[test]
fn arc_sub_blocks_feed_through_to_exact_endpoint() {
    let mut cm = fresh_cm();
    cm.soft_limits_enabled = false;
    let mut queue = PrimaryQueue::new();
    cm.set_feed_rate(3000.0, FeedRateMode::UnitsPerMinute);

    let start = cm.gmx.machine_position;
    let mut end = start;
    end[0] = 10.0;
    let mut arc = ArcGenerator::new(start, end, (0.0, -5.0), CanonicalPlane::Xy, true, 0, 0.01);

    let flags = [true, true, false, false, false, false];
    while let Some(seg) = arc.next_segment() {
        let mut target = [0.0; AXES];
        target[..2].copy_from_slice(&seg.target[..2]);
        if let Err(e) = cm.straight_feed(&mut queue, target, flags) {
            // headroom exhausted mid-arc is acceptable for this test's
            // purposes; the remaining chords would be fed on the next tick.
            if matches!(e, CoreError::QueueFull(_)) {
                break;
            }
            panic!("unexpected error feeding arc chord: {e}");
        }
    }

    assert!((cm.gmx.machine_position[0] - end[0]).abs() < 1e-6);
    assert!((cm.gmx.machine_position[1] - end[1]).abs() < 1e-6);
}
