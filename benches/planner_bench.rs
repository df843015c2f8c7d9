// Benchmark for the backward planner sweep and segment executor tick rate.
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};

use g2motion::canonical::gcode_state::FeedRateMode;
use g2motion::canonical::CanonicalMachine;
use g2motion::config::Config;
use g2motion::constants::{AXES, MOTORS};
use g2motion::exec::segment::AxisStepScale;
use g2motion::exec::SegmentExecutor;
use g2motion::planner::backward::BackwardPlanner;
use g2motion::planner::block::BufferState;
use g2motion::planner::PrimaryQueue;

fn fill_zigzag_queue(n: usize) -> PrimaryQueue {
    let config = Config::default();
    let mut cm = CanonicalMachine::new(config.axes, false);
    cm.machine_state = g2motion::canonical::MachineState::Ready;
    cm.set_feed_rate(6000.0, FeedRateMode::UnitsPerMinute);
    let mut queue = PrimaryQueue::new();
    let mut flags = [false; AXES];
    flags[0] = true;
    flags[1] = true;
    let headroom = queue.capacity() - 4;
    for i in 0..n.min(headroom) {
        let mut target = [0.0; AXES];
        target[0] = (i as f64) * 10.0;
        target[1] = if i % 2 == 0 { 0.0 } else { 10.0 };
        if cm.straight_feed(&mut queue, target, flags).is_err() {
            break;
        }
    }
    queue
}

fn bench_backward_planner_sweep(c: &mut Criterion) {
    c.bench_function("backward planner sweep, 40-block zigzag queue", |b| {
        b.iter_batched(
            || fill_zigzag_queue(40),
            |mut queue| {
                let jerk_max = [1_000_000.0; AXES];
                let mut bp = BackwardPlanner::new(1.2);
                bp.sweep(&mut queue, &jerk_max);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_segment_executor_drain(c: &mut Criterion) {
    c.bench_function("segment executor drain, 8-block queue", |b| {
        b.iter_batched(
            || {
                let mut queue = fill_zigzag_queue(8);
                let jerk_max = [1_000_000.0; AXES];
                let mut bp = BackwardPlanner::new(1.2);
                bp.sweep(&mut queue, &jerk_max);
                for idx in 0..queue.capacity() {
                    if queue.block_at(idx).buffer_state == BufferState::BackPlanned {
                        queue.block_at_mut(idx).buffer_state = BufferState::FullyPlanned;
                    }
                }
                queue
            },
            |mut queue| {
                let mut exec = SegmentExecutor::new(AxisStepScale { steps_per_unit: [80.0; MOTORS] });
                for _ in 0..500_000 {
                    if matches!(exec.tick(&mut queue), g2motion::exec::TickOutcome::Idle) {
                        break;
                    }
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_backward_planner_sweep, bench_segment_executor_drain);
criterion_main!(benches);
