//! Stepper pipeline: double-buffered segment DDA, spec.md §4.6.
//!
//! Grounded on the teacher's `motion/stepper.rs` `StepCommand`/timing types,
//! adapted into a double-buffered DDA instead of the teacher's buffered
//! command list.

use crate::config::{MotorConfig, PowerMode};
use crate::constants::MOTORS;

/// One segment's worth of per-motor step/direction/duration data, handed
/// off by the segment executor (spec.md §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct PreparedSegment {
    /// Signed step count per motor for this segment (sign sets direction).
    pub steps: [i64; MOTORS],
    pub duration_ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorPowerState {
    #[default]
    Disabled,
    Idle,
    Active,
}

struct MotorDda {
    accumulator: i64,
    rate: i64,
    remaining_steps: i64,
    direction: Direction,
    power_state: MotorPowerState,
    idle_elapsed_ticks: u64,
}

impl Default for MotorDda {
    fn default() -> Self {
        Self {
            accumulator: 0,
            rate: 0,
            remaining_steps: 0,
            direction: Direction::Positive,
            power_state: MotorPowerState::Disabled,
            idle_elapsed_ticks: 0,
        }
    }
}

/// One step or direction edge emitted by a `tick()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperEvent {
    Step { motor: usize },
    DirectionChange { motor: usize, direction: Direction },
    PowerChange { motor: usize, enabled: bool },
}

/// Double-buffers prepared segments: while segment N executes, segment N+1
/// is being prepared by the caller.
pub struct StepperPipeline {
    current: Option<PreparedSegment>,
    next: Option<PreparedSegment>,
    motors: [MotorDda; MOTORS],
    motor_configs: Vec<MotorConfig>,
    idle_timeout_ticks: u64,
}

const TICKS_PER_SECOND: u64 = 1_000_000;

impl StepperPipeline {
    pub fn new(motor_configs: Vec<MotorConfig>, idle_timeout_s: f64) -> Self {
        Self {
            current: None,
            next: None,
            motors: Default::default(),
            motor_configs,
            idle_timeout_ticks: (idle_timeout_s * TICKS_PER_SECOND as f64) as u64,
        }
    }

    /// Queues a prepared segment into the free double-buffer slot.
    pub fn prepare(&mut self, segment: PreparedSegment) -> Result<(), PreparedSegment> {
        if self.current.is_none() {
            self.current = Some(segment);
            self.start_segment();
            Ok(())
        } else if self.next.is_none() {
            self.next = Some(segment);
            Ok(())
        } else {
            Err(segment)
        }
    }

    pub fn has_room(&self) -> bool {
        self.next.is_none()
    }

    fn start_segment(&mut self) {
        let Some(seg) = self.current else { return };
        for (m, dda) in self.motors.iter_mut().enumerate() {
            let steps = seg.steps[m];
            dda.remaining_steps = steps.abs();
            dda.direction = if steps >= 0 { Direction::Positive } else { Direction::Negative };
            if seg.duration_ticks > 0 {
                dda.rate = (steps.abs() << 16) / seg.duration_ticks as i64;
            } else {
                dda.rate = 0;
            }
            dda.accumulator = 0;
            if dda.remaining_steps > 0 {
                dda.idle_elapsed_ticks = 0;
                if dda.power_state != MotorPowerState::Active {
                    dda.power_state = MotorPowerState::Active;
                }
            }
        }
    }

    /// Advances every motor's DDA accumulator by one tick and returns the
    /// events that occurred (step edges, direction changes, power-state
    /// transitions). Emits direction changes first, matching "direction is
    /// applied before the first step of a segment" (spec.md §4.6).
    pub fn tick(&mut self) -> Vec<StepperEvent> {
        let mut events = Vec::new();
        let Some(seg) = self.current else { return events };

        let mut exhausted = true;
        for m in 0..MOTORS {
            let dda = &mut self.motors[m];
            if dda.remaining_steps <= 0 {
                self.advance_power_state(m, &mut events);
                continue;
            }
            exhausted = false;
            dda.accumulator += dda.rate;
            while dda.accumulator >= (1 << 16) && dda.remaining_steps > 0 {
                dda.accumulator -= 1 << 16;
                dda.remaining_steps -= 1;
                events.push(StepperEvent::Step { motor: m });
            }
        }
        let _ = seg;

        if exhausted {
            self.current = self.next.take();
            if self.current.is_some() {
                self.start_segment();
            }
        }
        events
    }

    fn advance_power_state(&mut self, motor: usize, events: &mut Vec<StepperEvent>) {
        let dda = &mut self.motors[motor];
        let mode = self.motor_configs.get(motor).map(|c| c.power_mode).unwrap_or(PowerMode::OnInCycle);
        match mode {
            PowerMode::AlwaysOn => {}
            PowerMode::Disabled => {
                if dda.power_state != MotorPowerState::Disabled {
                    dda.power_state = MotorPowerState::Disabled;
                    events.push(StepperEvent::PowerChange { motor, enabled: false });
                }
            }
            PowerMode::OnInCycle | PowerMode::OnWhenMoving => {
                dda.idle_elapsed_ticks += 1;
                if dda.power_state == MotorPowerState::Active && dda.idle_elapsed_ticks >= self.idle_timeout_ticks {
                    dda.power_state = MotorPowerState::Idle;
                    events.push(StepperEvent::PowerChange { motor, enabled: false });
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_fills_current_then_next() {
        let mut pipeline = StepperPipeline::new(vec![MotorConfig::default(); MOTORS], 2.0);
        let seg = PreparedSegment { steps: [80, 0, 0, 0, 0, 0], duration_ticks: 1500 };
        assert!(pipeline.prepare(seg).is_ok());
        assert!(pipeline.prepare(seg).is_ok());
        assert!(pipeline.prepare(seg).is_err());
    }

    #[test]
    fn tick_emits_step_events_until_exhausted() {
        let mut pipeline = StepperPipeline::new(vec![MotorConfig::default(); MOTORS], 2.0);
        let seg = PreparedSegment { steps: [4, 0, 0, 0, 0, 0], duration_ticks: 4 };
        pipeline.prepare(seg).unwrap();
        let mut total_steps = 0;
        for _ in 0..10 {
            let events = pipeline.tick();
            total_steps += events.iter().filter(|e| matches!(e, StepperEvent::Step { motor: 0 })).count();
            if pipeline.is_idle() {
                break;
            }
        }
        assert_eq!(total_steps, 4);
    }
}
