//! Segment executor and stepper pipeline, spec.md §4.5, §4.6.

pub mod runtime;
pub mod segment;
pub mod stepper;

pub use runtime::RuntimeState;
pub use segment::{SegmentExecutor, TickOutcome};
pub use stepper::StepperPipeline;
