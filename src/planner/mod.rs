//! Planner queue, backward planner, forward planner ("zoid"), and arc
//! generator — spec.md §4.2, §4.3, §4.4, §4.9.

pub mod arc;
pub mod backward;
pub mod block;
pub mod junction;
pub mod queue;
pub mod zoid;

pub use block::{Block, BlockRunState, BlockType, BufferState, CommandPayload, Hint};
pub use queue::PlannerQueue;

use crate::constants::{PLANNER_QUEUE_SIZE, SECONDARY_QUEUE_SIZE};

pub type PrimaryQueue = PlannerQueue<PLANNER_QUEUE_SIZE>;
pub type SecondaryQueue = PlannerQueue<SECONDARY_QUEUE_SIZE>;
