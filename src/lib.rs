//! `g2motion`: a jerk-limited motion-control core for multi-axis CNC/3D
//! printer firmware — canonical machine, planner queue, backward and
//! forward planners, segment executor, stepper pipeline, and feedhold
//! sequencer, orchestrated by an async `Scheduler`.

pub mod canonical;
pub mod config;
pub mod constants;
pub mod error;
pub mod exec;
pub mod feedhold;
pub mod hardware;
pub mod planner;
pub mod scheduler;
