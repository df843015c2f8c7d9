//! Error types for the motion core.
//!
//! Follows the teacher's per-boundary `thiserror` enum convention (see
//! `hardware::HardwareError`): one enum per subsystem seam, synchronous
//! propagation for input-range problems, no panics outside assertion
//! failures that are meant to latch PANIC state.

use thiserror::Error;

/// Status codes surfaced to callers and in exception reports, matching the
/// gist of g2core's `stat_t` codes at the boundary spec.md §7 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    SoftLimitExceeded,
    FeedrateNotSpecified,
    InvalidCoordSystem,
    CommandArgOutOfRange,
    QueueFull,
    MachineAlarmed,
    MachineShutdown,
    MachinePanicked,
    PlannerCorruption,
    JerkOutOfRange,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusCode::SoftLimitExceeded => "soft limit exceeded",
            StatusCode::FeedrateNotSpecified => "feed rate not specified in inverse-time mode",
            StatusCode::InvalidCoordSystem => "invalid coordinate system index",
            StatusCode::CommandArgOutOfRange => "command argument out of range",
            StatusCode::QueueFull => "planner queue full",
            StatusCode::MachineAlarmed => "machine is in ALARM state",
            StatusCode::MachineShutdown => "machine is in SHUTDOWN state",
            StatusCode::MachinePanicked => "machine is in PANIC state",
            StatusCode::PlannerCorruption => "planner structural invariant violated",
            StatusCode::JerkOutOfRange => "jerk setting out of range",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}: target outside travel limits on axis {1}")]
    SoftLimitExceeded(StatusCode, usize),

    #[error("{0}")]
    FeedrateNotSpecified(StatusCode),

    #[error("{0}: index {1}")]
    InvalidCoordSystem(StatusCode, i32),

    #[error("{0}: {1}")]
    CommandArgOutOfRange(StatusCode, String),

    #[error("{0}")]
    QueueFull(StatusCode),

    #[error("action rejected, {0}")]
    Rejected(StatusCode),

    #[error("{0}: {1}")]
    PlannerCorruption(StatusCode, String),

    #[error("{status}: jerk must be within [{min}, {max}], got {value}")]
    JerkOutOfRange {
        status: StatusCode,
        min: f64,
        max: f64,
        value: f64,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

/// An exception report, emitted on every ALARM/SHUTDOWN/PANIC transition and
/// for rejected input, per spec.md §7 "User-visible behavior".
#[derive(Debug, Clone)]
pub struct ExceptionReport {
    pub status: StatusCode,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExceptionReport {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl std::fmt::Display for ExceptionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp.to_rfc3339(), self.status, self.message)
    }
}
