//! Error types for availability-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A block was requested with `end <= start` (after minute truncation),
    /// a missing endpoint, or a visitor limit below 1.
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// A time-of-day or date-time phrase did not parse, or a recurring
    /// pattern's start time does not precede its end time.
    #[error("Input format error: {0}")]
    InputFormat(String),

    /// A visible schedule was requested for a window ending before it starts.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid meeting durations: {0}")]
    InvalidDurations(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
