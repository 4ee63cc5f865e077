//! Workspace Protection Library
//!
//! This library decides, for each burst of file changes in a workspace, whether to
//! capture a recoverable snapshot, warn the user, or do nothing. It also executes
//! snapshot capture and restore against the real filesystem under memory, count and
//! size limits, with dependency-tracked operations and conflict-aware restore.

pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod services;

pub use config::SnapbackConfig;
pub use models::{
    DecisionReason, ErrorItem, FileChangeEvent, FileChangeType, FileContext, Operation,
    OperationStatus, PersistedSnapshot, ProtectionDecision, SaveContext, UserNotification,
};
pub use services::coordinator::{
    CaptureMode, OperationCoordinator, RestoreOptions, RestoreOutcome, SnapshotRequest,
};
pub use services::decision::{DecisionConfig, DecisionEngine};
pub use services::orchestrator::SnapshotOrchestrator;
pub use services::rate_limiter::RateLimiter;

use std::result;

/// Which hard limit stopped a workspace walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkLimit {
    FileCount,
    TotalBytes,
}

impl std::fmt::Display for WalkLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkLimit::FileCount => f.write_str("file count"),
            WalkLimit::TotalBytes => f.write_str("total size"),
        }
    }
}

/// Context validation failures, checked before a decision is made
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingRepoId,
    MissingSessionId,
    NonPositiveTimestamp(i64),
    AiConfidenceOutOfRange(f64),
    RiskScoreOutOfRange(f64),
    EmptyFilePath,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingRepoId => f.write_str("repo id is required"),
            ValidationError::MissingSessionId => f.write_str("session id is required"),
            ValidationError::NonPositiveTimestamp(ts) => {
                write!(f, "timestamp must be positive, got {ts}")
            }
            ValidationError::AiConfidenceOutOfRange(v) => {
                write!(f, "ai confidence must be within [0, 1], got {v}")
            }
            ValidationError::RiskScoreOutOfRange(v) => {
                write!(f, "risk score must be within [0, 100], got {v}")
            }
            ValidationError::EmptyFilePath => f.write_str("file path must not be empty"),
        }
    }
}

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    InvalidInput(String),
    Validation(ValidationError),
    LimitExceeded { limit: WalkLimit, max: u64 },
    StorageExceeded { required: u64, budget: u64 },
    /// Capture found no readable text file to keep
    EmptyCapture,
    NotFound(String),
    DependencyNotSatisfied { operation: String, pending: Vec<String> },
    Serialization(String),
    System(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::Validation(e) => write!(f, "Invalid context: {e}"),
            Error::LimitExceeded { limit, max } => {
                write!(f, "Workspace exceeds {limit} limit of {max}")
            }
            Error::StorageExceeded { required, budget } => write!(
                f,
                "Snapshot of {required} bytes exceeds storage budget of {budget} bytes"
            ),
            Error::EmptyCapture => f.write_str("No readable files to snapshot"),
            Error::NotFound(what) => write!(f, "Not found: {what}"),
            Error::DependencyNotSatisfied { operation, pending } => write!(
                f,
                "Operation {operation} is waiting on: {}",
                pending.join(", ")
            ),
            Error::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Error::System(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Current wall-clock time in epoch milliseconds
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
