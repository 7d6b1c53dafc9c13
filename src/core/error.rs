//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::task::TaskId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A routine raised an unhandled error during a step.
    #[error("task {id} faulted: {source}")]
    TaskFault {
        /// Id of the task whose step failed.
        id: TaskId,
        /// The underlying routine error.
        #[source]
        source: anyhow::Error,
    },
    /// A scheduler operation was requested from a routine that is not bound.
    #[error("routine is not bound to the event loop")]
    NotBound,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
