//! Error types for job store and runner operations.

use thiserror::Error;

use crate::types::JobState;

/// Job-table errors surfaced to callers of the store and the HTTP layer.
///
/// Pipeline failures and timeouts are not errors here: they are recorded as
/// the job's terminal Error state and read back through snapshots.
#[derive(Debug, Error)]
pub enum JobError {
    /// Unknown job id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Result requested before the job completed.
    #[error("job is not complete (state: {state})")]
    NotReady {
        /// State the job was in when the result was requested.
        state: JobState,
    },

    /// Requested state change violates the lifecycle. Indicates a
    /// programming error or a lost race; the record keeps its last valid
    /// state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// State the record was in.
        from: JobState,
        /// State that was requested.
        to: JobState,
    },

    /// Too many non-terminal jobs in flight.
    #[error("too many jobs in flight (limit: {limit})")]
    Capacity {
        /// Configured in-flight bound.
        limit: usize,
    },
}
