//! Shared types and helpers for job tracking.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::health::JobHealthState;

/// Lifecycle state of one job.
///
/// Allowed transitions: Pending → Running → Complete | Error. Everything
/// else is rejected by [`crate::JobStore::transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, runner not started yet.
    Pending,
    /// Pipeline executing on a background task.
    Running,
    /// Finished with a report (terminal).
    Complete,
    /// Finished with a failure or timeout (terminal).
    Error,
}

impl JobState {
    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Error => "error",
        };
        f.write_str(name)
    }
}

/// A requested state change, carrying the terminal payload where one exists.
///
/// A result can only be committed together with `Complete`, an error
/// message only together with `Error`.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Pending → Running.
    Running,
    /// Running → Complete with the final report text.
    Complete {
        /// Report produced by the pipeline.
        result: String,
    },
    /// Running → Error with a human-readable message.
    Error {
        /// Failure or timeout description.
        message: String,
    },
}

impl Transition {
    /// State this transition lands in.
    #[must_use]
    pub fn target_state(&self) -> JobState {
        match self {
            Transition::Running => JobState::Running,
            Transition::Complete { .. } => JobState::Complete,
            Transition::Error { .. } => JobState::Error,
        }
    }
}

/// Canonical record owned exclusively by the store. The job id is the map
/// key; everything else lives here.
#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub(crate) input_key: String,
    pub(crate) state: JobState,
    pub(crate) result: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) submitted_at: Instant,
    pub(crate) running_since: Option<Instant>,
    pub(crate) finished_at: Option<Instant>,
}

/// Immutable copy of one record for status queries. Never reflects a
/// mid-mutation view; ages are computed at snapshot time.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    /// External job handle.
    pub job_id: String,
    /// Caller-supplied work identifier.
    pub input_key: String,
    /// State at snapshot time.
    pub state: JobState,
    /// Seconds since submission, for any state.
    pub elapsed_secs: u64,
    /// Seconds since the runner picked the job up, if it has.
    pub running_age_secs: Option<u64>,
    /// Seconds since the terminal transition, if finished.
    pub finished_age_secs: Option<u64>,
    /// Report text; set iff state is Complete.
    pub result: Option<String>,
    /// Failure description; set iff state is Error.
    pub error: Option<String>,
}

/// Aggregate counts and ages over the whole job table.
#[derive(Debug, Clone)]
pub struct JobMetrics {
    /// Total records currently tracked in memory.
    pub total_jobs: usize,
    /// Count by state.
    pub pending: usize,
    /// Count by state.
    pub running: usize,
    /// Count by state.
    pub complete: usize,
    /// Count by state.
    pub errored: usize,
    /// Age of the oldest pending job.
    pub oldest_pending_age_secs: Option<u64>,
    /// Age of the longest-running job.
    pub longest_running_age_secs: Option<u64>,
    /// Classified health from age thresholds.
    pub health_state: JobHealthState,
}

pub(crate) fn elapsed_secs_from(now: Instant, start: Instant) -> u64 {
    now.checked_duration_since(start)
        .map_or(0, |duration| duration.as_secs())
}

/// Bound a diagnostic so one noisy pipeline cannot bloat the job table.
pub(crate) fn truncate_diagnostic(text: &str, max_chars: usize) -> String {
    let mut iter = text.chars();
    let truncated: String = iter.by_ref().take(max_chars).collect();
    if iter.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}
