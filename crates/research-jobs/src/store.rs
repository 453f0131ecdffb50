//! Concurrency-safe job table: the single source of truth for job state.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::JobError;
use crate::health::classify_job_health;
use crate::types::{JobMetrics, JobRecord, JobSnapshot, JobState, Transition, elapsed_secs_from};

/// Bounds and thresholds for the job table.
#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Maximum non-terminal (pending or running) jobs before submissions
    /// are rejected with [`JobError::Capacity`].
    pub max_in_flight: usize,
    /// Keep at most this many terminal records, evicting the oldest
    /// finished ones on submission. `None` keeps everything for the
    /// process lifetime.
    pub retain_terminal: Option<usize>,
    /// Pending age threshold for health classification.
    pub max_pending_age_secs: u64,
    /// Running age threshold for health classification.
    pub max_running_age_secs: u64,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 32,
            retain_terminal: None,
            max_pending_age_secs: 120,
            max_running_age_secs: 1800,
        }
    }
}

/// In-memory map of job id → record behind a single `RwLock`.
///
/// All mutation goes through [`JobStore::create`] and
/// [`JobStore::transition_to`]; the raw map is never exposed, so readers
/// only ever observe records between transitions, never mid-mutation.
pub struct JobStore {
    records: RwLock<HashMap<String, JobRecord>>,
    config: JobStoreConfig,
}

impl JobStore {
    /// Build an empty store with the given bounds.
    #[must_use]
    pub fn new(config: JobStoreConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Insert a new pending record and return its freshly allocated id.
    ///
    /// The record is visible to every reader before this returns, so a
    /// status poll issued right after submission can never miss the job.
    pub async fn create(&self, input_key: &str) -> Result<String, JobError> {
        let mut records = self.records.write().await;

        let in_flight = records
            .values()
            .filter(|record| !record.state.is_terminal())
            .count();
        if in_flight >= self.config.max_in_flight {
            return Err(JobError::Capacity {
                limit: self.config.max_in_flight,
            });
        }

        if let Some(cap) = self.config.retain_terminal {
            evict_oldest_terminal(&mut records, cap);
        }

        let job_id = Uuid::new_v4().to_string();
        records.insert(
            job_id.clone(),
            JobRecord {
                input_key: input_key.to_string(),
                state: JobState::Pending,
                result: None,
                error: None,
                submitted_at: Instant::now(),
                running_since: None,
                finished_at: None,
            },
        );
        Ok(job_id)
    }

    /// Return an immutable snapshot of one job.
    pub async fn get(&self, job_id: &str) -> Result<JobSnapshot, JobError> {
        let now = Instant::now();
        let records = self.records.read().await;
        let record = records
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        Ok(JobSnapshot {
            job_id: job_id.to_string(),
            input_key: record.input_key.clone(),
            state: record.state,
            elapsed_secs: elapsed_secs_from(now, record.submitted_at),
            running_age_secs: record.running_since.map(|t| elapsed_secs_from(now, t)),
            finished_age_secs: record.finished_at.map(|t| elapsed_secs_from(now, t)),
            result: record.result.clone(),
            error: record.error.clone(),
        })
    }

    /// Apply one state transition atomically. This is the sole
    /// linearization point for job mutation: per-id transitions are
    /// totally ordered by the write lock, and a terminal transition can
    /// commit at most once because the record is terminal afterwards.
    pub async fn transition_to(
        &self,
        job_id: &str,
        transition: Transition,
    ) -> Result<(), JobError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let to = transition.target_state();
        let allowed = matches!(
            (record.state, to),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Complete)
                | (JobState::Running, JobState::Error)
        );
        if !allowed {
            return Err(JobError::InvalidTransition {
                from: record.state,
                to,
            });
        }

        match transition {
            Transition::Running => {
                record.state = JobState::Running;
                record.running_since = Some(Instant::now());
            }
            Transition::Complete { result } => {
                record.state = JobState::Complete;
                record.result = Some(result);
                record.finished_at = Some(Instant::now());
            }
            Transition::Error { message } => {
                record.state = JobState::Error;
                record.error = Some(message);
                record.finished_at = Some(Instant::now());
            }
        }
        Ok(())
    }

    /// Aggregate counts and ages in one pass under the read lock.
    pub async fn metrics(&self) -> JobMetrics {
        let now = Instant::now();
        let records = self.records.read().await;

        let mut pending = 0usize;
        let mut running = 0usize;
        let mut complete = 0usize;
        let mut errored = 0usize;
        let mut oldest_pending = None::<u64>;
        let mut longest_running = None::<u64>;

        for record in records.values() {
            match record.state {
                JobState::Pending => {
                    pending += 1;
                    let age = elapsed_secs_from(now, record.submitted_at);
                    oldest_pending = Some(oldest_pending.map_or(age, |v| v.max(age)));
                }
                JobState::Running => {
                    running += 1;
                    if let Some(running_since) = record.running_since {
                        let age = elapsed_secs_from(now, running_since);
                        longest_running = Some(longest_running.map_or(age, |v| v.max(age)));
                    }
                }
                JobState::Complete => complete += 1,
                JobState::Error => errored += 1,
            }
        }

        let mut metrics = JobMetrics {
            total_jobs: records.len(),
            pending,
            running,
            complete,
            errored,
            oldest_pending_age_secs: oldest_pending,
            longest_running_age_secs: longest_running,
            health_state: crate::health::JobHealthState::Healthy,
        };
        metrics.health_state = classify_job_health(
            &metrics,
            self.config.max_pending_age_secs,
            self.config.max_running_age_secs,
        );
        metrics
    }
}

/// Drop the oldest finished records until at most `cap` remain. Non-terminal
/// records are never evicted.
fn evict_oldest_terminal(records: &mut HashMap<String, JobRecord>, cap: usize) {
    let mut terminal: Vec<(String, Instant)> = records
        .iter()
        .filter(|(_, record)| record.state.is_terminal())
        .map(|(id, record)| {
            (
                id.clone(),
                record.finished_at.unwrap_or(record.submitted_at),
            )
        })
        .collect();
    if terminal.len() <= cap {
        return;
    }
    terminal.sort_by_key(|(_, finished_at)| *finished_at);
    let excess = terminal.len() - cap;
    for (id, _) in terminal.into_iter().take(excess) {
        records.remove(&id);
    }
}
