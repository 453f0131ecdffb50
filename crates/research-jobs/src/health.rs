//! Job-table health classification and the heartbeat log loop.

use std::sync::Arc;
use std::time::Duration;

use crate::store::JobStore;
use crate::types::JobMetrics;

/// Health of the job table derived from age thresholds (used by heartbeat
/// logs and the metrics endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobHealthState {
    /// Pending/running jobs are within configured age bounds.
    Healthy,
    /// Old pending job indicates the runner is not picking work up.
    PendingStalled,
    /// Long-running job indicates execution is stuck past its deadline.
    RunningStalled,
}

/// Classify job health from age thresholds.
#[must_use]
pub fn classify_job_health(
    metrics: &JobMetrics,
    max_pending_age_secs: u64,
    max_running_age_secs: u64,
) -> JobHealthState {
    if metrics.oldest_pending_age_secs.unwrap_or(0) > max_pending_age_secs {
        return JobHealthState::PendingStalled;
    }
    if metrics.longest_running_age_secs.unwrap_or(0) > max_running_age_secs {
        return JobHealthState::RunningStalled;
    }
    JobHealthState::Healthy
}

/// Spawn a background loop that samples store metrics every `interval` and
/// logs the classified health. Runs for the life of the process.
pub fn spawn_heartbeat(store: Arc<JobStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let metrics = store.metrics().await;
            match metrics.health_state {
                JobHealthState::Healthy => {
                    tracing::trace!(
                        "job table healthy: pending={}, running={}, complete={}, errored={}",
                        metrics.pending,
                        metrics.running,
                        metrics.complete,
                        metrics.errored
                    );
                }
                JobHealthState::PendingStalled => {
                    tracing::warn!(
                        "pending jobs stalled: oldest_pending_age={}s",
                        metrics.oldest_pending_age_secs.unwrap_or_default()
                    );
                }
                JobHealthState::RunningStalled => {
                    tracing::warn!(
                        "running job stalled: longest_running_age={}s",
                        metrics.longest_running_age_secs.unwrap_or_default()
                    );
                }
            }
        }
    });
}
