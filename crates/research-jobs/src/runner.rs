//! Deadline-bounded background execution of the research pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::store::JobStore;
use crate::types::{Transition, truncate_diagnostic};

/// Ceiling for error text copied into a job record.
const ERROR_MAX_CHARS: usize = 2_000;

/// The work function: one long-running research computation per input key.
///
/// Implementations must abandon their underlying work when the returned
/// future is dropped: the runner drops it on deadline, and a dropped
/// future must not leave a live process or thread behind.
/// [`crate::CommandPipeline`] is the production implementation; tests
/// substitute doubles.
#[async_trait]
pub trait ResearchPipeline: Send + Sync {
    /// Run the pipeline for `input_key` and return the report text.
    async fn run(&self, input_key: &str, job_id: &str) -> Result<String>;
}

/// Executes one job per spawned task and commits exactly one terminal
/// transition through the store. Holds only the job id during execution;
/// the store keeps the canonical record.
pub struct JobRunner {
    store: Arc<JobStore>,
    pipeline: Arc<dyn ResearchPipeline>,
    deadline: Duration,
}

impl JobRunner {
    /// Build a runner over the shared store and pipeline.
    #[must_use]
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Arc<dyn ResearchPipeline>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            deadline,
        }
    }

    /// Hard wall-clock budget applied to every job.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Start executing a freshly created job and return immediately.
    ///
    /// The spawned task moves the job Pending → Running, runs the pipeline
    /// under the deadline, and commits Complete or Error. A job that is
    /// missing or not Pending at this point is a programming error: it is
    /// logged and the task exits without touching the record.
    pub fn launch(&self, job_id: String, input_key: String) {
        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let deadline = self.deadline;

        tokio::spawn(async move {
            if let Err(error) = store.transition_to(&job_id, Transition::Running).await {
                tracing::error!(job_id = %job_id, %error, "job not pending at launch; dropping execution");
                return;
            }
            tracing::info!(job_id = %job_id, input_key = %input_key, "research job started");

            let run = tokio::time::timeout(deadline, pipeline.run(&input_key, &job_id)).await;
            let transition = match run {
                Ok(Ok(report)) => {
                    tracing::info!(job_id = %job_id, "research job complete");
                    Transition::Complete { result: report }
                }
                Ok(Err(error)) => {
                    tracing::warn!(job_id = %job_id, %error, "research job failed");
                    Transition::Error {
                        message: truncate_diagnostic(&error.to_string(), ERROR_MAX_CHARS),
                    }
                }
                // Dropping the timed-out future reclaims the pipeline's
                // process; see the ResearchPipeline contract.
                Err(_) => {
                    let secs = deadline.as_secs();
                    tracing::warn!(job_id = %job_id, "research job timed out after {secs}s");
                    Transition::Error {
                        message: format!("timeout after {secs}s"),
                    }
                }
            };

            if let Err(error) = store.transition_to(&job_id, transition).await {
                tracing::error!(job_id = %job_id, %error, "terminal transition rejected; record keeps its last valid state");
            }
        });
    }
}
