//! Process-backed research pipeline: one interpreter invocation per job.
//!
//! The pipeline script receives the input key as its first argument and via
//! `RESEARCH_INPUT_KEY`, and is expected to write its report to the path in
//! `RESEARCH_OUTPUT_FILE`. Each job gets its own working directory keyed by
//! job id, so concurrent jobs cannot clobber each other's artifacts.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;

use crate::runner::ResearchPipeline;
use crate::types::truncate_diagnostic;

/// File the pipeline script writes its report to, inside the per-job dir.
const ARTIFACT_FILE_NAME: &str = "output.txt";
/// Ceiling for captured stderr/stdout copied into failure messages.
const DIAGNOSTIC_MAX_CHARS: usize = 2_000;

/// Where and how to invoke the research pipeline.
#[derive(Debug, Clone)]
pub struct CommandPipelineConfig {
    /// Interpreter binary, e.g. `python3`.
    pub interpreter: PathBuf,
    /// Pipeline entrypoint script.
    pub script: PathBuf,
    /// Per-job working directories are created under this root.
    pub artifact_root: PathBuf,
    /// Wall-clock budget advertised to the script via
    /// `RESEARCH_DEADLINE_SECS`. Enforcement stays with the runner; this
    /// lets a well-behaved script wind down on its own.
    pub deadline_secs: u64,
}

/// [`ResearchPipeline`] backed by a child process.
///
/// Cancellation safety: the child is spawned with kill-on-drop, so when the
/// runner's deadline drops the `run` future the process is reclaimed rather
/// than leaked.
pub struct CommandPipeline {
    config: CommandPipelineConfig,
}

impl CommandPipeline {
    /// Build a pipeline from its invocation config.
    #[must_use]
    pub fn new(config: CommandPipelineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ResearchPipeline for CommandPipeline {
    async fn run(&self, input_key: &str, job_id: &str) -> Result<String> {
        let job_dir = self.config.artifact_root.join(job_id);
        tokio::fs::create_dir_all(&job_dir)
            .await
            .with_context(|| format!("failed to create job directory {}", job_dir.display()))?;
        let artifact = job_dir.join(ARTIFACT_FILE_NAME);

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(&self.config.script)
            .arg(input_key)
            .env("RESEARCH_INPUT_KEY", input_key)
            .env("RESEARCH_OUTPUT_FILE", &artifact)
            .env("RESEARCH_DEADLINE_SECS", self.config.deadline_secs.to_string())
            .current_dir(&job_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await.with_context(|| {
            format!(
                "failed to launch research pipeline {}",
                self.config.script.display()
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            bail!(
                "research pipeline exited with {}: {}",
                output.status,
                truncate_diagnostic(&diagnostic, DIAGNOSTIC_MAX_CHARS)
            );
        }

        // A successful run without the artifact is still a success; the
        // report then comes from stdout.
        match tokio::fs::read_to_string(&artifact).await {
            Ok(report) => Ok(report),
            Err(_) => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if stdout.is_empty() {
                    Ok("research completed but produced no output artifact".to_string())
                } else {
                    Ok(stdout)
                }
            }
        }
    }
}
