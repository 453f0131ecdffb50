//! research-gateway CLI: serve the job API or run the pipeline once.
//!
//! Logging: set `RUST_LOG=research_gateway=info` (or `warn`, `debug`) to see
//! gateway and runner logs on stderr.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use research_gateway::{
    AppState, GatewaySettings, SettingsOverrides, load_settings_file, run_http,
};
use research_jobs::{
    CommandPipeline, CommandPipelineConfig, JobRunner, JobStore, JobStoreConfig, ResearchPipeline,
    spawn_heartbeat,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("research_gateway=info,research_jobs=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let file = load_settings_file(cli.settings.as_deref());

    match cli.command {
        Command::Serve {
            bind,
            deadline_secs,
            max_in_flight,
            retain_terminal,
            interpreter,
            script,
            artifact_root,
        } => {
            let settings = GatewaySettings::resolve(
                file,
                SettingsOverrides {
                    bind,
                    deadline_secs,
                    max_in_flight,
                    retain_terminal,
                    interpreter,
                    script,
                    artifact_root,
                },
            );
            serve(settings).await
        }
        Command::Run {
            input_key,
            deadline_secs,
            interpreter,
            script,
            artifact_root,
        } => {
            let settings = GatewaySettings::resolve(
                file,
                SettingsOverrides {
                    deadline_secs,
                    interpreter,
                    script,
                    artifact_root,
                    ..SettingsOverrides::default()
                },
            );
            run_once(&settings, &input_key).await
        }
    }
}

async fn serve(settings: GatewaySettings) -> anyhow::Result<()> {
    let store = Arc::new(JobStore::new(JobStoreConfig {
        max_in_flight: settings.max_in_flight,
        retain_terminal: settings.retain_terminal,
        max_pending_age_secs: settings.max_pending_age_secs,
        max_running_age_secs: settings.max_running_age_secs,
    }));
    let pipeline: Arc<dyn ResearchPipeline> = Arc::new(CommandPipeline::new(pipeline_config(&settings)));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&store),
        pipeline,
        Duration::from_secs(settings.deadline_secs),
    ));

    spawn_heartbeat(
        Arc::clone(&store),
        Duration::from_secs(settings.heartbeat_interval_secs),
    );

    run_http(AppState { store, runner }, &settings.bind).await
}

/// One-shot mode: run the pipeline inline under the same deadline the
/// service would apply, print the report to stdout.
async fn run_once(settings: &GatewaySettings, input_key: &str) -> anyhow::Result<()> {
    let pipeline = CommandPipeline::new(pipeline_config(settings));
    let job_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(input_key = %input_key, job_id = %job_id, "running pipeline once");

    let report = tokio::time::timeout(
        Duration::from_secs(settings.deadline_secs),
        pipeline.run(input_key, &job_id),
    )
    .await
    .map_err(|_| anyhow::anyhow!("timeout after {}s", settings.deadline_secs))?
    .context("research pipeline failed")?;

    println!("{report}");
    Ok(())
}

fn pipeline_config(settings: &GatewaySettings) -> CommandPipelineConfig {
    CommandPipelineConfig {
        interpreter: settings.interpreter.clone(),
        script: settings.script.clone(),
        artifact_root: settings.artifact_root.clone(),
        deadline_secs: settings.deadline_secs,
    }
}
