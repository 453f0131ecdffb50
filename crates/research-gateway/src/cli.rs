use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "research-gateway")]
#[command(about = "Asynchronous research jobs over HTTP: submit an input key, poll status, fetch the report.")]
pub(crate) struct Cli {
    /// Path to a YAML settings file (flags override file values).
    #[arg(long, global = true)]
    pub(crate) settings: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP service. Default bind: 0.0.0.0:8080
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,

        /// Hard wall-clock budget per job in seconds (default: 1800)
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Max jobs in flight before submissions are rejected (default: 32)
        #[arg(long)]
        max_in_flight: Option<usize>,

        /// Keep at most this many finished jobs in memory (default: keep all)
        #[arg(long)]
        retain_terminal: Option<usize>,

        /// Interpreter for the research pipeline (default: python3)
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Research pipeline entrypoint script
        #[arg(long)]
        script: Option<PathBuf>,

        /// Root directory for per-job output artifacts
        #[arg(long)]
        artifact_root: Option<PathBuf>,
    },
    /// Run the pipeline once for one input key, print the report, exit.
    Run {
        /// Work identifier, e.g. a molecule name.
        input_key: String,

        /// Hard wall-clock budget in seconds (default: 1800)
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Interpreter for the research pipeline (default: python3)
        #[arg(long)]
        interpreter: Option<PathBuf>,

        /// Research pipeline entrypoint script
        #[arg(long)]
        script: Option<PathBuf>,

        /// Root directory for per-job output artifacts
        #[arg(long)]
        artifact_root: Option<PathBuf>,
    },
}
