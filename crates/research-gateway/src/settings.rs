//! Gateway settings: YAML file merged under CLI flags, defaults last.
//!
//! Precedence is flag over file over default. A missing or malformed file
//! is logged and ignored rather than fatal.

use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
/// Hard wall-clock budget per job: 30 minutes, the time a full research
/// run is allowed to take.
const DEFAULT_DEADLINE_SECS: u64 = 1_800;
const DEFAULT_MAX_IN_FLIGHT: usize = 32;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_PENDING_AGE_SECS: u64 = 120;
const DEFAULT_INTERPRETER: &str = "python3";
const DEFAULT_SCRIPT: &str = "research/main.py";
const DEFAULT_ARTIFACT_ROOT: &str = "research-artifacts";

/// Optional values as they appear in the YAML settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    /// Listen address.
    pub bind: Option<String>,
    /// Per-job deadline in seconds.
    pub deadline_secs: Option<u64>,
    /// Max non-terminal jobs before submissions are rejected.
    pub max_in_flight: Option<usize>,
    /// Keep at most this many finished jobs in memory.
    pub retain_terminal: Option<usize>,
    /// Heartbeat tick interval in seconds.
    pub heartbeat_interval_secs: Option<u64>,
    /// Pending age threshold for the stall warning.
    pub max_pending_age_secs: Option<u64>,
    /// Running age threshold for the stall warning.
    pub max_running_age_secs: Option<u64>,
    /// Pipeline invocation section.
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Pipeline invocation values in the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSection {
    /// Interpreter binary.
    pub interpreter: Option<PathBuf>,
    /// Pipeline entrypoint script.
    pub script: Option<PathBuf>,
    /// Root directory for per-job artifacts.
    pub artifact_root: Option<PathBuf>,
}

/// CLI-provided overrides; every field beats the settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Listen address.
    pub bind: Option<String>,
    /// Per-job deadline in seconds.
    pub deadline_secs: Option<u64>,
    /// Max non-terminal jobs.
    pub max_in_flight: Option<usize>,
    /// Terminal retention cap.
    pub retain_terminal: Option<usize>,
    /// Interpreter binary.
    pub interpreter: Option<PathBuf>,
    /// Pipeline entrypoint script.
    pub script: Option<PathBuf>,
    /// Root directory for per-job artifacts.
    pub artifact_root: Option<PathBuf>,
}

/// Fully resolved configuration the service runs with.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Listen address.
    pub bind: String,
    /// Per-job deadline in seconds.
    pub deadline_secs: u64,
    /// Max non-terminal jobs before submissions are rejected.
    pub max_in_flight: usize,
    /// Keep at most this many finished jobs; `None` keeps everything.
    pub retain_terminal: Option<usize>,
    /// Heartbeat tick interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Pending age threshold for the stall warning.
    pub max_pending_age_secs: u64,
    /// Running age threshold for the stall warning.
    pub max_running_age_secs: u64,
    /// Interpreter binary.
    pub interpreter: PathBuf,
    /// Pipeline entrypoint script.
    pub script: PathBuf,
    /// Root directory for per-job artifacts.
    pub artifact_root: PathBuf,
}

impl GatewaySettings {
    /// Resolve flags over file values over defaults.
    #[must_use]
    pub fn resolve(file: SettingsFile, overrides: SettingsOverrides) -> Self {
        let deadline_secs = overrides
            .deadline_secs
            .or(file.deadline_secs)
            .unwrap_or(DEFAULT_DEADLINE_SECS)
            .max(1);
        Self {
            bind: overrides
                .bind
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            deadline_secs,
            max_in_flight: overrides
                .max_in_flight
                .or(file.max_in_flight)
                .unwrap_or(DEFAULT_MAX_IN_FLIGHT)
                .max(1),
            retain_terminal: overrides.retain_terminal.or(file.retain_terminal),
            heartbeat_interval_secs: file
                .heartbeat_interval_secs
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS)
                .max(1),
            max_pending_age_secs: file
                .max_pending_age_secs
                .unwrap_or(DEFAULT_MAX_PENDING_AGE_SECS),
            // A job running longer than its deadline means the runner is
            // stuck, so the deadline is the natural stall threshold.
            max_running_age_secs: file.max_running_age_secs.unwrap_or(deadline_secs),
            interpreter: overrides
                .interpreter
                .or(file.pipeline.interpreter)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER)),
            script: overrides
                .script
                .or(file.pipeline.script)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT)),
            artifact_root: overrides
                .artifact_root
                .or(file.pipeline.artifact_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_ROOT)),
        }
    }
}

/// Load the settings file; a missing path or parse failure yields defaults.
#[must_use]
pub fn load_settings_file(path: Option<&Path>) -> SettingsFile {
    let Some(path) = path else {
        return SettingsFile::default();
    };
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; using defaults"
            );
            return SettingsFile::default();
        }
    };
    match serde_yaml::from_str::<SettingsFile>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            SettingsFile::default()
        }
    }
}
