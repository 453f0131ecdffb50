//! HTTP surface for the research job service.
//!
//! Stateless translation layer: every endpoint is a thin call into the
//! shared [`research_jobs::JobStore`] / [`research_jobs::JobRunner`]; no
//! business logic lives here.

mod http;
mod settings;

pub use http::{
    AppState, ErrorBody, MetricsResponse, ResultResponse, StatusResponse, SubmitRequest,
    SubmitResponse, router, run_http, validate_input_key,
};
pub use settings::{GatewaySettings, SettingsFile, SettingsOverrides, load_settings_file};
