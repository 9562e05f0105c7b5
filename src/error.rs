use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::bonus::{ImportError, LedgerServiceError};
use crate::workflows::divergence::ReportError;

/// Failures surfaced by the command line entry point.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("import error: {0}")]
    Import(#[from] ImportError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerServiceError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("output error: {0}")]
    Output(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
