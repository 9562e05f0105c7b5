use std::io::IsTerminal;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("APP_LOG_LEVEL '{value}' is not a valid tracing filter")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("could not install subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr so classified CSV written to stdout stays machine readable.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| ledger_filter(&config.log_level))?;
    let stderr = std::io::stderr();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(stderr.is_terminal())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}

/// A bare level (`debug`) applies to the ledger crate only; dependencies stay at `warn`.
/// Full directives are taken as written.
fn ledger_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let level = level.trim();
    let directives = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,bonus_ledger={level}")
    };

    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
        value: level.to_string(),
        source,
    })
}
