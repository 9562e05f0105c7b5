use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Distinguishes runtime behavior for different stages of the ledger tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub divergence: DivergenceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = DivergenceConfig::default();
        let divergence = DivergenceConfig {
            min_confidence: confidence_var("BONUS_MIN_CONFIDENCE", defaults.min_confidence)?,
            auto_apply_confidence: confidence_var(
                "BONUS_AUTO_APPLY_CONFIDENCE",
                defaults.auto_apply_confidence,
            )?,
            outlier_limit: amount_var("BONUS_OUTLIER_LIMIT", defaults.outlier_limit)?,
            amount_tolerance: amount_var("BONUS_AMOUNT_TOLERANCE", defaults.amount_tolerance)?,
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            divergence,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Thresholds driving divergence detection and correction planning.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceConfig {
    /// Divergences scored below this confidence are dropped from detection output.
    pub min_confidence: f32,
    /// Minimum confidence for a trade marketing correction to be applied without review.
    pub auto_apply_confidence: f32,
    /// Amounts above this value are reported as outliers.
    pub outlier_limit: Decimal,
    /// Largest department/view difference still considered equal.
    pub amount_tolerance: Decimal,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            auto_apply_confidence: 0.95,
            outlier_limit: Decimal::from(100_000),
            amount_tolerance: Decimal::new(1, 2),
        }
    }
}

fn confidence_var(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };

    parse_confidence(&raw).ok_or(ConfigError::InvalidConfidence { name, value: raw })
}

/// Parses a confidence score, accepting only values in `[0, 1]`.
pub fn parse_confidence(raw: &str) -> Option<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| (0.0..=1.0).contains(value))
}

fn amount_var(name: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };

    match Decimal::from_str(raw.trim()) {
        Ok(value) if !value.is_sign_negative() => Ok(value),
        _ => Err(ConfigError::InvalidAmount { name, value: raw }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidConfidence { name: &'static str, value: String },
    InvalidAmount { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidConfidence { name, value } => {
                write!(f, "{name} must be a number between 0 and 1 (got '{value}')")
            }
            ConfigError::InvalidAmount { name, value } => {
                write!(f, "{name} must be a non-negative decimal (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
