//! Tracing subscriber setup for embedders and the fixture tool.
//!
//! Hook spans and guest `print`/`debug` output go through `tracing`; nothing is
//! emitted until a subscriber is installed here or by the embedding program.

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directives, e.g. `"info"` or `"hb_runtime=debug,hookbox::guest=info"`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Installs the global subscriber. Call once per process.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|error| LogError::InvalidFilter(error.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| LogError::AlreadyInitialized)
}

#[cfg(test)]
mod logging_tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn invalid_filters_are_rejected_before_install() {
        let error = init_logging(&LogConfig {
            format: LogFormat::Text,
            level: "hb_runtime=loudest".to_string(),
        })
        .expect_err("filter should be rejected");
        assert!(matches!(error, LogError::InvalidFilter(_)));
    }

    #[test]
    fn second_install_reports_already_initialized() {
        let config = LogConfig {
            format: LogFormat::Json,
            level: "warn".to_string(),
        };
        let _ = init_logging(&config);
        let error = init_logging(&config).expect_err("second install should fail");
        assert!(matches!(error, LogError::AlreadyInitialized));
    }
}
