//! Structured logging setup.
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: `json` (default) or `text` / `pretty`
//! - `RUST_LOG`: Log level filter (default: `info`)
//! - `SERVICE_NAME`: Service name attached to the root span
//!
//! # Example
//!
//! ```no_run
//! use modgate_service_shared::logging::{LoggingConfig, init_logging};
//!
//! let config = LoggingConfig::from_env().with_service("modgate");
//! init_logging(&config).expect("logging already initialized");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for production.
    #[default]
    Json,
    /// Human-readable multi-line output, for development.
    Text,
}

impl LogFormat {
    /// Parse a format name. Unknown names fall back to JSON.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info").
    pub level: String,
    pub service: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            service: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let format = std::env::var("LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let service = std::env::var("SERVICE_NAME").ok();

        Self {
            format,
            level,
            service,
        }
    }

    /// Use `service` unless `SERVICE_NAME` already set one.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service.get_or_insert_with(|| service.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global subscriber.
///
/// JSON output includes the current span, so pipeline fields
/// (`request_id`, `operation`, `route`, ...) appear on every line logged
/// inside a call.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggingError::Filter(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)?;

    if let Some(service) = &config.service {
        tracing::info!(service = %service, format = ?config.format, "logging initialized");
    }
    Ok(())
}
