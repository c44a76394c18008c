//! # mindscope-telemetry
//!
//! Logging setup shared by the mindscope binaries.
//!
//! [`init_telemetry`] installs a `tracing` subscriber with an `EnvFilter`
//! (`RUST_LOG` wins over the configured level) and either human-readable or
//! JSON output. [`memory::InMemoryTraceLayer`] optionally captures closed
//! spans per `request.id` so a request's trace can be inspected after the fact.

pub mod memory;

#[cfg(test)]
mod test_inmemory;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use memory::{InMemoryTraceLayer, SharedTraceStorage, SpanData};

/// Output format of the console logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `mindscope_rag=debug,info`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Unknown log format '{0}', expected 'text' or 'json'")]
    UnknownFormat(String),

    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

fn filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| TelemetryError::Filter(e.to_string())),
    }
}

/// Install the global subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    install(config, None)
}

/// Install the global subscriber and capture closed spans into `storage`.
pub fn init_with_storage(config: &TelemetryConfig, storage: Arc<SharedTraceStorage>) -> Result<(), TelemetryError> {
    install(config, Some(InMemoryTraceLayer::new(storage)))
}

fn install(config: &TelemetryConfig, capture: Option<InMemoryTraceLayer>) -> Result<(), TelemetryError> {
    let (json_layer, text_layer) = match config.format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json().with_current_span(true)), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer().with_target(true).with_file(false))),
    };

    tracing_subscriber::registry()
        .with(filter(config)?)
        .with(json_layer)
        .with(text_layer)
        .with(capture)
        .try_init()
        .map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "telemetry initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" text ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!(matches!("xml".parse::<LogFormat>(), Err(TelemetryError::UnknownFormat(f)) if f == "xml"));
    }

    #[test]
    fn config_deserialises_with_defaults() {
        let config: TelemetryConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config, TelemetryConfig { level: "info".to_string(), format: LogFormat::Json });
    }

    #[test]
    fn invalid_level_is_reported() {
        let config = TelemetryConfig { level: "mindscope=loud".to_string(), format: LogFormat::Text };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(filter(&config), Err(TelemetryError::Filter(_))));
        }
    }
}
