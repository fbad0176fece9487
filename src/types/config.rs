//! Configuration structures.
//!
//! Configuration is built from defaults, optionally parsed from a JSON
//! document, and the log format can be overridden from the environment.

use serde::{Deserialize, Serialize};

use crate::native::StatusMask;
use crate::types::Result;

/// Global registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Enumeration behaviour.
    #[serde(default)]
    pub enumeration: EnumerationConfig,

    /// Event monitor configuration.
    #[serde(default)]
    pub events: EventConfig,
}

impl Config {
    /// Parse a JSON configuration document. Missing sections take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Enumeration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Stop native traversal once this many records were collected.
    /// `None` walks every record.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Event monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Statuses watched by the enable/disable monitor.
    pub status_mask: StatusMask,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            status_mask: StatusMask::ENABLE_AND_DISABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert!(config.enumeration.max_results.is_none());
        assert_eq!(config.events.status_mask, StatusMask::ENABLE_AND_DISABLE);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(r#"{"enumeration": {"max_results": 5}}"#).unwrap();
        assert_eq!(config.enumeration.max_results, Some(5));
        assert!(!config.observability.json_logs);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = Config::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, crate::types::Error::Serialization(_)));
    }
}
