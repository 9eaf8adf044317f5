//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LapseError, LapseResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Settings for the native asset fetcher.
    #[serde(default)]
    pub http: HttpConfig,

    /// Where to send callers when local synthesis is unavailable.
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "lapse_synth_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// HTTP client settings used when fetching frames and music.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

/// External server-side transcoder used when this platform cannot
/// synthesize video locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Endpoint that accepts ordered frame URLs and a target duration.
    pub endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("lapse/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "Using default config");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> LapseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| LapseError::config(format!("{}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("lapse").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"fallback":{"endpoint":"https://transcode.example/v1"}}"#)
                .unwrap();
        assert_eq!(
            config.fallback.endpoint.as_deref(),
            Some("https://transcode.example/v1")
        );
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.user_agent.starts_with("lapse/"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let path = std::env::temp_dir().join(format!("lapse-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, LapseError::Config { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
