//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: where the dashboard listens.
//!     - DataConfig: which dataset to load and whether to load it at startup.
//!     - TableConfig: default page size and the filter debounce window.
//!     - LoggingConfig: default tracing filter.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::table::PAGE_SIZE_OPTIONS;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,
    /// load at startup and refuse to start on a bad dataset
    pub preload: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TableConfig {
    pub default_page_size: usize,
    pub filter_debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".to_string(), port: 3000 }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data").join("sensor_readings.json"), preload: true }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { default_page_size: PAGE_SIZE_OPTIONS[0], filter_debounce_ms: 500 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.bind, self.port))
    }
}

impl TableConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !PAGE_SIZE_OPTIONS.contains(&self.table.default_page_size) {
            return Err(anyhow!(
                "table.default_page_size must be one of {:?}, got {}",
                PAGE_SIZE_OPTIONS,
                self.table.default_page_size
            ));
        }
        self.server.addr()?;
        Ok(())
    }

    /// Load with default fallback.
    ///
    /// an explicit path must load; the search paths fall back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)
                .with_context(|| format!("config {}", path.display()))?;
            tracing::info!("[CONFIG] Loaded from {}", path.display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("[CONFIG] No config file found - using defaults");
        Ok(Self::default())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            listen = %format!("{}:{}", self.server.bind, self.server.port),
            dataset = %self.data.path.display(),
            preload = self.data.preload,
            page_size = self.table.default_page_size,
            debounce_ms = self.table.filter_debounce_ms,
            log_level = %self.logging.level,
            "host configuration"
        );
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.table.default_page_size, 10);
        assert_eq!(config.table.debounce(), Duration::from_millis(500));
        assert!(config.data.preload);
        assert_eq!(config.server.addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_partial_file() {
        let config = HostConfig::parse(
            r#"
            [server]
            port = 8080

            [table]
            default_page_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.table.default_page_size, 25);
        assert_eq!(config.table.filter_debounce_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config = HostConfig::parse("").unwrap();
        assert_eq!(config.data.path, PathBuf::from("data").join("sensor_readings.json"));
    }

    #[test]
    fn test_rejects_unsupported_page_size() {
        let err = HostConfig::parse("[table]\ndefault_page_size = 15\n").unwrap_err();
        assert!(err.to_string().contains("default_page_size"));
    }

    #[test]
    fn test_rejects_bad_bind() {
        assert!(HostConfig::parse("[server]\nbind = \"not an ip\"\n").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(HostConfig::load_or_default(Some(Path::new("no/such/host.toml"))).is_err());
    }
}
