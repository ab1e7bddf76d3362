//! Server configuration.
//!
//! A key-value `cinder.toml` file with every field defaulted, so an
//! empty (or missing) file yields a working server. CLI flags override
//! file values. Durations are human-readable strings ("5m", "90s").

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// "debug" or "release"; controls default log verbosity.
    pub mode: String,
    /// Listen address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
    /// Number of databases.
    pub databases: usize,
    /// Maximum simultaneous client connections; 0 = unlimited.
    pub max_clients: usize,
    /// Append-only journaling is not implemented; the fields are
    /// accepted for config compatibility and surfaced by CONFIG GET.
    pub append_only: bool,
    pub append_filename: String,
    /// Password clients must AUTH with; empty = no auth.
    pub require_pass: String,
    /// Log filter, e.g. "info" or "cinder=debug".
    pub log_level: String,
    /// Log file directory; empty = stderr only.
    pub log_path: String,
    pub rdb: RdbConfig,
    pub slowlog: SlowLogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: "debug".into(),
            bind: "127.0.0.1".into(),
            port: 6379,
            databases: 16,
            max_clients: 0,
            append_only: false,
            append_filename: String::new(),
            require_pass: String::new(),
            log_level: "info".into(),
            log_path: "log".into(),
            rdb: RdbConfig::default(),
            slowlog: SlowLogConfig::default(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbConfig {
    pub filename: String,
    /// Interval between scheduled saves, e.g. "5m".
    pub save_interval: String,
    /// gzip level, 0-9.
    pub compression_level: u32,
    /// Save once this many writes accumulate; 0 disables.
    pub auto_save_changes: u64,
}

impl Default for RdbConfig {
    fn default() -> Self {
        Self {
            filename: "dump.rdb".into(),
            save_interval: "5m".into(),
            compression_level: 6,
            auto_save_changes: 1000,
        }
    }
}

/// Slow command log settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowLogConfig {
    /// Commands slower than this many microseconds are logged.
    pub slower_than_us: u64,
    /// Ring buffer capacity.
    pub max_len: usize,
}

impl Default for SlowLogConfig {
    fn default() -> Self {
        Self {
            slower_than_us: 10_000,
            max_len: 128,
        }
    }
}

impl Config {
    /// Loads configuration from a toml file. A missing file yields
    /// the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.databases == 0 {
            return Err(ConfigError::Invalid("databases must be at least 1".into()));
        }
        if self.rdb.compression_level > 9 {
            return Err(ConfigError::Invalid(
                "rdb.compression_level must be 0-9".into(),
            ));
        }
        parse_duration(&self.rdb.save_interval)
            .map_err(|e| ConfigError::Invalid(format!("rdb.save_interval: {e}")))?;
        Ok(())
    }

    /// The parsed scheduled-save interval.
    pub fn save_interval(&self) -> Duration {
        parse_duration(&self.rdb.save_interval).unwrap_or(Duration::from_secs(300))
    }
}

/// Parses a duration string: a number with an optional `s`, `m`, or
/// `h` suffix. A bare number means seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }

    let (number, multiplier) = if let Some(n) = input.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = input.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = input.strip_suffix('s') {
        (n, 1)
    } else {
        (input, 1)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;
    Ok(Duration::from_secs(value * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.mode, "debug");
        assert_eq!(config.port, 6379);
        assert_eq!(config.databases, 16);
        assert!(!config.append_only);
        assert_eq!(config.rdb.filename, "dump.rdb");
        assert_eq!(config.save_interval(), Duration::from_secs(300));
        assert_eq!(config.rdb.compression_level, 6);
        assert_eq!(config.rdb.auto_save_changes, 1000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_path, "log");
    }

    #[test]
    fn parse_duration_suffixes() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("42").unwrap(), Duration::from_secs(42));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5x").is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 7000
            [rdb]
            save_interval = "30s"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.save_interval(), Duration::from_secs(30));
        assert_eq!(config.databases, 16);
        assert_eq!(config.rdb.compression_level, 6);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/cinder.toml")).unwrap();
        assert_eq!(config.port, 6379);
    }

    #[test]
    fn invalid_values_rejected() {
        let config: Config = toml::from_str("databases = 0").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[rdb]\ncompression_level = 11").unwrap();
        assert!(config.validate().is_err());
    }
}
