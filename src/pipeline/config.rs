//! Pipeline configuration from environment variables

use super::filter::DEFAULT_OUTLIER_THRESHOLD;
use std::env;
use std::path::PathBuf;

/// Samples a day needs before it is finalized
pub const DEFAULT_READY_THRESHOLD: u32 = 10;

/// Days of window state kept behind the newest day seen
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Outbound queue backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Jsonl,
    Sqlite,
}

impl BackendType {
    /// Read `--backend jsonl|sqlite` from the process arguments (default: JSONL)
    pub fn parse_from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        Self::parse_from(&args)
    }

    pub fn parse_from(args: &[String]) -> Self {
        if let Some(idx) = args.iter().position(|x| x == "--backend") {
            match args.get(idx + 1).map(|s| s.as_str()) {
                Some("sqlite") => return BackendType::Sqlite,
                Some("jsonl") => return BackendType::Jsonl,
                _ => {}
            }
        }

        BackendType::Jsonl
    }
}

/// Tunables of the aggregation engine itself
///
/// Day keys are always computed in UTC; the timezone is not configurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Values strictly above this are outliers
    pub outlier_threshold: f64,

    /// Samples required to finalize a day
    pub ready_threshold: u32,

    /// Retention horizon in days (0 disables eviction)
    pub retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            ready_threshold: DEFAULT_READY_THRESHOLD,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "outlier threshold must be a positive number, got {}",
                self.outlier_threshold
            )));
        }

        if self.ready_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "ready threshold must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the aggregation runtime
///
/// Loaded from environment variables with defaults matching the reference deployment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub engine: EngineConfig,

    /// Channel buffer between the reading source and ingestion (payloads)
    pub channel_buffer: usize,

    /// Interval of the engine status log line in milliseconds
    pub status_interval_ms: u64,

    /// JSONL file to tail for readings; stdin when None
    pub input_path: Option<PathBuf>,

    /// JSONL queue file for finalized aggregates
    pub output_path: PathBuf,

    /// SQLite queue database for finalized aggregates
    pub db_path: PathBuf,

    /// Publish retries after the first failed attempt
    pub publish_max_retries: u32,

    pub publish_retry_initial_secs: u64,
    pub publish_retry_max_secs: u64,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `OUTLIER_THRESHOLD` (default: 50.0)
    /// - `READY_THRESHOLD` (default: 10)
    /// - `RETENTION_DAYS` (default: 30, 0 disables)
    /// - `READING_CHANNEL_BUFFER` (default: 10000)
    /// - `STATUS_INTERVAL_MS` (default: 30000)
    /// - `READINGS_INPUT_PATH` (default: stdin)
    /// - `AGGREGATES_OUTPUT_PATH` (default: streams/aggregates/daily.jsonl)
    /// - `AQFLOW_DB_PATH` (default: data/aqflow.db)
    /// - `PUBLISH_MAX_RETRIES` (default: 3)
    /// - `PUBLISH_RETRY_INITIAL_SECS` (default: 1)
    /// - `PUBLISH_RETRY_MAX_SECS` (default: 8)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = EngineConfig {
            outlier_threshold: lookup("OUTLIER_THRESHOLD")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_OUTLIER_THRESHOLD),
            ready_threshold: lookup("READY_THRESHOLD")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_READY_THRESHOLD),
            retention_days: lookup("RETENTION_DAYS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_RETENTION_DAYS),
        };
        engine.validate()?;

        let config = Self {
            engine,

            channel_buffer: lookup("READING_CHANNEL_BUFFER")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(10_000),

            status_interval_ms: lookup("STATUS_INTERVAL_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(30_000),

            input_path: lookup("READINGS_INPUT_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),

            output_path: lookup("AGGREGATES_OUTPUT_PATH")
                .unwrap_or_else(|| "streams/aggregates/daily.jsonl".to_string())
                .into(),

            db_path: lookup("AQFLOW_DB_PATH")
                .unwrap_or_else(|| "data/aqflow.db".to_string())
                .into(),

            publish_max_retries: lookup("PUBLISH_MAX_RETRIES")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(3),

            publish_retry_initial_secs: lookup("PUBLISH_RETRY_INITIAL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(1),

            publish_retry_max_secs: lookup("PUBLISH_RETRY_MAX_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(8),
        };

        if config.channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "READING_CHANNEL_BUFFER must be greater than 0".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.outlier_threshold, 50.0);
        assert_eq!(config.engine.ready_threshold, 10);
        assert_eq!(config.engine.retention_days, 30);
        assert_eq!(config.channel_buffer, 10_000);
        assert_eq!(config.status_interval_ms, 30_000);
        assert!(config.input_path.is_none());
        assert_eq!(config.output_path, PathBuf::from("streams/aggregates/daily.jsonl"));
        assert_eq!(config.db_path, PathBuf::from("data/aqflow.db"));
        assert_eq!(config.publish_max_retries, 3);
    }

    #[test]
    fn test_custom_config() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("OUTLIER_THRESHOLD", "35.5"),
            ("READY_THRESHOLD", "24"),
            ("RETENTION_DAYS", "0"),
            ("READING_CHANNEL_BUFFER", "500"),
            ("READINGS_INPUT_PATH", "/tmp/readings.jsonl"),
            ("PUBLISH_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.engine.outlier_threshold, 35.5);
        assert_eq!(config.engine.ready_threshold, 24);
        assert_eq!(config.engine.retention_days, 0);
        assert_eq!(config.channel_buffer, 500);
        assert_eq!(config.input_path, Some(PathBuf::from("/tmp/readings.jsonl")));
        assert_eq!(config.publish_max_retries, 0);
    }

    #[test]
    fn test_unparseable_values_fall_back_to_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("READY_THRESHOLD", "ten"),
            ("OUTLIER_THRESHOLD", ""),
        ]))
        .unwrap();

        assert_eq!(config.engine.ready_threshold, 10);
        assert_eq!(config.engine.outlier_threshold, 50.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_lookup(lookup_from(&[("READY_THRESHOLD", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            PipelineConfig::from_lookup(lookup_from(&[("OUTLIER_THRESHOLD", "-1")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            PipelineConfig::from_lookup(lookup_from(&[("READING_CHANNEL_BUFFER", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_backend_from_args() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(BackendType::parse_from(&args(&["aqflow"])), BackendType::Jsonl);
        assert_eq!(
            BackendType::parse_from(&args(&["aqflow", "--backend", "sqlite"])),
            BackendType::Sqlite
        );
        assert_eq!(
            BackendType::parse_from(&args(&["aqflow", "--backend", "kafka"])),
            BackendType::Jsonl
        );
    }
}
