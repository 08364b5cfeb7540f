//! Application configuration loaded from environment variables.
//!
//! The configuration is read and validated exactly once at startup. Everything
//! downstream receives a [`Config`] that is already known to be consistent.

use crate::{Error, Result};
use chrono::FixedOffset;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Cloud,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(Error::Config(format!(
                "ENVIRONMENT must be 'local' or 'cloud', got '{}'",
                other
            ))),
        }
    }
}

/// Sink variants that can be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Document store (ClickHouse), idempotent upsert by game ID.
    Document,
    /// File store (S3), append-only PGN artifacts.
    File,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::File => "file",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "file" => Ok(Self::File),
            other => Err(Error::Config(format!("unknown sink '{}'", other))),
        }
    }
}

/// Lichess API settings.
#[derive(Debug, Clone)]
pub struct LichessConfig {
    pub api_key: String,
    pub username: String,
    /// Tracked user ID for result derivation (lowercased username by default).
    pub user_id: String,
    /// Request ceiling in requests per second.
    pub requests_per_sec: u32,
    pub base_url: String,
}

/// ClickHouse document store settings.
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: "chess".to_string(),
            table: "games".to_string(),
            user: None,
            password: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    /// Upper bound for one run and for each outbound HTTP request.
    pub timeout: Duration,

    pub lichess: LichessConfig,

    /// Maximum number of games processed per run.
    pub batch_limit: usize,

    /// Maximum number of concurrently running (game, sink) units.
    pub max_in_flight: usize,

    /// Offset used when rendering `played_at` into file names.
    pub display_offset: FixedOffset,

    /// Enabled sinks, in configuration order.
    pub sinks: Vec<SinkKind>,

    /// Sink queried for the watermark.
    pub watermark_source: SinkKind,

    /// File-store folder (S3 key prefix) for PGN artifacts.
    pub archive_folder: String,

    pub clickhouse: ClickHouseConfig,

    /// Bucket for the file sink; required when it is enabled.
    pub s3_bucket: Option<String>,

    /// Prometheus port (0 disables the endpoint).
    pub metrics_port: u16,

    /// Bind address for `serve` mode.
    pub trigger_bind_addr: String,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Required:
    /// - `ENVIRONMENT`: `local` or `cloud`
    /// - `LICHESS_API_KEY`, `LICHESS_USERNAME`
    /// - `S3_BUCKET` when the file sink is enabled
    /// - `CLICKHOUSE_PASSWORD` when `ENVIRONMENT=cloud` and the document sink is enabled
    ///
    /// Optional:
    /// - `TIMEOUT`: seconds (default: 60)
    /// - `LICHESS_USER_ID`: tracked user (default: lowercased username)
    /// - `LICHESS_API_LIMIT`: requests/sec (default: 20)
    /// - `LICHESS_BASE_URL` (default: "https://lichess.org")
    /// - `ARCHIVE_BATCH_LIMIT` (default: 10)
    /// - `ARCHIVE_MAX_IN_FLIGHT` (default: 8)
    /// - `ARCHIVE_UTC_OFFSET` (default: "+00:00")
    /// - `ARCHIVE_SINKS`: comma-separated (default: "document,file")
    /// - `ARCHIVE_WATERMARK_SOURCE` (default: "document")
    /// - `ARCHIVE_FOLDER` (default: "archive")
    /// - `CLICKHOUSE_URL`, `CLICKHOUSE_DATABASE`, `CLICKHOUSE_TABLE`, `CLICKHOUSE_USER`
    /// - `METRICS_PORT` (default: 0)
    /// - `TRIGGER_BIND_ADDR` (default: "0.0.0.0:8080")
    pub fn from_env() -> Result<Self> {
        let environment: Environment = required("ENVIRONMENT")?.parse()?;
        let timeout = Duration::from_secs(parsed("TIMEOUT", 60u64)?);

        let username = required("LICHESS_USERNAME")?;
        let lichess = LichessConfig {
            api_key: required("LICHESS_API_KEY")?,
            user_id: optional("LICHESS_USER_ID").unwrap_or_else(|| username.to_lowercase()),
            username,
            requests_per_sec: parsed("LICHESS_API_LIMIT", 20u32)?,
            base_url: optional("LICHESS_BASE_URL")
                .unwrap_or_else(|| "https://lichess.org".to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let display_offset = optional("ARCHIVE_UTC_OFFSET")
            .unwrap_or_else(|| "+00:00".to_string())
            .parse::<FixedOffset>()
            .map_err(|e| Error::Config(format!("ARCHIVE_UTC_OFFSET: {}", e)))?;

        let sinks = optional("ARCHIVE_SINKS")
            .unwrap_or_else(|| "document,file".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SinkKind::from_str)
            .collect::<Result<Vec<_>>>()?;

        let watermark_source = optional("ARCHIVE_WATERMARK_SOURCE")
            .unwrap_or_else(|| "document".to_string())
            .parse()?;

        let defaults = ClickHouseConfig::default();
        let clickhouse = ClickHouseConfig {
            url: optional("CLICKHOUSE_URL").unwrap_or(defaults.url),
            database: optional("CLICKHOUSE_DATABASE").unwrap_or(defaults.database),
            table: optional("CLICKHOUSE_TABLE").unwrap_or(defaults.table),
            user: optional("CLICKHOUSE_USER"),
            password: optional("CLICKHOUSE_PASSWORD"),
        };

        let config = Self {
            environment,
            timeout,
            lichess,
            batch_limit: parsed("ARCHIVE_BATCH_LIMIT", 10usize)?,
            max_in_flight: parsed("ARCHIVE_MAX_IN_FLIGHT", 8usize)?,
            display_offset,
            sinks,
            watermark_source,
            archive_folder: optional("ARCHIVE_FOLDER")
                .unwrap_or_else(|| "archive".to_string())
                .trim_matches('/')
                .to_string(),
            clickhouse,
            s3_bucket: optional("S3_BUCKET"),
            metrics_port: parsed("METRICS_PORT", 0u16)?,
            trigger_bind_addr: optional("TRIGGER_BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        config.validate()?;

        tracing::info!(
            environment = ?config.environment,
            username = %config.lichess.username,
            rate_limit = config.lichess.requests_per_sec,
            batch_limit = config.batch_limit,
            sinks = ?config.sinks,
            watermark = %config.watermark_source,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.lichess.api_key.is_empty() {
            return Err(Error::Config("LICHESS_API_KEY is required".into()));
        }
        if self.lichess.username.is_empty() {
            return Err(Error::Config("LICHESS_USERNAME is required".into()));
        }
        if self.lichess.requests_per_sec == 0 {
            return Err(Error::Config("LICHESS_API_LIMIT must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("TIMEOUT must be positive".into()));
        }
        if self.batch_limit == 0 {
            return Err(Error::Config("ARCHIVE_BATCH_LIMIT must be positive".into()));
        }
        if self.max_in_flight == 0 {
            return Err(Error::Config("ARCHIVE_MAX_IN_FLIGHT must be positive".into()));
        }
        if self.sinks.is_empty() {
            return Err(Error::Config("ARCHIVE_SINKS must name at least one sink".into()));
        }
        let mut seen = HashSet::new();
        if let Some(repeated) = self.sinks.iter().find(|kind| !seen.insert(**kind)) {
            return Err(Error::Config(format!(
                "ARCHIVE_SINKS lists '{}' more than once",
                repeated
            )));
        }
        if !self.sinks.contains(&self.watermark_source) {
            return Err(Error::Config(format!(
                "ARCHIVE_WATERMARK_SOURCE '{}' is not an enabled sink",
                self.watermark_source
            )));
        }
        if self.sinks.contains(&SinkKind::File) && self.s3_bucket.is_none() {
            return Err(Error::Config(
                "S3_BUCKET is required when the file sink is enabled".into(),
            ));
        }
        if self.environment == Environment::Cloud
            && self.sinks.contains(&SinkKind::Document)
            && self.clickhouse.password.is_none()
        {
            return Err(Error::Config(
                "CLICKHOUSE_PASSWORD is required in the cloud environment".into(),
            ));
        }
        Ok(())
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| Error::Config(format!("{} is required", key)))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(key) {
        Some(v) => v
            .parse()
            .map_err(|e| Error::Config(format!("{}: invalid value '{}': {}", key, v, e))),
        None => Ok(default),
    }
}
