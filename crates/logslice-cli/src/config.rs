//! Run configuration.
//!
//! A `logslice` run is described by a TOML file with four sections:
//! - `[connection]` — API base URL and session credentials
//! - `[log]` — What to retrieve and over which interval
//! - `[tuning]` — Window sizing and the zone naive times are read in
//! - `[output]` — Where the retrieved content is written

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use logslice_core::{
    DEFAULT_CONTENT_FIELD, DEFAULT_GROWTH_FACTOR, DEFAULT_MAX_PROBES, QueryFilter, RunTarget,
    SaturationPolicy, Timestamp, WindowPolicy,
};

use crate::error::{CliError, Result};

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "logslice.toml";

/// Naive formats accepted for `start` and `end`, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Connection to the log API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base URL of the environment, without the `/rest/...` path.
    pub base_url: String,
    /// Session cookie sent with every request.
    #[serde(default)]
    pub cookie: String,
    /// CSRF token sent as `x-csrftoken`.
    #[serde(default)]
    pub token: String,
    /// Per-request timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// What to retrieve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// Kubernetes namespace.
    pub namespace: String,
    /// Restricts the filter to one pod.
    #[serde(default)]
    pub pod: Option<String>,
    /// Log source identifier, e.g. a file path.
    pub source: String,
    /// Replaces the generated filter verbatim.
    #[serde(default)]
    pub query: Option<String>,
    /// Start of the interval: RFC 3339, or a naive time in the configured zone.
    pub start: String,
    /// End of the interval, same formats as `start`.
    pub end: String,
    /// Field collected from search results.
    #[serde(default = "default_content_field")]
    pub content_field: String,
}

fn default_content_field() -> String {
    DEFAULT_CONTENT_FIELD.to_string()
}

/// Window sizing knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TuningConfig {
    /// Growth multiplier for sparse windows.
    pub growth_factor: f64,
    /// IANA zone for naive times and rendered timestamps.
    pub time_zone: String,
    /// Windows are never halved below this many milliseconds.
    pub min_delta_ms: i64,
    /// Count requests allowed to size one window.
    pub max_probes: u32,
    /// Behaviour when a minimum-size window still fills a page.
    pub on_saturation: SaturationPolicy,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            growth_factor: DEFAULT_GROWTH_FACTOR,
            time_zone: "Europe/Rome".to_string(),
            min_delta_ms: 1,
            max_probes: DEFAULT_MAX_PROBES,
            on_saturation: SaturationPolicy::default(),
        }
    }
}

/// Output destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// File name, created or truncated.
    pub file: String,
    /// Directory the file is written to, created if missing.
    pub directory: PathBuf,
    /// Wait for Enter before exiting.
    pub pause_on_exit: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: "output.txt".to_string(),
            directory: PathBuf::from("."),
            pause_on_exit: true,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// API connection.
    pub connection: ConnectionConfig,
    /// Retrieval target.
    pub log: LogConfig,
    /// Window sizing.
    #[serde(default)]
    pub tuning: TuningConfig,
    /// Output destination.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CliError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.connection.base_url.trim();
        if base_url.is_empty() {
            return Err(CliError::Config("connection.base_url cannot be empty".to_string()));
        }
        let parsed = reqwest::Url::parse(base_url).map_err(|e| {
            CliError::Config(format!("connection.base_url '{base_url}' is not a URL: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CliError::Config(format!(
                "connection.base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.connection.timeout_secs == Some(0) {
            return Err(CliError::Config(
                "connection.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.log.namespace.trim().is_empty() && self.log.query.is_none() {
            return Err(CliError::Config("log.namespace cannot be empty".to_string()));
        }
        if self.log.source.trim().is_empty() {
            return Err(CliError::Config("log.source cannot be empty".to_string()));
        }
        if self.log.content_field.is_empty() {
            return Err(CliError::Config("log.content_field cannot be empty".to_string()));
        }

        if self.output.file.trim().is_empty() {
            return Err(CliError::Config("output.file cannot be empty".to_string()));
        }

        self.run_target()?;
        self.window_policy()
            .validate()
            .map_err(|e| CliError::Config(format!("tuning: {e}")))?;
        Ok(())
    }

    /// The zone naive times are read in and timestamps are rendered in.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone name is unknown.
    pub fn time_zone(&self) -> Result<Tz> {
        let name = self.tuning.time_zone.trim();
        name.parse::<Tz>()
            .map_err(|e| CliError::Config(format!("unknown time zone '{name}': {e}")))
    }

    /// The interval to retrieve, in the configured zone.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound does not parse or `start` is after `end`.
    pub fn run_target(&self) -> Result<RunTarget> {
        let zone = self.time_zone()?;
        let start = parse_time(&self.log.start, zone)?;
        let end = parse_time(&self.log.end, zone)?;
        RunTarget::new(start, end).map_err(|e| CliError::Config(format!("log: {e}")))
    }

    /// The filter sent with every request.
    #[must_use]
    pub fn query_filter(&self) -> QueryFilter {
        match &self.log.query {
            Some(query) => QueryFilter::raw(query.trim()),
            None => QueryFilter::for_source(
                self.log.namespace.trim(),
                self.log.pod.as_deref().map(str::trim),
                self.log.source.trim(),
            ),
        }
    }

    /// The window policy built from `[tuning]`.
    #[must_use]
    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::default()
            .with_growth_factor(self.tuning.growth_factor)
            .with_min_delta(TimeDelta::milliseconds(self.tuning.min_delta_ms))
            .with_max_probes(self.tuning.max_probes)
            .with_saturation(self.tuning.on_saturation)
    }

    /// Full path of the output file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.file)
    }
}

/// Parses a configured time.
///
/// RFC 3339 input keeps its instant and is shifted into `zone`; naive input
/// (a date, or a date and time) is interpreted as wall-clock time in `zone`.
///
/// # Errors
///
/// Returns an error if the text matches no accepted format or names a wall-clock
/// time that does not exist in `zone`.
pub fn parse_time(text: &str, zone: Tz) -> Result<Timestamp> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&zone).fixed_offset());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| CliError::Config(format!("cannot parse time '{text}'")))?;

    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
        .ok_or_else(|| CliError::Config(format!("time '{text}' does not exist in {zone}")))
}
