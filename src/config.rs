//! Configuration types for siaet-dl
//!
//! A [`Config`] is built once at startup, usually with [`Config::from_env`], and
//! passed by reference to the components. Nothing reads the environment after
//! that point.

use crate::error::{Error, Result};
use crate::types::Credentials;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment key for the client id
pub const ENV_ID: &str = "SIAET_ID";
/// Environment key for the client secret
pub const ENV_SECRET: &str = "SIAET_SECRET";
/// Environment key for the target year
pub const ENV_YEAR: &str = "ANO_CONSULTA";
/// Environment key for the optional month subset (comma separated)
pub const ENV_MONTHS: &str = "MESES_CONSULTA";
/// Environment key for the optional daily start time (`HH:MM[:SS]`)
pub const ENV_START_TIME: &str = "HORA_INICIO";
/// Environment key for the request timeout override, in seconds
pub const ENV_TIMEOUT_SECS: &str = "SIAET_TIMEOUT_SECS";
/// Environment key for the output directory
pub const ENV_OUTPUT_DIR: &str = "SIAET_OUTPUT_DIR";
/// Environment key for the API base URL
pub const ENV_BASE_URL: &str = "SIAET_BASE_URL";
/// Environment key for the empty-month persistence policy
pub const ENV_PERSIST_EMPTY: &str = "SIAET_PERSIST_EMPTY";

/// Upstream API location and request settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL (default: "https://siaet.dnit.gov.br")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the token endpoint (default: "/api/token/")
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Path of the data endpoint (default: "/api/aet/detalhe/v1/")
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Timeout for each outbound request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Absolute URL of the token endpoint
    pub fn token_url(&self) -> Result<Url> {
        join_url(&self.base_url, &self.token_path)
    }

    /// Absolute URL of the data endpoint
    pub fn data_url(&self) -> Result<Url> {
        join_url(&self.base_url, &self.data_path)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_path: default_token_path(),
            data_path: default_data_path(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn join_url(base: &str, path: &str) -> Result<Url> {
    let base = Url::parse(base)
        .map_err(|e| Error::config("api.base_url", format!("'{}': {}", base, e)))?;
    base.join(path)
        .map_err(|e| Error::config("api.base_url", format!("cannot join '{}': {}", path, e)))
}

/// Retry behavior of the data request
///
/// Delays are fixed: every retryable failure waits `delay` before the next
/// attempt, with no growth and no jitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per month (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,

    /// Error codes that end the month without retrying (default: ["400.005"])
    #[serde(default = "default_terminal_codes")]
    pub terminal_codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
            terminal_codes: default_terminal_codes(),
        }
    }
}

/// Where and how artifacts are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the artifacts (default: "./aetsbaixadas")
    #[serde(default = "default_output_dir")]
    pub base_dir: PathBuf,

    /// Write a file for months whose records collection is empty (default: true)
    #[serde(default = "default_true")]
    pub persist_empty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_output_dir(),
            persist_empty: true,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// API credentials
    pub credentials: Credentials,

    /// Year to download
    pub year: i32,

    /// Months to download, in order (default: 1 through 12)
    #[serde(default = "all_months")]
    pub months: Vec<u32>,

    /// Upstream API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Data request retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Artifact settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Pause between two months (default: 2 seconds)
    #[serde(default = "default_month_delay", with = "duration_serde")]
    pub month_delay: Duration,

    /// Wall-clock time to wait for before starting (default: start immediately)
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
}

impl Config {
    /// Configuration for `year` with every other setting at its default
    pub fn new(credentials: Credentials, year: i32) -> Self {
        Self {
            credentials,
            year,
            months: all_months(),
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
            month_delay: default_month_delay(),
            start_time: None,
        }
    }

    /// Load a `.env` file if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup
    ///
    /// Blank values count as missing. `SIAET_ID`, `SIAET_SECRET` and
    /// `ANO_CONSULTA` are mandatory.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::config(key, format!("{} is not set", key)))
        };

        let id = require(ENV_ID)?;
        let secret = require(ENV_SECRET)?;
        let year_raw = require(ENV_YEAR)?;
        let year = year_raw.parse::<i32>().map_err(|_| {
            Error::config(ENV_YEAR, format!("'{}' is not a valid year", year_raw))
        })?;

        let mut config = Config::new(Credentials::new(id, secret), year);

        if let Some(raw) = get(ENV_MONTHS) {
            config.months = parse_month_list(&raw);
        }

        if let Some(raw) = get(ENV_START_TIME) {
            config.start_time = Some(parse_start_time(&raw)?);
        }

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs = raw.parse::<u64>().map_err(|_| {
                Error::config(ENV_TIMEOUT_SECS, format!("'{}' is not a number of seconds", raw))
            })?;
            config.api.request_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = get(ENV_OUTPUT_DIR) {
            config.output.base_dir = PathBuf::from(raw);
        }

        if let Some(raw) = get(ENV_BASE_URL) {
            Url::parse(&raw)
                .map_err(|e| Error::config(ENV_BASE_URL, format!("'{}': {}", raw, e)))?;
            config.api.base_url = raw;
        }

        if let Some(raw) = get(ENV_PERSIST_EMPTY) {
            config.output.persist_empty = parse_bool(&raw).ok_or_else(|| {
                Error::config(ENV_PERSIST_EMPTY, format!("'{}' is not a boolean", raw))
            })?;
        }

        Ok(config)
    }

    /// Check the settings that must hold before any network activity
    pub fn validate(&self) -> Result<()> {
        if !self.credentials.is_complete() {
            return Err(Error::Config {
                message: "SIAET_ID and SIAET_SECRET must both be set".to_string(),
                key: Some(ENV_ID.to_string()),
            });
        }
        self.api.token_url()?;
        self.api.data_url()?;
        Ok(())
    }
}

/// Order-preserving month filter
///
/// Drops duplicates and values outside 1..=12. An empty result falls back to
/// every month of the year.
pub fn normalize_months<I>(months: I) -> Vec<u32>
where
    I: IntoIterator<Item = i64>,
{
    let mut out: Vec<u32> = Vec::with_capacity(12);
    for month in months {
        if let Ok(month) = u32::try_from(month)
            && (1..=12).contains(&month)
            && !out.contains(&month)
        {
            out.push(month);
        }
    }
    if out.is_empty() { all_months() } else { out }
}

/// Parse a comma separated month list, ignoring entries that are not numbers
pub fn parse_month_list(raw: &str) -> Vec<u32> {
    normalize_months(
        raw.split([',', ';', ' '])
            .filter_map(|part| part.trim().parse::<i64>().ok()),
    )
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_start_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| {
            Error::config(
                ENV_START_TIME,
                format!("'{}' is not a time (expected HH:MM or HH:MM:SS)", raw),
            )
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "sim" => Some(true),
        "0" | "false" | "no" | "nao" | "não" => Some(false),
        _ => None,
    }
}

fn all_months() -> Vec<u32> {
    (1..=12).collect()
}

fn default_base_url() -> String {
    "https://siaet.dnit.gov.br".to_string()
}

fn default_token_path() -> String {
    "/api/token/".to_string()
}

fn default_data_path() -> String {
    "/api/aet/detalhe/v1/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_terminal_codes() -> Vec<String> {
    vec!["400.005".to_string()]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./aetsbaixadas")
}

fn default_month_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
