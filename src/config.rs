//! Configuration types for listing-collector

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Smallest accepted delay between two requests, in seconds
pub const MIN_REQUEST_DELAY_SECS: f64 = 0.1;

/// Largest accepted delay between two requests, in seconds
pub const MAX_REQUEST_DELAY_SECS: f64 = 60.0;

/// Largest page the reference upstream API will return
pub const MAX_PAGE_SIZE: u32 = 50;

/// Default environment variable holding the upstream bearer token
pub const DEFAULT_CREDENTIAL_ENV: &str = "YELP_API_KEY";

/// Per-run collection settings
///
/// Mutable through the controller only while no run is `Running`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Minimum delay between two upstream requests in seconds (default: 2.0)
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: f64,

    /// Maximum number of pages fetched per run (default: 20)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            request_delay_secs: default_request_delay_secs(),
            page_limit: default_page_limit(),
        }
    }
}

impl CollectionConfig {
    /// Request delay as a [`Duration`]
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_secs)
    }

    /// Validate the delay bounds and page limit
    pub fn validate(&self) -> Result<()> {
        let delay = self.request_delay_secs;
        if !delay.is_finite() || !(MIN_REQUEST_DELAY_SECS..=MAX_REQUEST_DELAY_SECS).contains(&delay)
        {
            return Err(Error::config(
                "collection.request_delay_secs",
                format!(
                    "request delay must be between {MIN_REQUEST_DELAY_SECS} and {MAX_REQUEST_DELAY_SECS} seconds, got {delay}"
                ),
            ));
        }
        if self.page_limit == 0 {
            return Err(Error::config(
                "collection.page_limit",
                "page limit must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Reference HTTP listing source settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Search endpoint (default: Yelp Fusion business search)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Records requested per page, capped by the upstream API (default: 50)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upstream result window; offsets past this are never requested (default: 1000)
    #[serde(default = "default_max_results")]
    pub max_results: u64,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Whole-request timeout; bounds how long a stop waits on a fetch (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Environment variable the credential is read from (default: "YELP_API_KEY")
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            page_size: default_page_size(),
            max_results: default_max_results(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            credential_env: default_credential_env(),
        }
    }
}

impl SourceConfig {
    /// Validate endpoint and paging settings
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::config("source.endpoint", format!("invalid endpoint URL: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(
                "source.endpoint",
                format!("unsupported endpoint scheme '{}'", endpoint.scheme()),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::config(
                "source.page_size",
                format!("page size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.max_results == 0 {
            return Err(Error::config(
                "source.max_results",
                "max results must be at least 1",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config(
                "source.request_timeout",
                "request timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Retry configuration for transient page failures
///
/// `max_attempts = 0` keeps the minimum contract: every source error fails
/// the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries per page (default: 0, retries disabled)
    #[serde(default)]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Validate backoff parameters
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff multiplier must be at least 1.0",
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                "initial delay must not exceed max delay",
            ));
        }
        Ok(())
    }
}

/// Main configuration for the collector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Rate and page-limit settings
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Reference HTTP source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Buffer size of the event broadcast channel (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: CollectionConfig::default(),
            source: SourceConfig::default(),
            retry: RetryConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON, filling in defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config {
                message: format!("failed to parse configuration: {e}"),
                key: None,
            })
    }

    /// Validate every section, reporting the first offending key
    pub fn validate(&self) -> Result<()> {
        self.collection.validate()?;
        self.source.validate()?;
        self.retry.validate()?;
        if self.event_capacity == 0 {
            return Err(Error::config(
                "event_capacity",
                "event capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Pre-obtained bearer token for the upstream API
///
/// The token is never printed: `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting blank values
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::Config {
                message: "credential must not be empty".to_string(),
                key: Some("credential".to_string()),
            });
        }
        Ok(Self(token))
    }

    /// Read the token from an environment variable
    ///
    /// A missing or blank variable is a configuration error, reported before
    /// any network activity.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::new(value),
            _ => Err(Error::Config {
                message: format!("API credential not configured: set the {var} environment variable"),
                key: Some(var.to_string()),
            }),
        }
    }

    /// The raw token, for building the `Authorization` header
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

fn default_request_delay_secs() -> f64 {
    2.0
}

fn default_page_limit() -> u32 {
    20
}

fn default_endpoint() -> String {
    "https://api.yelp.com/v3/businesses/search".to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_max_results() -> u64 {
    1000
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("listing-collector/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_credential_env() -> String {
    DEFAULT_CREDENTIAL_ENV.to_string()
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

// Duration serialization helper (milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
