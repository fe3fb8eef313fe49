//! Configuration management for the instawatch monitor
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{DEFAULT_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};
use crate::probe::headers::HeaderProfile;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Probe configuration
    pub probe: ProbeConfig,

    /// Scheduling configuration
    pub schedule: ScheduleConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Notification configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// One structured-data endpoint variant and the header profile it is requested with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// URL template, `{handle}` is replaced with the normalised handle
    pub url_template: String,

    /// Request identity used for this variant
    pub profile: HeaderProfile,
}

impl EndpointConfig {
    pub fn new(url_template: impl Into<String>, profile: HeaderProfile) -> Self {
        Self {
            url_template: url_template.into(),
            profile,
        }
    }

    /// Expand the template for a handle
    pub fn url_for(&self, handle: &str) -> String {
        self.url_template.replace("{handle}", handle)
    }
}

/// Probe-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second) shared by all probes
    pub requests_per_second: u32,

    /// Retries of the profile page fetch after a transport failure
    pub markup_retry_attempts: u32,

    /// Base delay in milliseconds before a retry
    pub retry_base_delay_ms: u64,

    /// Extra delay in milliseconds added per attempt
    pub retry_step_ms: u64,

    /// Ordered structured-data endpoint variants
    pub endpoints: Vec<EndpointConfig>,

    /// Profile page URL template
    pub profile_url_template: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 12,
            requests_per_second: 2,
            markup_retry_attempts: 1,
            retry_base_delay_ms: 1000,
            retry_step_ms: 500,
            endpoints: vec![
                EndpointConfig::new(
                    "https://www.instagram.com/api/v1/users/web_profile_info/?username={handle}",
                    HeaderProfile::WebJson,
                ),
                EndpointConfig::new(
                    "https://i.instagram.com/api/v1/users/web_profile_info/?username={handle}",
                    HeaderProfile::MobileApp,
                ),
            ],
            profile_url_template: String::from("https://www.instagram.com/{handle}/"),
        }
    }
}

impl ProbeConfig {
    /// Point every endpoint at a different origin (used against mock servers)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.endpoints = vec![
            EndpointConfig::new(
                format!("{base}/api/v1/users/web_profile_info/?username={{handle}}"),
                HeaderProfile::WebJson,
            ),
            EndpointConfig::new(
                format!("{base}/i/api/v1/users/web_profile_info/?username={{handle}}"),
                HeaderProfile::MobileApp,
            ),
        ];
        self.profile_url_template = format!("{base}/{{handle}}/");
        self
    }

    /// Request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval given to new targets (minutes)
    pub default_interval_minutes: u32,

    /// Smallest accepted interval (minutes)
    pub min_interval_minutes: u32,

    /// Largest accepted interval (minutes)
    pub max_interval_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            min_interval_minutes: MIN_INTERVAL_MINUTES,
            max_interval_minutes: MAX_INTERVAL_MINUTES,
        }
    }
}

impl ScheduleConfig {
    /// Pull a requested interval into the configured bounds
    #[must_use]
    pub fn clamp_interval(&self, minutes: i64) -> u32 {
        let min = i64::from(self.min_interval_minutes);
        let max = i64::from(self.max_interval_minutes.max(self.min_interval_minutes));
        minutes.clamp(min, max) as u32
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook endpoint; notifications go to the log when unset
    pub webhook_url: Option<String>,

    /// Bearer token sent with webhook requests
    pub auth_token: Option<String>,

    /// Webhook timeout in seconds
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,

    /// Webhook retry attempts
    #[serde(default = "default_notifier_retries")]
    pub max_retries: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            auth_token: None,
            timeout_secs: default_notifier_timeout(),
            max_retries: default_notifier_retries(),
        }
    }
}

fn default_notifier_timeout() -> u64 {
    10
}

fn default_notifier_retries() -> u32 {
    2
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let request_timeout_secs = std::env::var("INSTAWATCH_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.probe.request_timeout_secs);

        let requests_per_second = std::env::var("INSTAWATCH_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.probe.requests_per_second);

        let markup_retry_attempts = std::env::var("INSTAWATCH_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.probe.markup_retry_attempts);

        let default_interval_minutes = std::env::var("INSTAWATCH_DEFAULT_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.schedule.default_interval_minutes);

        let sqlite_path = std::env::var("INSTAWATCH_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let webhook_url = std::env::var("INSTAWATCH_WEBHOOK_URL").ok();
        let auth_token = std::env::var("INSTAWATCH_WEBHOOK_TOKEN").ok();

        let log_level =
            std::env::var("INSTAWATCH_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("INSTAWATCH_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            probe: ProbeConfig {
                request_timeout_secs,
                requests_per_second,
                markup_retry_attempts,
                ..defaults.probe
            },
            schedule: ScheduleConfig {
                default_interval_minutes,
                ..defaults.schedule
            },
            database: DatabaseConfig { sqlite_path },
            notifier: NotifierConfig {
                webhook_url,
                auth_token,
                ..defaults.notifier
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.probe.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.probe.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.probe.endpoints.is_empty() {
            anyhow::bail!("at least one structured endpoint is required");
        }

        for endpoint in &self.probe.endpoints {
            if !endpoint.url_template.contains("{handle}") {
                anyhow::bail!(
                    "endpoint template '{}' has no {{handle}} placeholder",
                    endpoint.url_template
                );
            }
        }

        if !self.probe.profile_url_template.contains("{handle}") {
            anyhow::bail!("profile_url_template has no {{handle}} placeholder");
        }

        let schedule = &self.schedule;
        if schedule.min_interval_minutes == 0
            || schedule.min_interval_minutes > schedule.max_interval_minutes
        {
            anyhow::bail!("interval bounds must satisfy 0 < min <= max");
        }

        if !(schedule.min_interval_minutes..=schedule.max_interval_minutes)
            .contains(&schedule.default_interval_minutes)
        {
            anyhow::bail!("default_interval_minutes must lie within the interval bounds");
        }

        if self.notifier.webhook_url.is_some() && self.notifier.timeout_secs == 0 {
            anyhow::bail!("notifier timeout_secs must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            schedule: ScheduleConfig::default(),
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/instawatch.db"),
            },
            notifier: NotifierConfig::default(),
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
