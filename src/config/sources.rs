//! The sources document: which channels and lists to ingest, and the
//! request policy applied to every fetch.
//!
//! ```json
//! {
//!   "user_agent": "BestsellerBot/1.0",
//!   "request_timeout": 15,
//!   "max_rank": 20,
//!   "delay_seconds_min": 2.0,
//!   "delay_seconds_max": 4.0,
//!   "channels": {
//!     "books_com_tw": {
//!       "enabled": true,
//!       "lists": { "art_design": "https://www.books.com.tw/web/sys_saletopb/books/07" }
//!     }
//!   }
//! }
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::config::ConfigError;
use crate::entities::Channel;
use crate::fetcher::FetchPolicy;

pub const DEFAULT_USER_AGENT: &str = "BestsellerBot/1.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 15.0;
pub const DEFAULT_MAX_RANK: u32 = 20;
pub const DEFAULT_DELAY_MIN_SECS: f64 = 2.0;
pub const DEFAULT_DELAY_MAX_SECS: f64 = 4.0;

/// One fetch target: a list on a channel and where to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListConfig {
    pub channel: Channel,
    pub list_name: String,
    pub url: Url,
    pub enabled: bool,
}

/// Inclusive window the inter-request pause is sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayWindow {
    pub min: Duration,
    pub max: Duration,
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self {
            min: Duration::from_secs_f64(DEFAULT_DELAY_MIN_SECS),
            max: Duration::from_secs_f64(DEFAULT_DELAY_MAX_SECS),
        }
    }
}

/// Validated sources document. Targets keep the declared order.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub policy: FetchPolicy,
    pub max_rank: u32,
    pub delay: DelayWindow,
    pub max_retries: u32,
    pub targets: Vec<ChannelListConfig>,
}

#[derive(Debug, Deserialize)]
struct RawSources {
    user_agent: Option<String>,
    request_timeout: Option<f64>,
    max_rank: Option<i64>,
    delay_seconds_min: Option<f64>,
    delay_seconds_max: Option<f64>,
    max_retries: Option<u32>,
    #[serde(default)]
    channels: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    lists: Map<String, Value>,
}

fn enabled_by_default() -> bool {
    true
}

impl SourcesConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSources = serde_json::from_str(text).map_err(ConfigError::Parse)?;

        let timeout_secs = raw.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if !(timeout_secs.is_finite() && timeout_secs > 0.0) {
            return Err(invalid("request_timeout", "must be a positive number of seconds"));
        }

        let max_rank = raw.max_rank.unwrap_or(i64::from(DEFAULT_MAX_RANK));
        let max_rank = u32::try_from(max_rank)
            .ok()
            .filter(|rank| *rank >= 1)
            .ok_or_else(|| invalid("max_rank", "must be at least 1"))?;

        let delay_min = raw.delay_seconds_min.unwrap_or(DEFAULT_DELAY_MIN_SECS);
        let delay_max = raw.delay_seconds_max.unwrap_or(DEFAULT_DELAY_MAX_SECS);
        if !(delay_min.is_finite() && delay_max.is_finite()) || delay_min < 0.0 {
            return Err(invalid("delay_seconds_min", "must be a non-negative number"));
        }
        if delay_max < delay_min {
            return Err(invalid(
                "delay_seconds_max",
                "must not be smaller than delay_seconds_min",
            ));
        }

        let timeout = seconds("request_timeout", timeout_secs)?;
        let delay_min = seconds("delay_seconds_min", delay_min)?;
        let delay_max = seconds("delay_seconds_max", delay_max)?;

        let mut targets = Vec::new();
        for (channel_key, section) in raw.channels {
            let channel: Channel = channel_key
                .parse()
                .map_err(|_| ConfigError::UnknownChannel(channel_key.clone()))?;
            let section: RawChannel = serde_json::from_value(section).map_err(ConfigError::Parse)?;

            for (list_name, url) in section.lists {
                let url = url
                    .as_str()
                    .and_then(|u| Url::parse(u).ok())
                    .ok_or_else(|| invalid("lists", format!("{channel_key}:{list_name} has no valid url")))?;
                targets.push(ChannelListConfig {
                    channel,
                    list_name,
                    url,
                    enabled: section.enabled,
                });
            }
        }

        Ok(Self {
            policy: FetchPolicy {
                user_agent: raw
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                timeout,
            },
            max_rank,
            delay: DelayWindow {
                min: delay_min,
                max: delay_max,
            },
            max_retries: raw.max_retries.unwrap_or(0),
            targets,
        })
    }

    /// Targets to fetch in this run, in declared order.
    pub fn enabled_targets(&self) -> Vec<ChannelListConfig> {
        self.targets.iter().filter(|t| t.enabled).cloned().collect()
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| invalid(field, "number of seconds out of range"))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
