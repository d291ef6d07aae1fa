//! Runtime configuration.
//!
//! Two layers: process settings read from environment variables
//! (`Config::from_env`, with development defaults) and the sources document
//! describing which bestseller lists to ingest (`sources::SourcesConfig`).

pub mod sources;

pub use sources::{ChannelListConfig, DelayWindow, SourcesConfig};

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::store::MergePolicy;

/// Environment variable names.
pub const ENV_SOURCES_PATH: &str = "BESTSELLERS_SOURCES";
pub const ENV_DATA_PATH: &str = "BESTSELLERS_DATA";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_MERGE_POLICY: &str = "MERGE_POLICY";

/// Default values used when environment variables are absent.
const DEFAULT_SOURCES_PATH: &str = "config.json";
const DEFAULT_DATA_PATH: &str = "data/bestsellers.csv";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Process-level settings shared by `ingest` and `api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    sources_path: PathBuf,
    data_path: PathBuf,
    bind_addr: String,
    merge_policy: MergePolicy,
}

impl Config {
    pub fn new(
        sources_path: impl Into<PathBuf>,
        data_path: impl Into<PathBuf>,
        bind_addr: impl Into<String>,
        merge_policy: MergePolicy,
    ) -> Self {
        Self {
            sources_path: sources_path.into(),
            data_path: data_path.into(),
            bind_addr: bind_addr.into(),
            merge_policy,
        }
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sources_path =
            env::var(ENV_SOURCES_PATH).unwrap_or_else(|_| DEFAULT_SOURCES_PATH.to_string());
        let data_path = env::var(ENV_DATA_PATH).unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());
        let bind_addr = env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let merge_policy = match env::var(ENV_MERGE_POLICY) {
            Ok(value) => value.parse().map_err(|reason| ConfigError::InvalidValue {
                field: ENV_MERGE_POLICY,
                reason,
            })?,
            Err(_) => MergePolicy::default(),
        };

        Ok(Self::new(sources_path, data_path, bind_addr, merge_policy))
    }

    /// Path of the JSON document listing channels and lists to ingest.
    pub fn sources_path(&self) -> &Path {
        &self.sources_path
    }
    /// Path of the CSV record store.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
    /// TCP bind address (host:port) for the query API.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }
    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    /// Development defaults (mirrors `from_env` with no env overrides).
    pub fn default() -> Self {
        Self::new(
            DEFAULT_SOURCES_PATH,
            DEFAULT_DATA_PATH,
            DEFAULT_BIND_ADDR,
            MergePolicy::default(),
        )
    }
}

/// Why the environment or the sources document was rejected.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
    UnknownChannel(String),
    Read { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
            ConfigError::UnknownChannel(key) => write!(f, "unknown channel '{}'", key),
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse(err) => write!(f, "malformed sources document: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [ENV_SOURCES_PATH, ENV_DATA_PATH, ENV_BIND_ADDR, ENV_MERGE_POLICY] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_when_env_missing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.data_path(), Path::new(super::DEFAULT_DATA_PATH));
        assert_eq!(cfg.merge_policy(), MergePolicy::FirstWriterWins);
    }

    #[test]
    fn overrides_when_env_present() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_SOURCES_PATH, "/etc/bestsellers/sources.json");
            env::set_var(ENV_DATA_PATH, "/var/lib/bestsellers/history.csv");
            env::set_var(ENV_BIND_ADDR, "0.0.0.0:9000");
            env::set_var(ENV_MERGE_POLICY, "last");
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.sources_path(), Path::new("/etc/bestsellers/sources.json"));
        assert_eq!(cfg.data_path(), Path::new("/var/lib/bestsellers/history.csv"));
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert_eq!(cfg.merge_policy(), MergePolicy::LastWriterWins);
        clear_env();
    }

    #[test]
    fn rejects_unknown_merge_policy() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_MERGE_POLICY, "newest");
        }
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: ENV_MERGE_POLICY,
                ..
            }
        ));
        clear_env();
    }
}
