use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "rxintake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_API_URL: &str = "RXINTAKE_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "RXINTAKE_TIMEOUT_SECS";
pub const ENV_HISTORY_FANOUT: &str = "RXINTAKE_HISTORY_FANOUT";
pub const ENV_LINK_FANOUT: &str = "RXINTAKE_LINK_FANOUT";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HISTORY_FANOUT: usize = 8;
const DEFAULT_LINK_FANOUT: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Connection settings for the remote record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout_secs: u64,
    /// Upper bound on concurrent drug lookups while assembling a history.
    pub history_fanout: usize,
    /// Upper bound on prescriptions whose drug records are written concurrently.
    pub link_fanout: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            history_fanout: DEFAULT_HISTORY_FANOUT,
            link_fanout: DEFAULT_LINK_FANOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `RXINTAKE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_API_URL,
                    value: url.to_string(),
                });
            }
            config.api_base_url = url.to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = parse_positive(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HISTORY_FANOUT) {
            config.history_fanout = parse_positive(ENV_HISTORY_FANOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LINK_FANOUT) {
            config.link_fanout = parse_positive(ENV_LINK_FANOUT, &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "rxintake=info,warn"
}

/// Where downloaded prescription images go by default.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}
