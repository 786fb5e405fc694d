use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use murmur_api::chat::DEFAULT_GREETING;
use murmur_store::{DEFAULT_MAX_EVENTS, DEFAULT_MAX_SESSIONS};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Formatter program. `None` runs without one.
    pub formatter: Option<PathBuf>,
    pub format_timeout: Duration,
    pub cipher_timeout: Duration,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub max_events: usize,
    pub max_sessions: usize,
    pub greeting: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set but unparseable numbers are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| parse_or(&lookup, key, default);

        let formatter = lookup("MURMUR_FORMATTER")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host: lookup("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "MURMUR_PORT", 3000u16)?,
            formatter,
            format_timeout: Duration::from_millis(number("MURMUR_FORMAT_TIMEOUT_MS", 2000)?),
            cipher_timeout: Duration::from_millis(number("MURMUR_CIPHER_TIMEOUT_MS", 1000)?),
            session_timeout: Duration::from_secs(number("MURMUR_SESSION_TIMEOUT_SECS", 120)?),
            sweep_interval: Duration::from_secs(number("MURMUR_SWEEP_INTERVAL_SECS", 30)?.max(1)),
            max_events: parse_or(&lookup, "MURMUR_MAX_EVENTS", DEFAULT_MAX_EVENTS)?,
            max_sessions: parse_or(&lookup, "MURMUR_MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?,
            greeting: lookup("MURMUR_GREETING").unwrap_or_else(|| DEFAULT_GREETING.into()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
