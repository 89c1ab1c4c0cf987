//! Bridge configuration loaded from environment variables.

use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay to subscribe to (e.g., "wss://relay.damus.io").
    pub relay_url: String,

    /// Incoming-webhook URL notifications are posted to.
    pub webhook_url: String,

    /// Author configuration file.
    pub authors_path: PathBuf,

    /// Dedupe record file.
    pub posted_notes_path: PathBuf,

    /// Stored notes the relay replays on subscribe.
    pub subscription_limit: usize,

    /// Request timeout for webhook deliveries.
    pub delivery_timeout: Duration,

    /// How long to wait for the relay connection at startup.
    pub relay_connect_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `RELAY_URL`: Relay to subscribe to
    /// - `SLACK_WEBHOOK_URL`: Webhook to post notifications to
    ///
    /// Optional:
    /// - `AUTHORS_PATH`: Author configuration file (default: "authors.json")
    /// - `POSTED_NOTES_PATH`: Dedupe record file (default: "posted_notes.json")
    /// - `SUBSCRIPTION_LIMIT`: Stored notes replayed on subscribe (default: 1)
    /// - `DELIVERY_TIMEOUT_SECS`: Webhook request timeout (default: 10)
    /// - `RELAY_CONNECT_TIMEOUT_SECS`: Startup connect timeout (default: 10)
    pub fn from_env() -> Result<Self> {
        let relay_url = required("RELAY_URL")?;
        let webhook_url = required("SLACK_WEBHOOK_URL")?;

        let authors_path = PathBuf::from(
            std::env::var("AUTHORS_PATH").unwrap_or_else(|_| "authors.json".to_string()),
        );

        let posted_notes_path = PathBuf::from(
            std::env::var("POSTED_NOTES_PATH").unwrap_or_else(|_| "posted_notes.json".to_string()),
        );

        let subscription_limit = parsed("SUBSCRIPTION_LIMIT", 1usize)?;
        let delivery_timeout = Duration::from_secs(parsed("DELIVERY_TIMEOUT_SECS", 10u64)?);
        let relay_connect_timeout =
            Duration::from_secs(parsed("RELAY_CONNECT_TIMEOUT_SECS", 10u64)?);

        tracing::info!(
            relay_url = %relay_url,
            authors_path = %authors_path.display(),
            posted_notes_path = %posted_notes_path.display(),
            subscription_limit,
            delivery_timeout_secs = delivery_timeout.as_secs(),
            relay_connect_timeout_secs = relay_connect_timeout.as_secs(),
            "bridge configuration loaded"
        );

        Ok(Self {
            relay_url,
            webhook_url,
            authors_path,
            posted_notes_path,
            subscription_limit,
            delivery_timeout,
            relay_connect_timeout,
        })
    }
}

/// Read a variable that must be present and non-empty.
fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::Config(format!(
            "{name} environment variable is not set"
        ))),
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {name} '{value}': {e}"))),
        Err(_) => Ok(default),
    }
}
