//! Error types for the bridge pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort bridge startup.
///
/// Once the ingest loop runs, failures are logged and absorbed instead; see
/// [`crate::pipeline::EventOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// Core error (author configuration, metrics).
    #[error(transparent)]
    Core(#[from] notebridge_core::Error),

    /// Nostr SDK error.
    #[error("Nostr SDK error: {0}")]
    NostrSdk(#[from] nostr_sdk::client::Error),

    /// The relay did not reach the connected state in time.
    #[error("could not connect to relay {url} within {timeout_secs}s")]
    RelayConnect {
        /// Relay URL.
        url: String,
        /// Connect timeout that elapsed.
        timeout_secs: u64,
    },

    /// A shutdown was requested before the relay connected.
    #[error("startup interrupted by shutdown request")]
    Interrupted,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
