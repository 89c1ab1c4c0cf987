//! Error types shared by the notebridge crates.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading configuration or handling events.
#[derive(Error, Debug)]
pub enum Error {
    /// The identifier is not valid NIP-19 bech32.
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The identifier as written in the configuration.
        identifier: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The identifier decoded to something other than a public key.
    #[error("identifier '{identifier}' is a {entity}, expected an npub")]
    UnexpectedEntity {
        /// The identifier as written in the configuration.
        identifier: String,
        /// The NIP-19 entity it decoded to (e.g. "note").
        entity: &'static str,
    },

    /// The author configuration contains no entries.
    #[error("author configuration is empty")]
    NoAuthors,

    /// Metrics recorder could not be installed.
    #[error("metrics error: {0}")]
    Metrics(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identifier_display() {
        let err = Error::InvalidIdentifier {
            identifier: "npub1bogus".to_string(),
            reason: "invalid checksum".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("npub1bogus"));
        assert!(msg.contains("invalid checksum"));
    }

    #[test]
    fn test_unexpected_entity_display() {
        let err = Error::UnexpectedEntity {
            identifier: "note1xyz".to_string(),
            entity: "note",
        };
        assert_eq!(
            err.to_string(),
            "identifier 'note1xyz' is a note, expected an npub"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }
}
