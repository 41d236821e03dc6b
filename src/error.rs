//! Error types for gacache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving or loading cached values
///
/// Every variant is cheap to clone so a single failed load can be handed to
/// all callers that were coalesced onto it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Empty key, rejected before any lookup
    #[error("Invalid key for group {group}: key must not be empty")]
    InvalidKey { group: String },

    /// Backing store reported that the key does not exist
    #[error("Key {key} not found in source for group {group}")]
    SourceMiss { group: String, key: String },

    /// Backing store failed while loading the key
    #[error("Source load failed for group {group}, key {key}: {reason}")]
    SourceError {
        group: String,
        key: String,
        reason: String,
    },

    /// Peer communication failed
    #[error("Remote fetch from peer {peer} failed: {reason}")]
    RemoteFetch { peer: String, reason: String },

    /// No group registered under the requested name
    #[error("No such group: {0}")]
    GroupNotFound(String),

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Malformed wire payload
    #[error("Failed to decode peer response: {0}")]
    Decode(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors produced by the backing store of a group
    pub fn is_source_error(&self) -> bool {
        matches!(self, Error::SourceMiss { .. } | Error::SourceError { .. })
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Decode(e.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::SourceMiss {
            group: "scores".to_string(),
            key: "tom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scores"));
        assert!(msg.contains("tom"));

        let err = Error::SourceError {
            group: "scores".to_string(),
            key: "tom".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_source_error_classification() {
        assert!(Error::SourceMiss {
            group: "g".into(),
            key: "k".into()
        }
        .is_source_error());
        assert!(!Error::InvalidKey { group: "g".into() }.is_source_error());
        assert!(!Error::RemoteFetch {
            peer: "http://localhost:8001".into(),
            reason: "refused".into()
        }
        .is_source_error());
    }
}
