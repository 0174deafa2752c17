//! Error types for pactum.

use thiserror::Error;

/// Result type alias for pactum operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pactum operations.
#[derive(Error, Debug)]
pub enum Error {
    // State machine errors
    #[error("invalid transition: trigger {trigger} not valid in state {state}")]
    InvalidTransition { state: String, trigger: String },

    // Record store errors
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    #[error("ambiguous match: query matched {0} records, expected exactly one")]
    AmbiguousMatch(usize),

    #[error("wallet closed")]
    WalletClosed,

    // Envelope errors
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    #[error("deserialization failure: {0}")]
    DeserializationFailure(String),

    #[error("unknown key: {0}")]
    UnknownKey(String),

    // Dispatch errors
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("missing message type discriminator")]
    MissingMessageType,

    // External collaborator errors
    #[error("external service failure ({service}): {reason}")]
    ExternalServiceFailure { service: String, reason: String },

    // Serialization errors
    #[error("serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a collaborator failure, preserving which service produced it.
    pub fn external(service: &str, reason: impl std::fmt::Display) -> Self {
        Error::ExternalServiceFailure {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        Error::DecryptionFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_wraps_service_name() {
        let err = Error::external("ledger", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("ledger"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_serde_error_converts() {
        let bad: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::SerializationError(_)));
    }
}
