use thiserror::Error;

use crate::identity::{ConnectionId, VisitorIdentity};

/// Errors from session store operations (used by trait definitions in
/// relaydesk-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("session not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from archive artifact writes.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(String),

    #[error("archive serialization error: {0}")]
    Serialization(String),
}

/// Errors from relay operations.
///
/// The WebSocket layer logs these at its per-event boundary and carries on;
/// a failing event never tears down the connection loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no session for identity '{0}'")]
    UnknownIdentity(VisitorIdentity),

    #[error("connection {0} has not identified")]
    Unidentified(ConnectionId),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_unknown_identity_display() {
        let err = RelayError::UnknownIdentity(VisitorIdentity::derive("Ana"));
        assert_eq!(err.to_string(), "no session for identity 'ana'");
    }

    #[test]
    fn test_payload_too_large_display() {
        let err = RelayError::PayloadTooLarge {
            size: 600,
            limit: 512,
        };
        assert!(err.to_string().contains("600"));
        assert!(err.to_string().contains("512"));
    }

    #[test]
    fn test_store_error_converts_into_relay_error() {
        let err: RelayError = StoreError::NotFound.into();
        assert!(matches!(err, RelayError::Store(StoreError::NotFound)));
    }
}
