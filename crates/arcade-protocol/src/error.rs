//! Error types for the live-encounter subsystem.

use thiserror::Error;

/// Failures of a single stream invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Explicit cancellation. Never shown to the user as a failure.
    #[error("stream aborted")]
    Aborted,
    #[error("network response was not ok: {status}")]
    Status { status: u16 },
    #[error("{0}")]
    Transport(String),
}

impl StreamError {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// A single frame whose payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to parse {event_type} payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the best-effort progress refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("world progress fetch failed: {status}")]
    Status { status: u16 },
    #[error("world progress transport error: {0}")]
    Transport(String),
}

/// Convenience result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_message_names_the_code() {
        let err = StreamError::Status { status: 502 };
        assert_eq!(err.to_string(), "network response was not ok: 502");
        assert!(!err.is_abort());
        assert!(StreamError::Aborted.is_abort());
    }

    #[test]
    fn transport_error_displays_the_bare_message() {
        let err = StreamError::Transport("connection reset".into());
        assert_eq!(err.to_string(), "connection reset");
    }
}
