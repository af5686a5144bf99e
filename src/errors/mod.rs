//! Error types for the live-update hub
//!
//! Transport and decode failures are contained where they happen (one
//! connection, one notification); these variants exist so that the
//! containment points can log what went wrong.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timed out after {millis}ms")]
    WriteTimeout { millis: u64 },

    #[error("Connection {id} is closed")]
    ConnectionClosed { id: String },

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Subscription to '{topic}' ended")]
    SubscriptionClosed { topic: String },

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Invalid hub state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HubError {
    /// Errors that mean the peer is gone and the connection must be closed
    pub fn is_connection_broken(&self) -> bool {
        matches!(
            self,
            HubError::Transport(_) | HubError::WriteTimeout { .. } | HubError::ConnectionClosed { .. }
        )
    }
}

pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_broken_classification() {
        assert!(HubError::Transport("reset".into()).is_connection_broken());
        assert!(HubError::WriteTimeout { millis: 3000 }.is_connection_broken());
        assert!(!HubError::Config("bad".into()).is_connection_broken());
        assert!(!HubError::SubscriptionClosed {
            topic: "websocket_events".into()
        }
        .is_connection_broken());
    }

    #[test]
    fn test_display_messages() {
        let err = HubError::InvalidState {
            expected: "created",
            found: "closed",
        };
        assert_eq!(err.to_string(), "Invalid hub state: expected created, found closed");
    }
}
