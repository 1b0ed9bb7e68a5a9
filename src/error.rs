//! Error types for the handoff tracker.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Log sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Contact log errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Append failed: {0}")]
    Append(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Update of row {position} failed: {reason}")]
    Update { position: i64, reason: String },

    #[error("Row {position} not found")]
    RowNotFound { position: i64 },

    #[error("Row has {len} fields, at most {max} supported")]
    TooManyFields { len: usize, max: usize },
}

/// Message source errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Errors raised while applying a transition for one event.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Session store failed: {0}")]
    Session(#[from] DatabaseError),

    #[error("Contact log failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Session {key} is missing {field}")]
    IncompleteSession { key: String, field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_errors_wrap_collaborator_errors() {
        let err: TrackerError = SinkError::RowNotFound { position: 7 }.into();
        assert_eq!(err.to_string(), "Contact log failed: Row 7 not found");

        let err: TrackerError = DatabaseError::Query("get_session: locked".into()).into();
        assert!(err.to_string().starts_with("Session store failed"));
    }

    #[test]
    fn top_level_error_from_config() {
        let err: Error = ConfigError::ParseError("bad json".into()).into();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Failed to parse configuration: bad json"
        );
    }
}
