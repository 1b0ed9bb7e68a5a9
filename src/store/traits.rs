//! Storage traits consumed by the event processor.

use async_trait::async_trait;

use crate::error::{DatabaseError, SinkError};
use crate::pipeline::types::{RowFields, RowPosition, SessionRecord};

/// Durable per-conversation sessions, keyed by conversation key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up the session for a conversation.
    async fn get_session(&self, key: &str) -> Result<Option<SessionRecord>, DatabaseError>;

    /// Create the session, or overwrite the existing one with the same key.
    async fn save_session(&self, session: &SessionRecord) -> Result<(), DatabaseError>;

    /// Delete the session. Deleting a missing session is not an error.
    async fn clear_session(&self, key: &str) -> Result<(), DatabaseError>;
}

/// Append-only contact log with in-place updates by position.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append a row. `None` means the sink accepted the call but has no
    /// position to hand back; callers must not rely on the row existing.
    async fn append_row(&self, row: &RowFields) -> Result<Option<RowPosition>, SinkError>;

    /// Overwrite the non-`None` cells of a previously appended row.
    async fn update_row(&self, position: RowPosition, row: &RowFields) -> Result<(), SinkError>;
}
