//! Shared types for the message-event pipeline.

use std::fmt;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::pipeline::rules::HoldingReply;

// ── Message event ───────────────────────────────────────────────────

/// One message seen on the business account, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Correlation id for logs. Generated when the source omits it.
    #[serde(default = "new_event_id")]
    pub id: String,
    /// True when the business account (agent or bot) sent the message.
    pub from_self: bool,
    /// Sender address.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Raw, untrimmed body.
    pub body: String,
}

fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MessageEvent {
    pub fn new(
        from_self: bool,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            from_self,
            sender: sender.into(),
            recipient: recipient.into(),
            body: body.into(),
        }
    }

    /// The customer side of the conversation.
    pub fn conversation_key(&self) -> &str {
        if self.from_self {
            &self.recipient
        } else {
            &self.sender
        }
    }
}

/// Stream of events delivered by a message source.
pub type EventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

// ── Session record ──────────────────────────────────────────────────

/// Handle of a row in the contact log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowPosition(pub i64);

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-conversation tracking state.
///
/// `option`, `option_selected_at` and `log_row_position` are either all
/// set or all unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation_key: String,
    pub option: Option<String>,
    pub option_selected_at: Option<DateTime<Utc>>,
    pub log_row_position: Option<RowPosition>,
}

impl SessionRecord {
    /// A session whose customer has been shown the menu but not chosen yet.
    pub fn new(conversation_key: impl Into<String>) -> Self {
        Self {
            conversation_key: conversation_key.into(),
            option: None,
            option_selected_at: None,
            log_row_position: None,
        }
    }

    pub fn with_selection(
        mut self,
        option: impl Into<String>,
        selected_at: DateTime<Utc>,
        position: RowPosition,
    ) -> Self {
        self.option = Some(option.into());
        self.option_selected_at = Some(selected_at);
        self.log_row_position = Some(position);
        self
    }

    /// Waiting for the customer to pick a sector.
    pub fn awaiting_selection(&self) -> bool {
        self.option.is_none()
    }

    /// Selection time and log row, when the customer is waiting for an agent.
    pub fn service_window(&self) -> Option<(DateTime<Utc>, RowPosition)> {
        self.option.as_ref()?;
        Some((self.option_selected_at?, self.log_row_position?))
    }
}

// ── Contact log rows ────────────────────────────────────────────────

/// Ordered contact-log cells. `None` leaves a cell untouched on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowFields(Vec<Option<String>>);

impl RowFields {
    pub fn new(fields: Vec<Option<String>>) -> Self {
        Self(fields)
    }

    /// `[customer, sector, timestamp, weekday]`
    pub fn contact(customer: &str, sector: &str, timestamp: &str, weekday: &str) -> Self {
        Self(vec![
            Some(customer.to_string()),
            Some(sector.to_string()),
            Some(timestamp.to_string()),
            Some(weekday.to_string()),
        ])
    }

    /// `[-, -, -, -, reply timestamp, elapsed hours]`
    pub fn reply(timestamp: &str, elapsed_hours: &str) -> Self {
        Self(vec![
            None,
            None,
            None,
            None,
            Some(timestamp.to_string()),
            Some(elapsed_hours.to_string()),
        ])
    }

    pub fn fields(&self) -> &[Option<String>] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|f| f.as_deref())
    }
}

// ── Transitions ─────────────────────────────────────────────────────

/// What an event does to its conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// Menu sent to a customer without a session → open one.
    OpenSession,
    /// Customer picked a sector.
    SelectSector { option: String, sector: String },
    /// Customer asked to change registration or cancel.
    CancelSession,
    /// Agent's first substantive reply → record response time and close.
    CloseWithReply,
    /// Agent transferred the customer to another sector.
    Redirect { sector: String },
    /// Agent sent a holding reply; the customer is still unserved.
    Hold { reply: HoldingReply },
    /// Nothing to do.
    Ignore,
}

impl Transition {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenSession => "open_session",
            Self::SelectSector { .. } => "select_sector",
            Self::CancelSession => "cancel_session",
            Self::CloseWithReply => "close_with_reply",
            Self::Redirect { .. } => "redirect",
            Self::Hold { .. } => "hold",
            Self::Ignore => "ignore",
        }
    }

    /// Whether applying this transition touches the store or the log.
    pub fn has_effects(&self) -> bool {
        !matches!(self, Self::Hold { .. } | Self::Ignore)
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Bulk broadcast; nothing was read or written.
    Suppressed,
    /// Transition applied (possibly a no-op).
    Applied { key: String, transition: Transition },
    /// A collaborator failed; the error has been reported.
    Failed {
        key: String,
        transition: Option<Transition>,
        error: String,
    },
}

impl Outcome {
    pub fn transition(&self) -> Option<&Transition> {
        match self {
            Self::Suppressed => None,
            Self::Applied { transition, .. } => Some(transition),
            Self::Failed { transition, .. } => transition.as_ref(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
