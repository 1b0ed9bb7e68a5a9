//! Message sources feeding the tracker.

pub mod cli;
pub mod manager;
pub mod webhook;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::pipeline::types::EventStream;

pub use cli::StdinSource;
pub use manager::ChannelManager;
pub use webhook::WebhookSource;

/// A producer of message events.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Source name, for logs.
    fn name(&self) -> &str;

    /// Start producing events. May be called only once.
    async fn start(&self) -> Result<EventStream, ChannelError>;
}
