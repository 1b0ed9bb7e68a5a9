//! Channel manager — starts every source and merges their streams.

use futures::stream;
use tracing::{error, info};

use crate::channels::MessageSource;
use crate::error::ChannelError;
use crate::pipeline::types::EventStream;

/// Owns the configured message sources.
#[derive(Default)]
pub struct ChannelManager {
    sources: Vec<Box<dyn MessageSource>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: Box<dyn MessageSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Start all sources and merge them into one stream.
    ///
    /// A source that fails to start is logged and left out. Fails only when
    /// no source starts.
    pub async fn start_all(&self) -> Result<EventStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.start().await {
                Ok(stream) => {
                    info!(source = source.name(), "Message source started");
                    streams.push(stream);
                }
                Err(e) => {
                    error!(source = source.name(), error = %e, "Message source failed to start");
                }
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".to_string(),
                reason: "no message source started".to_string(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }
}
