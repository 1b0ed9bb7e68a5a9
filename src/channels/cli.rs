//! Stdin source — one JSON message event per line.
//!
//! ```text
//! {"from_self": false, "sender": "5511999990000@c.us", "recipient": "5511888880000@c.us", "body": "3"}
//! ```

use async_trait::async_trait;
use futures::{StreamExt, future};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::SplitStream;
use tracing::warn;

use crate::channels::MessageSource;
use crate::error::ChannelError;
use crate::pipeline::types::{EventStream, MessageEvent};

/// Reads message events from stdin until EOF.
pub struct StdinSource;

impl StdinSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for StdinSource {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        Ok(event_lines(BufReader::new(tokio::io::stdin())))
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_event_line(line: &str) -> Result<Option<MessageEvent>, ChannelError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| ChannelError::InvalidMessage(e.to_string()))
}

/// Stream of events read line by line from `reader`. Malformed lines, including
/// lines that are not UTF-8, are logged and skipped; the stream ends at EOF or
/// on an I/O error.
pub fn event_lines<R>(reader: R) -> EventStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let stream = SplitStream::new(reader.split(b'\n'))
        .take_while(|line| {
            if let Err(e) = line {
                tracing::error!("Error reading stdin: {}", e);
            }
            future::ready(line.is_ok())
        })
        .enumerate()
        .filter_map(|(index, line)| {
            let event = line.ok().and_then(|bytes| match decode_line(&bytes) {
                Ok(event) => event,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping malformed input line");
                    None
                }
            });
            future::ready(event)
        });

    Box::pin(stream)
}

fn decode_line(bytes: &[u8]) -> Result<Option<MessageEvent>, ChannelError> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| ChannelError::InvalidMessage(format!("not UTF-8: {e}")))?;
    parse_event_line(line)
}
