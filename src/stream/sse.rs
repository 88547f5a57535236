//! Incremental `text/event-stream` decoding.

use bytes::{Buf, BytesMut};

use crate::Error;

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` name; `None` means the default `message` type.
    pub event: Option<String>,
    /// The `data:` lines joined with `\n`.
    pub data: String,
    /// The `id:` field, if present.
    pub id: Option<String>,
}

impl SseEvent {
    /// Returns the event type, defaulting to `message`.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Splits a byte stream into events.
///
/// Bytes are buffered until a full line is available, so chunks may split
/// lines and multi-byte characters anywhere. Both `\n` and `\r\n` line
/// endings are accepted.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: BytesMut,
    pending: SseEvent,
    has_data: bool,
}

impl SseDecoder {
    /// Feeds a chunk and returns the events it completed.
    ///
    /// # Errors
    ///
    /// Returns a `Stream` error once a line exceeds [`MAX_LINE_BYTES`]. The
    /// decoder should not be fed again after that.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, Error> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            if pos > MAX_LINE_BYTES {
                return Err(line_too_long());
            }
            let mut line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            self.buffer.clear();
            return Err(line_too_long());
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let event = std::mem::take(&mut self.pending);
            let dispatch = std::mem::take(&mut self.has_data);
            return dispatch.then_some(event);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_owned()),
            "data" => {
                if self.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.pending.id = Some(value.to_owned()),
            _ => {}
        }
        None
    }
}

fn line_too_long() -> Error {
    Error::stream(format!("Event stream line exceeds {} bytes", MAX_LINE_BYTES))
}
