//! Server-Sent Events (SSE) parser.
//!
//! SSE lines can span multiple TCP packets, and so can the bytes of a
//! single UTF-8 character. Incomplete sequences are carried to the next read;
//! line buffering is delegated to [`LineReassembler`] and this module only
//! groups fields into events.

use std::fmt;

use codeforge_core::LineReassembler;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// The event type (from "event:" line)
    pub event: Option<String>,
    /// The event data (from "data:" lines)
    pub data: String,
}

impl SseEvent {
    /// Check if this is a [DONE] marker.
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }
}

/// SSE parser that handles line buffering across TCP packets.
#[derive(Default)]
pub struct SseParser {
    /// Trailing bytes of an incomplete UTF-8 sequence
    carry: Vec<u8>,
    lines: LineReassembler,
    current_event: Option<String>,
    current_data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and return any complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.carry.extend_from_slice(bytes);
        let text = self.decode_carry();
        self.feed_str(&text)
    }

    /// Take the longest decodable prefix of the carry buffer.
    ///
    /// Invalid sequences become U+FFFD; an incomplete sequence at the end
    /// stays buffered until more bytes arrive.
    fn decode_carry(&mut self) -> String {
        let mut text = String::new();
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.carry[consumed..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.carry.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.carry[consumed..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + bad;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.carry.drain(..consumed);
        text
    }

    /// Feed a string into the parser.
    pub fn feed_str(&mut self, text: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for line in self.lines.feed(text) {
            // Empty line signals end of event
            if line.is_empty() {
                events.extend(self.finalize_event());
                continue;
            }

            match Self::parse_field(&line) {
                Some(("event", value)) => self.current_event = Some(value.to_string()),
                Some(("data", value)) => self.current_data.push(value.to_string()),
                // Comments and fields we don't use (id, retry)
                _ => {}
            }
        }

        events
    }

    /// Parse a single SSE field line; `None` for comments.
    fn parse_field(line: &str) -> Option<(&str, &str)> {
        if line.starts_with(':') {
            return None;
        }

        match line.split_once(':') {
            Some((field, value)) => Some((field, value.strip_prefix(' ').unwrap_or(value))),
            None => Some((line, "")),
        }
    }

    fn finalize_event(&mut self) -> Option<SseEvent> {
        let event = self.current_event.take();
        if self.current_data.is_empty() {
            return None;
        }

        let data = self.current_data.join("\n");
        self.current_data.clear();
        Some(SseEvent { event, data })
    }

    /// Check if there's any buffered data.
    pub fn has_buffered_data(&self) -> bool {
        !self.carry.is_empty() || self.lines.has_pending() || !self.current_data.is_empty()
    }
}

impl fmt::Debug for SseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseParser")
            .field("carry_len", &self.carry.len())
            .field("buffer_len", &self.lines.pending_len())
            .field("current_data_lines", &self.current_data.len())
            .finish()
    }
}
