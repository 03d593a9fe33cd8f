//! Incremental decoding of the live event stream.
//!
//! A raw byte chunk may end in the middle of a multi-byte character or in
//! the middle of an SSE record; both kinds of partial state are carried
//! across `feed` calls and drained by `flush` when the connection closes.
//!
//! `[DONE]` payloads are inert at this layer; terminator semantics belong
//! to the translator, not the decoder.

use serde_json::Value;

/// Event names used by the agent protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    System,
    Message,
    Delta,
    Other(String),
}

impl EventKind {
    fn from_name(name: &str) -> Self {
        match name {
            "system" => Self::System,
            "message" => Self::Message,
            "delta" => Self::Delta,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Payload of a decoded event: JSON when it parses, the raw text otherwise.
/// Diagnostic and system events are not always JSON, so a parse failure is
/// not an error here.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Json(Value),
    Raw(String),
}

impl EventPayload {
    fn parse(data: String) -> Self {
        match serde_json::from_str::<Value>(data.trim()) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(data),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// One decoded unit from the live connection. Ephemeral; consumed by the
/// translator the instant it is produced.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: EventPayload,
}

/// Push-based SSE decoder with UTF-8 boundary state.
///
/// Records are separated by blank lines; an `event:` line sets the event
/// type; one or more `data:` lines are newline-joined to form the payload;
/// `:` comment lines are ignored. Both `\n` and `\r\n` line endings are
/// accepted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Undecoded trailing bytes of a split multi-byte character.
    carry: Vec<u8>,
    /// Decoded text not yet consumed as complete lines.
    buffer: String,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte chunk, yielding all records completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let text = self.decode_utf8(bytes);
        self.buffer.push_str(&text);
        self.drain_lines()
    }

    /// Drain any buffered trailing record when the connection ends.
    pub fn flush(&mut self) -> Option<StreamEvent> {
        if !self.carry.is_empty() {
            self.buffer.push(char::REPLACEMENT_CHARACTER);
            self.carry.clear();
        }
        if !self.buffer.is_empty() {
            let mut line = std::mem::take(&mut self.buffer);
            if line.ends_with('\r') {
                line.pop();
            }
            self.handle_line(&line);
        }
        self.dispatch()
    }

    /// Decode as much of `carry + bytes` as forms valid UTF-8, carrying an
    /// incomplete trailing sequence to the next call and replacing invalid
    /// sequences with U+FFFD.
    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest = buf.as_slice();
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[invalid..];
                        }
                        None => {
                            self.carry = tail.to_vec();
                            rest = &[];
                        }
                    }
                }
            }
        }
        out
    }

    fn drain_lines(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.handle_line(&line);
            }
        }
        events
    }

    fn handle_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // `id` and `retry` have no meaning for this protocol.
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        if self.data_lines.is_empty() {
            self.event_name = None;
            return None;
        }
        let name = self
            .event_name
            .take()
            .unwrap_or_else(|| "message".to_string());
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(StreamEvent {
            kind: EventKind::from_name(&name),
            payload: EventPayload::parse(data),
        })
    }
}
