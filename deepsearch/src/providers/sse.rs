//! Incremental Server-Sent Events parser.
//!
//! Bytes arrive in arbitrary chunks; complete events are returned as soon as
//! their terminating blank line has been seen.

/// A parsed Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event_type: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Whether this event is the `[DONE]` sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Line-oriented SSE parser with an internal buffer for partial lines.
///
/// Buffers raw bytes so that multi-byte characters split across chunks are
/// decoded intact.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl SseLineParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Emits whatever is pending once the byte stream has ended.
    pub fn flush(&mut self) -> Option<SseEvent> {
        let raw = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&raw);
        let rest = rest.trim_end_matches(['\n', '\r']);
        if !rest.is_empty() {
            // A trailing line without newline still counts.
            let _ = self.process_line(rest);
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event_type = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event_type = None;
            return None;
        }
        Some(SseEvent {
            event_type: self.event_type.take(),
            data: std::mem::take(&mut self.data_lines).join("\n"),
        })
    }
}
