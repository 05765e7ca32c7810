//! Incremental decoder for `text/event-stream` bodies.

/// A complete server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`message` when the server sent no `event:` field)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Stateful SSE event decoder
///
/// Bytes are pushed as they arrive from the network. Complete events are
/// returned once their terminating blank line has been seen; partial lines and
/// partially-built events stay buffered for the next `push()`.
///
/// ```
/// use cbchat::mcp::sse::{SseDecoder, SseEvent};
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"event: endpoint\ndata: /messages?sess").is_empty());
/// let events = decoder.push(b"ion_id=42\n\n");
/// assert_eq!(events, vec![SseEvent::new("endpoint", "/messages?session_id=42")]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and extract complete events
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Reset at end of stream
    ///
    /// An event that was never terminated by a blank line is discarded, as is
    /// any trailing partial line. Returns `true` if anything was dropped.
    pub fn finish(&mut self) -> bool {
        let discarded = !self.buffer.is_empty() || !self.data.is_empty();
        self.buffer.clear();
        self.data.clear();
        self.event = None;
        discarded
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry carry no meaning for this client
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
