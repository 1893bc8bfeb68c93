//! Server-Sent Events decoding
//!
//! Incremental `text/event-stream` parser. Bytes are pushed in as they
//! arrive from the HTTP body; complete events come out once their
//! terminating blank line has been seen.

/// A dispatched event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Event name (`message` when the stream did not name it)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id, if the event carried one
    pub id: Option<String>,
}

/// Incremental decoder state
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the stream, returning every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
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
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"id:abc\nevent:PB_CONNECT\ndata:{\"clientId\":\"abc\"}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "PB_CONNECT");
        assert_eq!(events[0].data, "{\"clientId\":\"abc\"}");
        assert_eq!(events[0].id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: tasks/*\nda").is_empty());
        assert!(decoder.push(b"ta: {\"action\":\"create\"}\r\n").is_empty());
        let events = decoder.push(b"\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "tasks/*");
        assert_eq!(events[0].data, "{\"action\":\"create\"}");
    }

    #[test]
    fn test_multiline_data_and_default_name() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: one\ndata: two\n\n");

        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_comments_and_empty_events_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: noop\n\ndata: x\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
        assert_eq!(events[0].event, "message");
    }
}
