//! Server-sent-event framing.
//!
//! [`SseDecoder`] turns an arbitrary chunking of the response body into
//! [`RawFrame`]s. It buffers bytes rather than text so a multi-byte
//! character split across two chunks survives.

/// One transport frame: an optional event tag and an optional data segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub event: Option<String>,
    pub data: Option<String>,
    pub id: Option<String>,
}

impl RawFrame {
    /// Creates a tagged frame.
    #[must_use]
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self { event: Some(event.into()), data: Some(data.into()), id: None }
    }

    /// Creates a frame without an event line.
    #[must_use]
    pub fn untagged(data: impl Into<String>) -> Self {
        Self { event: None, data: Some(data.into()), id: None }
    }

    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none() && self.id.is_none()
    }
}

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: RawFrame,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flushes whatever is left once the body ends.
    ///
    /// A final frame without its terminating blank line is still delivered.
    pub fn finish(&mut self) -> Option<RawFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.process_line(line) {
                return Some(frame);
            }
        }
        let frame = std::mem::take(&mut self.pending);
        (!frame.is_empty()).then_some(frame)
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            let frame = std::mem::take(&mut self.pending);
            return (!frame.is_empty()).then_some(frame);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => match &mut self.pending.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            "id" => self.pending.id = Some(value.to_string()),
            // retry and unknown fields
            _ => {}
        }
        None
    }
}
