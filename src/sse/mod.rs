// Incremental decoder for the `event:` / `data:` streams served by the backend.

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// One decoded `(event, data)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Turns network reads into frames.
///
/// Reads may split a line, or a multi-byte character, anywhere. Each `data:`
/// line consumes the pending event name, so one data line is one frame.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    buffer: String,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.decode_utf8(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(frame) = self.process_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes whatever is left once the body has ended.
    pub fn finish(mut self) -> Vec<SseFrame> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.buffer.push_str(&tail);
        }

        let mut frames = self.feed(&[]);
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(frame) = self.process_line(&rest) {
                frames.push(frame);
            }
        }
        frames
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        self.pending_bytes.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending_bytes.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match err.error_len() {
                        // truncated sequence: wait for the next read
                        None => {
                            self.pending_bytes.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            self.event = None;
            return None;
        }

        if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
            self.event = Some(name.trim().to_string());
            return None;
        }

        if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            let event = self.event.take()?;
            let data = data.trim();
            if event.is_empty() || data.is_empty() {
                tracing::trace!("Dropping data line without event or payload");
                return None;
            }
            return Some(SseFrame::new(event, data));
        }

        None
    }
}
