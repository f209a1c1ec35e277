//! Incremental parser for server-sent event streams
//!
//! Accumulates raw response bytes and extracts complete `data:` payloads
//! as they become available:
//! - Buffer: 1MB maximum
//! - Algorithm: O(n) single pass over newly appended bytes
//! - One payload per `data:` line, in wire arrival order

use crate::errors::ProviderError;

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Incremental SSE line parser
#[derive(Debug)]
pub struct SseParser {
    /// Accumulation buffer holding the current incomplete line
    buffer: Vec<u8>,

    /// Maximum buffer size
    max_buffer_size: usize,
}

impl SseParser {
    /// Create new parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer capacity
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and extract every complete `data:` payload
    ///
    /// Lines without the `data:` field name (blank separators, `:` comment
    /// lines, other field names) are skipped. A partial trailing line stays
    /// buffered until its newline arrives.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<Vec<String>, ProviderError> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(ProviderError::MalformedEvent(format!(
                "SSE buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }

            if let Some(payload) = Self::data_payload(line) {
                payloads.push(payload);
            }
        }

        Ok(payloads)
    }

    /// Extract the payload of a `data:` line, if this is one
    fn data_payload(line: &[u8]) -> Option<String> {
        let rest = line.strip_prefix(b"data:")?;
        // A single leading space after the colon is part of the framing
        let rest = rest.strip_prefix(b" ").unwrap_or(rest);
        Some(String::from_utf8_lossy(rest).to_string())
    }

    /// Get current buffer size
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}
