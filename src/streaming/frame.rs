//! Incremental parser for AWS event-stream binary frames
//!
//! The managed-model runtime streams responses as binary frames, not SSE.
//! Each frame has the layout:
//!
//! ```text
//! [total_len:4][headers_len:4][prelude_crc:4][headers...][payload...][msg_crc:4]
//! ```
//!
//! Headers are `[name_len:1][name:N][type:1][value_len:2][value:M]`; only
//! type 7 (string) occurs on this wire. The frame's kind is carried in the
//! `:event-type` header (or `:exception-type` for in-band faults).
//!
//! This parser extracts whole frames from an accumulation buffer without
//! pulling in the provider's SDK; CRC fields are skipped.

use crate::errors::ProviderError;

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Prelude size: total length, headers length, prelude CRC
const PRELUDE_LEN: usize = 12;

/// Trailing message CRC size
const MESSAGE_CRC_LEN: usize = 4;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    /// Value of the `:event-type` or `:exception-type` header
    pub event_type: String,

    /// Whether this frame carried `:exception-type`
    pub is_exception: bool,

    /// Raw frame payload
    pub payload: Vec<u8>,
}

/// Incremental binary frame parser
#[derive(Debug)]
pub struct EventFrameParser {
    /// Accumulation buffer
    buffer: Vec<u8>,

    /// Maximum buffer size
    max_buffer_size: usize,
}

impl EventFrameParser {
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

    /// Add bytes and extract every complete frame
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<Vec<EventFrame>, ProviderError> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(ProviderError::MalformedEvent(format!(
                "frame buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some((frame, consumed)) = self.try_parse_frame()? {
            self.buffer.drain(..consumed);
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Attempt to parse one complete frame from the buffer front
    ///
    /// Returns `None` until a whole frame has arrived.
    fn try_parse_frame(&self) -> Result<Option<(EventFrame, usize)>, ProviderError> {
        let buf = &self.buffer;
        if buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let headers_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        // bytes 8..12 are the prelude CRC

        if total_len > self.max_buffer_size {
            return Err(ProviderError::MalformedEvent(format!(
                "frame length {} exceeds maximum {}",
                total_len, self.max_buffer_size
            )));
        }
        if total_len < PRELUDE_LEN + MESSAGE_CRC_LEN {
            return Err(ProviderError::MalformedEvent(format!(
                "frame length {} shorter than prelude and trailer",
                total_len
            )));
        }

        if buf.len() < total_len {
            return Ok(None);
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let payload_end = total_len - MESSAGE_CRC_LEN;
        if headers_end > payload_end {
            return Err(ProviderError::MalformedEvent(format!(
                "frame headers ({} bytes) overrun payload boundary",
                headers_len
            )));
        }

        let headers = Self::parse_headers(&buf[PRELUDE_LEN..headers_end])?;
        let payload = buf[headers_end..payload_end].to_vec();

        let exception = headers
            .iter()
            .find(|(name, _)| name == ":exception-type")
            .map(|(_, value)| value.clone());
        let event_type = match exception {
            Some(ref value) => value.clone(),
            None => headers
                .iter()
                .find(|(name, _)| name == ":event-type")
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
        };

        let frame = EventFrame {
            event_type,
            is_exception: exception.is_some(),
            payload,
        };

        Ok(Some((frame, total_len)))
    }

    /// Parse the header block into (name, value) pairs
    fn parse_headers(mut buf: &[u8]) -> Result<Vec<(String, String)>, ProviderError> {
        let mut headers = Vec::new();

        while !buf.is_empty() {
            let name_len = buf[0] as usize;
            buf = &buf[1..];
            if buf.len() < name_len + 1 {
                return Err(ProviderError::MalformedEvent(
                    "truncated frame header name".to_string(),
                ));
            }
            let name = String::from_utf8_lossy(&buf[..name_len]).to_string();
            buf = &buf[name_len..];

            let header_type = buf[0];
            buf = &buf[1..];
            if header_type != 7 {
                // Only string headers occur on this wire; anything else has
                // an unknown length, so the frame cannot be decoded further
                return Err(ProviderError::MalformedEvent(format!(
                    "unsupported frame header type {} for {}",
                    header_type, name
                )));
            }

            if buf.len() < 2 {
                return Err(ProviderError::MalformedEvent(
                    "truncated frame header value length".to_string(),
                ));
            }
            let value_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
            buf = &buf[2..];
            if buf.len() < value_len {
                return Err(ProviderError::MalformedEvent(
                    "truncated frame header value".to_string(),
                ));
            }
            let value = String::from_utf8_lossy(&buf[..value_len]).to_string();
            buf = &buf[value_len..];

            headers.push((name, value));
        }

        Ok(headers)
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

impl Default for EventFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_block = Vec::new();
    for (name, value) in headers {
        header_block.push(name.len() as u8);
        header_block.extend_from_slice(name.as_bytes());
        header_block.push(7u8);
        header_block.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_block.extend_from_slice(value.as_bytes());
    }

    let total_len = PRELUDE_LEN + header_block.len() + payload.len() + MESSAGE_CRC_LEN;
    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&(total_len as u32).to_be_bytes());
    frame.extend_from_slice(&(header_block.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0u8; 4]); // prelude CRC, not checked
    frame.extend_from_slice(&header_block);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0u8; 4]); // message CRC, not checked
    frame
}
