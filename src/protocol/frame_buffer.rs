//! Frame buffer for accumulating partial reads.
//!
//! The message director frames every datagram on the TCP stream with a
//! `uint16` Little Endian length. Uses `bytes::BytesMut` for zero-copy buffer
//! management and a state machine for fragmented datagrams:
//! - `WaitingForLength`: Need at least 2 bytes
//! - `WaitingForBody`: Length parsed, need N more bytes
//!
//! # Example
//!
//! ```
//! use astron_db_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! let datagrams = buffer.push(&[3, 0, b'a', b'b']).unwrap();
//! assert!(datagrams.is_empty());
//!
//! let datagrams = buffer.push(&[b'c']).unwrap();
//! assert_eq!(&datagrams[0][..], b"abc");
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{DbError, Result};

/// Size of the length prefix in front of every datagram.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest datagram the length prefix can describe.
pub const MAX_DATAGRAM_SIZE: usize = u16::MAX as usize;

/// State machine for datagram parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the 2-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for body bytes.
    WaitingForBody { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete datagrams.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum accepted datagram size.
    max_datagram_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max datagram: 65535 bytes.
    pub fn new() -> Self {
        Self::with_max_datagram(MAX_DATAGRAM_SIZE)
    }

    /// Create a new frame buffer that rejects datagrams above `max_datagram_size`.
    pub fn with_max_datagram(max_datagram_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_datagram_size: max_datagram_size.min(MAX_DATAGRAM_SIZE),
        }
    }

    /// Push data into the buffer and extract all complete datagrams.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a datagram exceeds the configured maximum.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut datagrams = Vec::new();
        while let Some(datagram) = self.try_extract_one()? {
            datagrams.push(datagram);
        }

        Ok(datagrams)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::WaitingForLength => {
                    if self.buffer.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let length = u16::from_le_bytes([self.buffer[0], self.buffer[1]]) as usize;
                    if length > self.max_datagram_size {
                        return Err(DbError::Protocol(format!(
                            "Datagram size {} exceeds maximum {}",
                            length, self.max_datagram_size
                        )));
                    }

                    let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                    self.state = State::WaitingForBody { remaining: length };
                }

                State::WaitingForBody { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let body = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForLength;
                    return Ok(Some(body));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode the length prefix for a datagram body.
///
/// # Errors
///
/// Returns error if the body does not fit a `uint16` length.
pub fn length_prefix(body_len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE]> {
    if body_len > MAX_DATAGRAM_SIZE {
        return Err(DbError::Protocol(format!(
            "Datagram size {} exceeds maximum {}",
            body_len, MAX_DATAGRAM_SIZE
        )));
    }
    Ok((body_len as u16).to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut bytes = length_prefix(body.len()).unwrap().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_single_complete_datagram() {
        let mut buffer = FrameBuffer::new();
        let datagrams = buffer.push(&framed(b"hello")).unwrap();

        assert_eq!(datagrams.len(), 1);
        assert_eq!(&datagrams[0][..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_datagrams_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = framed(b"first");
        combined.extend(framed(b"second"));
        combined.extend(framed(b"third"));

        let datagrams = buffer.push(&combined).unwrap();

        assert_eq!(datagrams.len(), 3);
        assert_eq!(&datagrams[1][..], b"second");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_length() {
        let mut buffer = FrameBuffer::new();
        let bytes = framed(b"test");

        assert!(buffer.push(&bytes[..1]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForLength");

        let datagrams = buffer.push(&bytes[1..]).unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(&datagrams[0][..], b"test");
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new();
        let body = b"this is a longer body that will be fragmented";
        let bytes = framed(body);

        let split = LENGTH_PREFIX_SIZE + 10;
        assert!(buffer.push(&bytes[..split]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        let datagrams = buffer.push(&bytes[split..]).unwrap();
        assert_eq!(&datagrams[0][..], body);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_datagram() {
        let mut buffer = FrameBuffer::new();
        let datagrams = buffer.push(&[0, 0]).unwrap();

        assert_eq!(datagrams.len(), 1);
        assert!(datagrams[0].is_empty());
    }

    #[test]
    fn test_max_datagram_validation() {
        let mut buffer = FrameBuffer::with_max_datagram(100);
        let result = buffer.push(&1000u16.to_le_bytes());

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_length_prefix_rejects_oversize() {
        assert!(length_prefix(MAX_DATAGRAM_SIZE).is_ok());
        assert!(length_prefix(MAX_DATAGRAM_SIZE + 1).is_err());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = framed(b"hi");

        let mut all = Vec::new();
        for byte in &bytes {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(&all[0][..], b"hi");
    }
}
