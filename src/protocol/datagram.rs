//! Outbound datagram builder.
//!
//! All multi-byte integers are Little Endian. A server-bound datagram starts
//! with a server header:
//! ```text
//! ┌───────────┬─────────────────┬──────────┬──────────┐
//! │ Count     │ Recipients      │ Sender   │ Msg type │
//! │ uint8     │ uint64 × count  │ uint64   │ uint16   │
//! └───────────┴─────────────────┴──────────┴──────────┘
//! ```
//! Control datagrams carry a single recipient, `CONTROL_CHANNEL`, and no sender.
//!
//! # Example
//!
//! ```
//! use astron_db_client::protocol::{msgtypes, Datagram};
//!
//! let mut dg = Datagram::server(4003, 0xABCD, msgtypes::DBSERVER_OBJECT_GET_ALL);
//! dg.add_u32(1); // context
//! dg.add_u32(10001); // doId
//! assert_eq!(dg.len(), 1 + 8 + 8 + 2 + 4 + 4);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::msgtypes::CONTROL_CHANNEL;

/// Size of a server header addressed to one recipient.
pub const SERVER_HEADER_SIZE: usize = 1 + 8 + 8 + 2;

/// A datagram under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datagram {
    buf: BytesMut,
}

impl Datagram {
    /// Create an empty datagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty datagram with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Create a datagram that starts with a single-recipient server header.
    pub fn server(recipient: u64, sender: u64, msg_type: u16) -> Self {
        let mut dg = Self::with_capacity(64);
        dg.add_server_header(&[recipient], sender, msg_type);
        dg
    }

    /// Create a datagram that starts with a control header.
    pub fn control(msg_type: u16) -> Self {
        let mut dg = Self::with_capacity(32);
        dg.add_u8(1);
        dg.add_u64(CONTROL_CHANNEL);
        dg.add_u16(msg_type);
        dg
    }

    /// Append a server header addressed to `recipients`.
    ///
    /// # Panics
    ///
    /// Panics if more than 255 recipients are given.
    pub fn add_server_header(&mut self, recipients: &[u64], sender: u64, msg_type: u16) {
        assert!(recipients.len() <= u8::MAX as usize, "too many recipients");
        self.add_u8(recipients.len() as u8);
        for &channel in recipients {
            self.add_u64(channel);
        }
        self.add_u64(sender);
        self.add_u16(msg_type);
    }

    #[inline]
    pub fn add_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn add_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    #[inline]
    pub fn add_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    #[inline]
    pub fn add_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    #[inline]
    pub fn add_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    #[inline]
    pub fn add_i16(&mut self, v: i16) {
        self.buf.put_i16_le(v);
    }

    #[inline]
    pub fn add_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    #[inline]
    pub fn add_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    #[inline]
    pub fn add_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    /// Append raw bytes with no length prefix.
    #[inline]
    pub fn add_data(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append the contents of another datagram.
    pub fn append(&mut self, other: &Datagram) {
        self.buf.extend_from_slice(&other.buf);
    }

    /// Get the datagram length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the datagram is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Get a reference to the encoded bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze into immutable `Bytes` for handing to a writer.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
