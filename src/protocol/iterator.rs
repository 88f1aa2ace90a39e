//! Inbound datagram cursor.
//!
//! Every read is bounds-checked first, so a truncated reply surfaces as
//! [`DbError::Decode`] rather than a panic.

use bytes::Buf;

use crate::error::{DbError, Result};

/// Decoded server header of an inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHeader {
    /// Channels the datagram was addressed to.
    pub recipients: Vec<u64>,
    /// Channel of the sender.
    pub sender: u64,
    /// Message type.
    pub msg_type: u16,
}

/// Read cursor over a datagram body.
#[derive(Debug, Clone)]
pub struct DatagramIterator<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> DatagramIterator<'a> {
    /// Create a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buf: data,
            len: data.len(),
        }
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Check whether every byte has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Offset of the cursor from the start of the datagram.
    #[inline]
    pub fn position(&self) -> usize {
        self.len - self.buf.len()
    }

    #[inline]
    fn need(&self, what: &str, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(DbError::truncated(what, n, self.buf.remaining()));
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.need("uint8", 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.need("uint16", 2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need("uint32", 4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.need("uint64", 8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_i8(&mut self) -> Result<i8> {
        self.need("int8", 1)?;
        Ok(self.buf.get_i8())
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        self.need("int16", 2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.need("int32", 4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.need("int64", 8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.need("float64", 8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Read `n` raw bytes without copying.
    pub fn get_data(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need("data", n)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Read a server header (recipients, sender, message type).
    pub fn read_server_header(&mut self) -> Result<ServerHeader> {
        let count = self.get_u8()?;
        let mut recipients = Vec::with_capacity(count as usize);
        for _ in 0..count {
            recipients.push(self.get_u64()?);
        }
        let sender = self.get_u64()?;
        let msg_type = self.get_u16()?;
        Ok(ServerHeader {
            recipients,
            sender,
            msg_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Datagram;

    #[test]
    fn test_reads_in_order() {
        let mut dg = Datagram::new();
        dg.add_u8(7);
        dg.add_u16(300);
        dg.add_u32(70_000);
        dg.add_u64(1 << 40);
        dg.add_i16(-5);
        dg.add_f64(2.5);

        let mut di = DatagramIterator::new(dg.as_bytes());
        assert_eq!(di.get_u8().unwrap(), 7);
        assert_eq!(di.get_u16().unwrap(), 300);
        assert_eq!(di.get_u32().unwrap(), 70_000);
        assert_eq!(di.get_u64().unwrap(), 1 << 40);
        assert_eq!(di.get_i16().unwrap(), -5);
        assert_eq!(di.get_f64().unwrap(), 2.5);
        assert!(di.is_empty());
    }

    #[test]
    fn test_truncated_read_fails_without_consuming() {
        let data = [0x01, 0x02, 0x03];
        let mut di = DatagramIterator::new(&data);

        let err = di.get_u32().unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
        assert_eq!(di.remaining(), 3);
        assert_eq!(di.get_u16().unwrap(), 0x0201);
        assert_eq!(di.position(), 2);
    }

    #[test]
    fn test_get_data_zero_copy() {
        let data = b"abcdef";
        let mut di = DatagramIterator::new(data);
        let head = di.get_data(4).unwrap();

        assert_eq!(head, b"abcd");
        assert_eq!(head.as_ptr(), data.as_ptr());
        assert!(di.get_data(3).is_err());
    }

    #[test]
    fn test_read_server_header() {
        let mut dg = Datagram::new();
        dg.add_server_header(&[10, 20], 99, 3001);
        dg.add_u32(5);

        let mut di = DatagramIterator::new(dg.as_bytes());
        let header = di.read_server_header().unwrap();

        assert_eq!(header.recipients, vec![10, 20]);
        assert_eq!(header.sender, 99);
        assert_eq!(header.msg_type, 3001);
        assert_eq!(di.get_u32().unwrap(), 5);
    }

    #[test]
    fn test_truncated_server_header() {
        let data = [2, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut di = DatagramIterator::new(&data);
        assert!(di.read_server_header().is_err());
    }
}
