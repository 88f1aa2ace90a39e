//! In-memory transport that records outbound datagrams.

use std::cell::{Cell, Ref, RefCell};

use crate::error::{DbError, Result};
use crate::protocol::Datagram;

use super::{ContextCounter, Transport};

/// Transport that keeps every sent datagram in a list.
///
/// Replies are fed to the client by hand through
/// [`DatabaseClient::handle_datagram`](crate::DatabaseClient::handle_datagram).
#[derive(Debug, Default)]
pub struct MemoryTransport {
    self_channel: u64,
    contexts: ContextCounter,
    sent: RefCell<Vec<Datagram>>,
    closed: Cell<bool>,
}

impl MemoryTransport {
    pub fn new(self_channel: u64) -> Self {
        Self {
            self_channel,
            ..Self::default()
        }
    }

    /// Datagrams sent so far, oldest first.
    pub fn sent(&self) -> Ref<'_, [Datagram]> {
        Ref::map(self.sent.borrow(), Vec::as_slice)
    }

    /// Take the recorded datagrams, leaving the list empty.
    pub fn take_sent(&self) -> Vec<Datagram> {
        self.sent.take()
    }

    /// Make every later `send` fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.closed.set(true);
    }
}

impl Transport for MemoryTransport {
    fn next_context(&self) -> u32 {
        self.contexts.next_id()
    }

    fn self_channel(&self) -> u64 {
        self.self_channel
    }

    fn send(&self, datagram: Datagram) -> Result<()> {
        if self.closed.get() {
            return Err(DbError::ConnectionClosed);
        }
        self.sent.borrow_mut().push(datagram);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sent_datagrams() {
        let transport = MemoryTransport::new(4000);
        assert_eq!(transport.self_channel(), 4000);

        transport.send(Datagram::control(9000)).unwrap();
        transport.send(Datagram::control(9001)).unwrap();
        assert_eq!(transport.sent().len(), 2);

        let taken = transport.take_sent();
        assert_eq!(taken.len(), 2);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_contexts_are_sequential() {
        let transport = MemoryTransport::new(1);
        assert_eq!(transport.next_context(), 1);
        assert_eq!(transport.next_context(), 2);
    }

    #[test]
    fn test_closed_rejects_send() {
        let transport = MemoryTransport::new(1);
        transport.close();
        assert!(matches!(
            transport.send(Datagram::new()),
            Err(DbError::ConnectionClosed)
        ));
        assert!(transport.sent().is_empty());
    }
}
