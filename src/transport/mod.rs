//! Transport module - the message bus the database client talks through.
//!
//! Provides:
//! - [`Transport`] - the seam consumed by [`DatabaseClient`](crate::DatabaseClient)
//! - [`ContextCounter`] - monotonic context IDs
//! - [`MemoryTransport`] - records datagrams instead of sending them
//! - [`MdConnection`] - TCP connection to an Astron message director

mod connection;
mod memory;

pub use connection::{ConnectionBuilder, ConnectionConfig, Inbound, MdConnection};
pub use memory::MemoryTransport;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::protocol::Datagram;

/// Outbound side of the message bus.
///
/// Methods take `&self`: a continuation may send through the same client
/// while a reply is being dispatched.
pub trait Transport {
    /// Fresh context ID, unique among requests in flight.
    fn next_context(&self) -> u32;

    /// Channel replies are addressed to; the sender of every request.
    fn self_channel(&self) -> u64;

    /// Hand a complete datagram to the bus. Fire-and-forget.
    fn send(&self, datagram: Datagram) -> Result<()>;
}

/// Monotonically increasing context IDs, starting at 1.
#[derive(Debug)]
pub struct ContextCounter {
    next: AtomicU64,
}

impl ContextCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Counter whose first ID is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU64::new(first as u64),
        }
    }

    /// Take the next context ID.
    ///
    /// # Panics
    ///
    /// Panics once all `u32` IDs have been handed out.
    pub fn next_id(&self) -> u32 {
        let next = self.next.fetch_add(1, Ordering::Relaxed);
        u32::try_from(next).unwrap_or_else(|_| panic!("context ID space exhausted"))
    }
}

impl Default for ContextCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_one() {
        let counter = ContextCounter::new();
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
        assert_eq!(counter.next_id(), 3);
    }

    #[test]
    fn test_counter_reaches_max() {
        let counter = ContextCounter::starting_at(u32::MAX);
        assert_eq!(counter.next_id(), u32::MAX);
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn test_counter_exhaustion_panics() {
        let counter = ContextCounter::starting_at(u32::MAX);
        counter.next_id();
        counter.next_id();
    }
}
