//! Protocol module - datagrams, message types and stream framing.
//!
//! This module implements the wire side of the message director protocol:
//! - [`Datagram`] builder with server and control headers
//! - [`DatagramIterator`] bounds-checked reader
//! - [`FrameBuffer`] for splitting the `uint16`-length-prefixed TCP stream
//! - [`msgtypes`] constants

mod datagram;
mod frame_buffer;
mod iterator;
pub mod msgtypes;

pub use datagram::{Datagram, SERVER_HEADER_SIZE};
pub use frame_buffer::{length_prefix, FrameBuffer, LENGTH_PREFIX_SIZE, MAX_DATAGRAM_SIZE};
pub use iterator::{DatagramIterator, ServerHeader};
