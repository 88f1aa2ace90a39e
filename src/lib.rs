//! # astron-db-client
//!
//! Rust client for the Astron database server protocol.
//!
//! This crate lets an Astron participant create, query and update
//! distributed objects stored by a database server, addressed through a
//! message director.
//!
//! ## Architecture
//!
//! - **Schema** ([`dclass`]): classes, fields and DC parameter types
//! - **Codec** ([`codec`]): packing typed field values
//! - **Requests and replies** ([`DatabaseClient`]): context-correlated
//!   requests whose continuations run when the matching reply is dispatched
//! - **Transport** ([`transport`]): the message bus, in memory or over TCP
//!
//! The client is single-threaded: requests are issued and replies
//! dispatched from the same task, and continuations run synchronously
//! inside the dispatcher.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use astron_db_client::{DatabaseClient, DcSchema, MdConnection};
//!
//! #[tokio::main]
//! async fn main() -> astron_db_client::Result<()> {
//!     let schema = DcSchema::from_json(&std::fs::read_to_string("schema.json")?)?;
//!     let conn = MdConnection::builder(4_000_000).connect("127.0.0.1:7199").await?;
//!     let client = DatabaseClient::new(conn, Arc::new(schema));
//!
//!     client.query_object(4003, 10001, None, &[], |result| {
//!         println!("{:?}", result);
//!     })?;
//!
//!     loop {
//!         client.recv_and_dispatch().await?;
//!     }
//! }
//! ```

pub mod codec;
pub mod context;
pub mod dclass;
pub mod error;
pub mod protocol;
pub mod transport;

mod client;
mod writer;

pub use client::{DatabaseClient, Dispatch};
pub use context::{ObjectFields, UpdateOutcome};
pub use dclass::{DClass, DcSchema, FieldMap, FieldValue, SchemaRegistry};
pub use error::{DbError, Result};
pub use transport::{MdConnection, MemoryTransport, Transport};
