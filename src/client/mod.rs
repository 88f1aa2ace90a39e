//! Database client facade.
//!
//! [`DatabaseClient`] owns the context table and a [`Transport`]. Request
//! builders validate and pack everything before a context is taken, so a
//! request-side error never leaves a record behind or puts a datagram on the
//! bus. Replies are fed back through [`DatabaseClient::handle`] (message type
//! already read) or [`DatabaseClient::handle_datagram`] (whole datagram).
//!
//! Every method takes `&self`. The dispatcher releases the context record
//! before running its continuation, so a continuation holding an
//! `Rc<DatabaseClient<_>>` can issue follow-up requests, such as retrying a
//! rejected compare-and-set.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use astron_db_client::{DatabaseClient, DcSchema, Dispatch, FieldMap, MemoryTransport};
//! use astron_db_client::protocol::{msgtypes, Datagram};
//!
//! let schema = DcSchema::builder()
//!     .class("Avatar", [("name", "string"), ("level", "uint8")])
//!     .build()
//!     .unwrap();
//! let avatar = schema.classes()[0].clone();
//! let client = DatabaseClient::new(MemoryTransport::new(4000), Arc::new(schema));
//!
//! let mut fields = FieldMap::new();
//! fields.insert("name".into(), "Ada".into());
//! let context = client
//!     .create_object(4003, &avatar, &fields, |do_id| println!("created {do_id}"))
//!     .unwrap();
//!
//! let mut reply = Datagram::server(4000, 4003, msgtypes::DBSERVER_CREATE_OBJECT_RESP);
//! reply.add_u32(context);
//! reply.add_u32(10001);
//! assert!(matches!(client.handle_datagram(reply.as_bytes()), Dispatch::Completed { .. }));
//! ```

mod replies;
mod requests;

use std::cell::{Ref, RefCell};
use std::sync::Arc;

use crate::context::{Continuation, ContextTable, UpdateOutcome};
use crate::dclass::{FieldMap, SchemaRegistry};
use crate::error::DbError;
use crate::protocol::{msgtypes, DatagramIterator};
use crate::transport::Transport;

use replies::ReplyKind;

/// What the dispatcher did with an inbound datagram.
#[derive(Debug)]
pub enum Dispatch {
    /// Not a database reply; left for other listeners.
    Unhandled,
    /// The continuation received the reply's result.
    Completed { context: u32 },
    /// The reply could not be used; the continuation received "no result".
    Failed { context: u32, error: DbError },
    /// No request is in flight under this context; nothing ran.
    Stale { context: u32, error: DbError },
    /// The datagram ended before its header or context ID.
    Malformed { error: DbError },
}

impl Dispatch {
    /// Whether the datagram was a database reply.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Dispatch::Unhandled)
    }
}

/// Client for the Astron database server.
pub struct DatabaseClient<T: Transport> {
    transport: T,
    schema: Arc<dyn SchemaRegistry>,
    contexts: RefCell<ContextTable>,
}

impl<T: Transport> DatabaseClient<T> {
    /// Create a client sending through `transport` and decoding against `schema`.
    pub fn new(transport: T, schema: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            transport,
            schema,
            contexts: RefCell::new(ContextTable::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn schema(&self) -> &Arc<dyn SchemaRegistry> {
        &self.schema
    }

    /// Requests awaiting a reply.
    ///
    /// The guard must be dropped before the next request or reply.
    pub fn contexts(&self) -> Ref<'_, ContextTable> {
        self.contexts.borrow()
    }

    pub fn pending_requests(&self) -> usize {
        self.contexts.borrow().len()
    }

    /// Parse a server header and dispatch the rest of the datagram.
    pub fn handle_datagram(&self, data: &[u8]) -> Dispatch {
        let mut di = DatagramIterator::new(data);
        match di.read_server_header() {
            Ok(header) => self.handle(header.msg_type, &mut di),
            Err(error) => {
                tracing::warn!("Dropping datagram without a server header: {}", error);
                Dispatch::Malformed { error }
            }
        }
    }

    /// Dispatch a reply whose message type has already been read.
    ///
    /// Returns [`Dispatch::Unhandled`] without touching `di` for message
    /// types that are not database replies. Otherwise the reply's context is
    /// released and its continuation invoked exactly once.
    pub fn handle(&self, msg_type: u16, di: &mut DatagramIterator<'_>) -> Dispatch {
        let Some(reply) = ReplyKind::classify(msg_type) else {
            return Dispatch::Unhandled;
        };
        let msg_name = msgtypes::name(msg_type).unwrap_or("?");

        let context = match di.get_u32() {
            Ok(context) => context,
            Err(error) => {
                tracing::warn!("Dropping {} without a context: {}", msg_name, error);
                return Dispatch::Malformed { error };
            }
        };

        let released = self.contexts.borrow_mut().release(context);
        let Some(record) = released else {
            let error = DbError::StaleContext(context);
            tracing::warn!("Dropping {}: {}", msg_name, error);
            return Dispatch::Stale { context, error };
        };
        let (continuation, hint) = record.into_parts();
        tracing::debug!(context, "dispatching {}", msg_name);

        let failure = match (reply, continuation) {
            (ReplyKind::Create, Continuation::Create(cb)) => {
                complete(cb, replies::create(di), || 0)
            }
            (ReplyKind::Query(shape), Continuation::Query(cb)) => complete(
                cb,
                replies::query(shape, di, hint, self.schema.as_ref()),
                || None,
            ),
            (ReplyKind::SetIfEquals { multi }, Continuation::Update(cb)) => complete(
                cb,
                replies::set_if_equals(multi, di, hint),
                || UpdateOutcome::Rejected(FieldMap::new()),
            ),
            (reply, continuation) => {
                let error = DbError::Protocol(format!(
                    "{} reply for a {} request",
                    reply.request_kind(),
                    continuation.kind()
                ));
                continuation.complete_empty();
                Some(error)
            }
        };

        match failure {
            None => Dispatch::Completed { context },
            Some(error) => {
                tracing::warn!(context, "{} failed: {}", msg_name, error);
                Dispatch::Failed { context, error }
            }
        }
    }
}

/// Invoke `cb` with the parsed value, or with the "no result" value on error.
fn complete<V>(
    cb: Box<dyn FnOnce(V)>,
    parsed: crate::error::Result<V>,
    empty: impl FnOnce() -> V,
) -> Option<DbError> {
    match parsed {
        Ok(value) => {
            cb(value);
            None
        }
        Err(error) => {
            cb(empty());
            Some(error)
        }
    }
}
