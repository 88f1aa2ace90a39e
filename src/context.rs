//! Context table for in-flight database requests.
//!
//! Every request that expects a reply stores a [`PendingRequest`] keyed by
//! its context ID. The reply dispatcher releases the record exactly once and
//! completes its continuation.
//!
//! # Example
//!
//! ```
//! use astron_db_client::context::{Continuation, ContextTable};
//!
//! let mut table = ContextTable::new();
//! table.allocate(1, Continuation::create(|do_id| assert_eq!(do_id, 0)), None);
//!
//! assert!(table.resolve(1).is_some());
//! let record = table.release(1).unwrap();
//! record.complete_empty();
//! assert!(table.release(1).is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dclass::{DClass, FieldMap};

/// Completion for `create_object`: receives the new doId, `0` on failure.
pub type CreateCallback = Box<dyn FnOnce(u32)>;

/// Completion for `query_object`: `None` when the query produced no result.
pub type QueryCallback = Box<dyn FnOnce(Option<ObjectFields>)>;

/// Completion for `update_object`.
pub type UpdateCallback = Box<dyn FnOnce(UpdateOutcome)>;

/// Fields returned by a successful query.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFields {
    /// Class the fields were decoded against.
    pub dclass: Arc<DClass>,
    /// Field values by name.
    pub fields: FieldMap,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was applied (always the case for blind updates).
    Applied,
    /// A compare-and-swap update was rejected.
    ///
    /// Carries the server's current values so the caller can retry. Empty
    /// when the server sent none, typically because the object is missing.
    Rejected(FieldMap),
}

/// Caller-supplied completion of a pending request.
pub enum Continuation {
    Create(CreateCallback),
    Query(QueryCallback),
    Update(UpdateCallback),
}

impl Continuation {
    pub fn create<F: FnOnce(u32) + 'static>(f: F) -> Self {
        Continuation::Create(Box::new(f))
    }

    pub fn query<F: FnOnce(Option<ObjectFields>) + 'static>(f: F) -> Self {
        Continuation::Query(Box::new(f))
    }

    pub fn update<F: FnOnce(UpdateOutcome) + 'static>(f: F) -> Self {
        Continuation::Update(Box::new(f))
    }

    /// Name of the request family, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Continuation::Create(_) => "create",
            Continuation::Query(_) => "query",
            Continuation::Update(_) => "update",
        }
    }

    /// Invoke the continuation with its "no result" shape.
    pub fn complete_empty(self) {
        match self {
            Continuation::Create(cb) => cb(0),
            Continuation::Query(cb) => cb(None),
            Continuation::Update(cb) => cb(UpdateOutcome::Rejected(FieldMap::new())),
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Continuation::{}", self.kind())
    }
}

/// A request awaiting its terminal reply.
#[derive(Debug)]
pub struct PendingRequest {
    context: u32,
    continuation: Continuation,
    dclass_hint: Option<Arc<DClass>>,
}

impl PendingRequest {
    #[inline]
    pub fn context(&self) -> u32 {
        self.context
    }

    /// Class to decode the reply against when the reply does not name one.
    #[inline]
    pub fn dclass_hint(&self) -> Option<&Arc<DClass>> {
        self.dclass_hint.as_ref()
    }

    #[inline]
    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    /// Split the record into its continuation and class hint.
    pub fn into_parts(self) -> (Continuation, Option<Arc<DClass>>) {
        (self.continuation, self.dclass_hint)
    }

    /// Release-time shortcut for [`Continuation::complete_empty`].
    pub fn complete_empty(self) {
        self.continuation.complete_empty();
    }
}

/// Table of in-flight requests keyed by context ID.
#[derive(Debug, Default)]
pub struct ContextTable {
    pending: HashMap<u32, PendingRequest>,
}

impl ContextTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under a context obtained from the transport.
    ///
    /// # Panics
    ///
    /// Panics if `context` is already in flight. Context IDs come from a
    /// counter that never wraps within a session, so a collision is a bug.
    pub fn allocate(
        &mut self,
        context: u32,
        continuation: Continuation,
        dclass_hint: Option<Arc<DClass>>,
    ) -> u32 {
        let record = PendingRequest {
            context,
            continuation,
            dclass_hint,
        };
        let previous = self.pending.insert(context, record);
        assert!(previous.is_none(), "context {} is already in flight", context);
        context
    }

    /// Look up a record without removing it.
    pub fn resolve(&self, context: u32) -> Option<&PendingRequest> {
        self.pending.get(&context)
    }

    /// Remove and return a record. A second release of the same ID returns `None`.
    pub fn release(&mut self, context: u32) -> Option<PendingRequest> {
        self.pending.remove(&context)
    }

    pub fn contains(&self, context: u32) -> bool {
        self.pending.contains_key(&context)
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_allocate_resolve_release() {
        let mut table = ContextTable::new();
        assert_eq!(table.allocate(7, Continuation::create(|_| {}), None), 7);

        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(7).unwrap().context(), 7);
        assert_eq!(table.resolve(7).unwrap().continuation().kind(), "create");
        assert!(table.contains(7));

        let record = table.release(7).unwrap();
        assert_eq!(record.context(), 7);
        assert!(table.is_empty());
        assert!(table.resolve(7).is_none());
        assert!(table.release(7).is_none());
    }

    #[test]
    fn test_release_unknown_is_none() {
        let mut table = ContextTable::new();
        table.allocate(1, Continuation::create(|_| {}), None);
        assert!(table.release(2).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already in flight")]
    fn test_duplicate_context_panics() {
        let mut table = ContextTable::new();
        table.allocate(3, Continuation::create(|_| {}), None);
        table.allocate(3, Continuation::create(|_| {}), None);
    }

    #[test]
    fn test_dclass_hint_kept() {
        let class = Arc::new(DClass::new(0, "Empty", Vec::<(&str, _)>::new()).unwrap());
        let mut table = ContextTable::new();
        table.allocate(9, Continuation::query(|_| {}), Some(Arc::clone(&class)));

        let (continuation, hint) = table.release(9).unwrap().into_parts();
        assert_eq!(continuation.kind(), "query");
        assert_eq!(hint.unwrap().name(), "Empty");
    }

    #[test]
    fn test_complete_empty_shapes() {
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        Continuation::create(move |id| s.borrow_mut().push(format!("create {id}"))).complete_empty();
        let s = Rc::clone(&seen);
        Continuation::query(move |r| s.borrow_mut().push(format!("query {}", r.is_none())))
            .complete_empty();
        let s = Rc::clone(&seen);
        Continuation::update(move |o| s.borrow_mut().push(format!("update {:?}", o)))
            .complete_empty();

        assert_eq!(
            *seen.borrow(),
            vec!["create 0", "query true", "update Rejected({})"]
        );
    }
}
