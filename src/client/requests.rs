//! Request builders.
//!
//! Every builder packs the whole body first and only then takes a context
//! from the transport, so validation errors leave no trace.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::codec::FieldCodec;
use crate::context::{Continuation, ObjectFields, UpdateOutcome};
use crate::dclass::{DClass, Field, FieldMap};
use crate::error::{DbError, FieldKey, Result};
use crate::protocol::{msgtypes, Datagram};
use crate::transport::Transport;

use super::DatabaseClient;

impl<T: Transport> DatabaseClient<T> {
    /// Create an object of `dclass` on database `db` with initial `fields`.
    ///
    /// `on_done` receives the new doId, or `0` if the server failed to
    /// create the object. Returns the request's context.
    ///
    /// # Errors
    ///
    /// `UnknownField` or `TypeMismatch` for a bad entry in `fields`; nothing
    /// is sent in that case.
    pub fn create_object<F>(
        &self,
        db: u64,
        dclass: &DClass,
        fields: &FieldMap,
        on_done: F,
    ) -> Result<u32>
    where
        F: FnOnce(u32) + 'static,
    {
        let mut body = Datagram::with_capacity(64);
        body.add_u16(dclass.id());
        body.add_u16(field_count(fields.len())?);
        for (name, value) in fields {
            FieldCodec::pack_named(dclass, name, value, &mut body)?;
        }

        self.send_request(
            db,
            msgtypes::DBSERVER_CREATE_OBJECT,
            body,
            Continuation::create(on_done),
            None,
        )
    }

    /// Query object `do_id` on database `db`.
    ///
    /// With no `field_names` every field is requested and `dclass` is
    /// optional, since the reply names the class. Otherwise `dclass`
    /// translates the names into field numbers. `on_done` receives `None`
    /// when the query produced no result.
    ///
    /// # Errors
    ///
    /// `SchemaRequired` when names are given without a class, `UnknownField`
    /// for a name the class does not define.
    pub fn query_object<F>(
        &self,
        db: u64,
        do_id: u32,
        dclass: Option<&Arc<DClass>>,
        field_names: &[&str],
        on_done: F,
    ) -> Result<u32>
    where
        F: FnOnce(Option<ObjectFields>) + 'static,
    {
        let mut body = Datagram::with_capacity(16);
        body.add_u32(do_id);

        let msg_type = match field_names {
            [] => msgtypes::DBSERVER_OBJECT_GET_ALL,
            [name] => {
                let field = lookup(dclass.ok_or(DbError::SchemaRequired)?, name)?;
                body.add_u16(field.number());
                msgtypes::DBSERVER_OBJECT_GET_FIELD
            }
            names => {
                let dclass = dclass.ok_or(DbError::SchemaRequired)?;
                body.add_u16(field_count(names.len())?);
                for name in names {
                    body.add_u16(lookup(dclass, name)?.number());
                }
                msgtypes::DBSERVER_OBJECT_GET_FIELDS
            }
        };

        self.send_request(
            db,
            msg_type,
            body,
            Continuation::query(on_done),
            dclass.cloned(),
        )
    }

    /// Update fields of object `do_id` on database `db`.
    ///
    /// Without `old_fields` this is a blind update: the server does not
    /// reply, no context is taken and `on_done` runs with
    /// [`UpdateOutcome::Applied`] as soon as the datagram is sent. Returns
    /// `None` in that case.
    ///
    /// With `old_fields` the server applies `new_fields` only if every field
    /// still holds its old value. Returns the request's context.
    ///
    /// # Errors
    ///
    /// `KeyMismatch` when the two maps name different fields, `UnknownField`
    /// or `TypeMismatch` for a bad entry; nothing is sent in these cases.
    pub fn update_object<F>(
        &self,
        db: u64,
        do_id: u32,
        dclass: &Arc<DClass>,
        new_fields: &FieldMap,
        old_fields: Option<&FieldMap>,
        on_done: F,
    ) -> Result<Option<u32>>
    where
        F: FnOnce(UpdateOutcome) + 'static,
    {
        let single = new_fields.len() == 1;
        let mut body = Datagram::with_capacity(64);
        body.add_u32(do_id);
        if !single {
            body.add_u16(field_count(new_fields.len())?);
        }

        let Some(old_fields) = old_fields else {
            for (name, value) in new_fields {
                FieldCodec::pack_named(dclass, name, value, &mut body)?;
            }
            let msg_type = if single {
                msgtypes::DBSERVER_OBJECT_SET_FIELD
            } else {
                msgtypes::DBSERVER_OBJECT_SET_FIELDS
            };

            let mut dg = Datagram::server(db, self.transport.self_channel(), msg_type);
            dg.append(&body);
            tracing::debug!(db, do_id, fields = new_fields.len(), "blind update");
            self.transport.send(dg)?;
            on_done(UpdateOutcome::Applied);
            return Ok(None);
        };

        if !new_fields.keys().eq(old_fields.keys()) {
            return Err(DbError::KeyMismatch {
                new: new_fields.keys().cloned().collect(),
                old: old_fields.keys().cloned().collect(),
            });
        }

        for ((name, new), old) in new_fields.iter().zip(old_fields.values()) {
            let field = lookup(dclass, name)?;
            body.add_u16(field.number());
            FieldCodec::pack_value(field, old, &mut body)?;
            FieldCodec::pack_value(field, new, &mut body)?;
        }
        let msg_type = if single {
            msgtypes::DBSERVER_OBJECT_SET_FIELD_IF_EQUALS
        } else {
            msgtypes::DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS
        };

        self.send_request(
            db,
            msg_type,
            body,
            Continuation::update(on_done),
            Some(Arc::clone(dclass)),
        )
        .map(Some)
    }

    /// Like [`create_object`](Self::create_object), completing a oneshot channel.
    pub fn create_object_future(
        &self,
        db: u64,
        dclass: &DClass,
        fields: &FieldMap,
    ) -> Result<oneshot::Receiver<u32>> {
        let (tx, rx) = oneshot::channel();
        self.create_object(db, dclass, fields, move |do_id| {
            let _ = tx.send(do_id);
        })?;
        Ok(rx)
    }

    /// Like [`query_object`](Self::query_object), completing a oneshot channel.
    pub fn query_object_future(
        &self,
        db: u64,
        do_id: u32,
        dclass: Option<&Arc<DClass>>,
        field_names: &[&str],
    ) -> Result<oneshot::Receiver<Option<ObjectFields>>> {
        let (tx, rx) = oneshot::channel();
        self.query_object(db, do_id, dclass, field_names, move |result| {
            let _ = tx.send(result);
        })?;
        Ok(rx)
    }

    /// Like [`update_object`](Self::update_object), completing a oneshot channel.
    ///
    /// For a blind update the receiver is already complete on return.
    pub fn update_object_future(
        &self,
        db: u64,
        do_id: u32,
        dclass: &Arc<DClass>,
        new_fields: &FieldMap,
        old_fields: Option<&FieldMap>,
    ) -> Result<oneshot::Receiver<UpdateOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.update_object(db, do_id, dclass, new_fields, old_fields, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        Ok(rx)
    }

    /// Take a context, prepend header and context to `body`, record and send.
    ///
    /// The record is released again if the transport refuses the datagram.
    fn send_request(
        &self,
        db: u64,
        msg_type: u16,
        body: Datagram,
        continuation: Continuation,
        dclass_hint: Option<Arc<DClass>>,
    ) -> Result<u32> {
        let context = self.transport.next_context();

        let mut dg = Datagram::server(db, self.transport.self_channel(), msg_type);
        dg.add_u32(context);
        dg.append(&body);

        self.contexts
            .borrow_mut()
            .allocate(context, continuation, dclass_hint);
        tracing::debug!(
            db,
            context,
            "sending {}",
            msgtypes::name(msg_type).unwrap_or("?")
        );

        if let Err(e) = self.transport.send(dg) {
            self.contexts.borrow_mut().release(context);
            return Err(e);
        }
        Ok(context)
    }
}

fn lookup<'a>(dclass: &'a DClass, name: &str) -> Result<&'a Field> {
    dclass.field_by_name(name).ok_or_else(|| DbError::UnknownField {
        dclass: dclass.name().to_string(),
        field: FieldKey::Name(name.to_string()),
    })
}

fn field_count(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| DbError::Protocol(format!("{} fields in one request", len)))
}
