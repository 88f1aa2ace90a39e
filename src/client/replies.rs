//! Reply body parsers.
//!
//! Each parser starts right after the context ID and either produces the
//! continuation's success value or an error; the dispatcher turns errors
//! into the "no result" completion.

use std::sync::Arc;

use crate::codec::FieldCodec;
use crate::context::{ObjectFields, UpdateOutcome};
use crate::dclass::{DClass, FieldMap, SchemaRegistry};
use crate::error::{DbError, Result};
use crate::protocol::{msgtypes, DatagramIterator};

/// How a query reply lays out its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum QueryShape {
    /// Class ID and field count precede the fields.
    All,
    /// Exactly one field, decoded against the request's class.
    Field,
    /// Field count precedes the fields, decoded against the request's class.
    Fields,
}

/// Database replies the dispatcher handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReplyKind {
    Create,
    Query(QueryShape),
    SetIfEquals { multi: bool },
}

impl ReplyKind {
    pub(super) fn classify(msg_type: u16) -> Option<Self> {
        Some(match msg_type {
            msgtypes::DBSERVER_CREATE_OBJECT_RESP => ReplyKind::Create,
            msgtypes::DBSERVER_OBJECT_GET_ALL_RESP => ReplyKind::Query(QueryShape::All),
            msgtypes::DBSERVER_OBJECT_GET_FIELD_RESP => ReplyKind::Query(QueryShape::Field),
            msgtypes::DBSERVER_OBJECT_GET_FIELDS_RESP => ReplyKind::Query(QueryShape::Fields),
            msgtypes::DBSERVER_OBJECT_SET_FIELD_IF_EQUALS_RESP => {
                ReplyKind::SetIfEquals { multi: false }
            }
            msgtypes::DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP => {
                ReplyKind::SetIfEquals { multi: true }
            }
            _ => return None,
        })
    }

    /// Request family that expects this reply.
    pub(super) fn request_kind(self) -> &'static str {
        match self {
            ReplyKind::Create => "create",
            ReplyKind::Query(_) => "query",
            ReplyKind::SetIfEquals { .. } => "update",
        }
    }
}

/// `uint32 doId`
pub(super) fn create(di: &mut DatagramIterator<'_>) -> Result<u32> {
    di.get_u32()
}

/// `uint8 success` then, on success, the fields in `shape`'s layout.
pub(super) fn query(
    shape: QueryShape,
    di: &mut DatagramIterator<'_>,
    hint: Option<Arc<DClass>>,
    schema: &dyn SchemaRegistry,
) -> Result<Option<ObjectFields>> {
    if di.get_u8()? == 0 {
        return Ok(None);
    }

    let (dclass, count) = match shape {
        QueryShape::All => {
            let id = di.get_u16()?;
            let dclass = schema.class_by_id(id).ok_or(DbError::UnknownClass(id))?;
            (dclass, di.get_u16()?)
        }
        QueryShape::Field => (require_hint(hint)?, 1),
        QueryShape::Fields => {
            let dclass = require_hint(hint)?;
            (dclass, di.get_u16()?)
        }
    };

    let fields = read_fields(&dclass, count, di)?;
    Ok(Some(ObjectFields { dclass, fields }))
}

/// `uint8 success` then, on failure, the server's current values.
///
/// A failure with no further bytes is a rejection without values.
pub(super) fn set_if_equals(
    multi: bool,
    di: &mut DatagramIterator<'_>,
    hint: Option<Arc<DClass>>,
) -> Result<UpdateOutcome> {
    if di.get_u8()? != 0 {
        return Ok(UpdateOutcome::Applied);
    }
    if di.is_empty() {
        return Ok(UpdateOutcome::Rejected(FieldMap::new()));
    }

    let dclass = require_hint(hint)?;
    let count = if multi { di.get_u16()? } else { 1 };
    Ok(UpdateOutcome::Rejected(read_fields(&dclass, count, di)?))
}

fn require_hint(hint: Option<Arc<DClass>>) -> Result<Arc<DClass>> {
    hint.ok_or_else(|| DbError::Decode("reply has no DClass to decode fields against".to_string()))
}

fn read_fields(dclass: &DClass, count: u16, di: &mut DatagramIterator<'_>) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for _ in 0..count {
        let (name, value) = FieldCodec::unpack_numbered(dclass, di)?;
        fields.insert(name, value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dclass::{DcSchema, FieldValue};
    use crate::error::FieldKey;
    use crate::protocol::Datagram;

    fn schema() -> DcSchema {
        DcSchema::builder()
            .class("Avatar", [("name", "string"), ("level", "uint8")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ReplyKind::classify(msgtypes::DBSERVER_CREATE_OBJECT_RESP),
            Some(ReplyKind::Create)
        );
        assert_eq!(
            ReplyKind::classify(msgtypes::DBSERVER_OBJECT_SET_FIELDS_IF_EQUALS_RESP),
            Some(ReplyKind::SetIfEquals { multi: true })
        );
        assert_eq!(ReplyKind::classify(msgtypes::DBSERVER_CREATE_OBJECT), None);
        assert_eq!(ReplyKind::classify(2001), None);
    }

    #[test]
    fn test_query_all() {
        let schema = schema();
        let mut dg = Datagram::new();
        dg.add_u8(1);
        dg.add_u16(0);
        dg.add_u16(2);
        dg.add_u16(1);
        dg.add_u8(7);
        dg.add_u16(0);
        dg.add_u16(3);
        dg.add_data(b"Ada");

        let mut di = DatagramIterator::new(dg.as_bytes());
        let result = query(QueryShape::All, &mut di, None, &schema).unwrap().unwrap();
        assert_eq!(result.dclass.name(), "Avatar");
        assert_eq!(result.fields["level"], FieldValue::UInt8(7));
        assert_eq!(result.fields["name"], FieldValue::from("Ada"));
    }

    #[test]
    fn test_query_unsuccessful() {
        let schema = schema();
        let mut di = DatagramIterator::new(&[0]);
        assert!(query(QueryShape::All, &mut di, None, &schema).unwrap().is_none());
    }

    #[test]
    fn test_query_unknown_class() {
        let schema = schema();
        let mut di = DatagramIterator::new(&[1, 9, 0, 0, 0]);
        assert!(matches!(
            query(QueryShape::All, &mut di, None, &schema),
            Err(DbError::UnknownClass(9))
        ));
    }

    #[test]
    fn test_query_field_uses_hint() {
        let schema = schema();
        let avatar = schema.class_by_name("Avatar").unwrap();

        let mut di = DatagramIterator::new(&[1, 1, 0, 42]);
        let result = query(QueryShape::Field, &mut di, Some(avatar), &schema)
            .unwrap()
            .unwrap();
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields["level"], FieldValue::UInt8(42));

        let mut di = DatagramIterator::new(&[1, 1, 0, 42]);
        assert!(matches!(
            query(QueryShape::Field, &mut di, None, &schema),
            Err(DbError::Decode(_))
        ));
    }

    #[test]
    fn test_query_fields_unknown_number() {
        let schema = schema();
        let avatar = schema.class_by_name("Avatar").unwrap();

        let mut di = DatagramIterator::new(&[1, 1, 0, 0xFF, 0xFF, 0]);
        assert!(matches!(
            query(QueryShape::Fields, &mut di, Some(avatar), &schema),
            Err(DbError::UnknownField { field: FieldKey::Number(65535), .. })
        ));
    }

    #[test]
    fn test_set_if_equals_outcomes() {
        let avatar = schema().class_by_name("Avatar").unwrap();

        let mut di = DatagramIterator::new(&[1]);
        assert_eq!(set_if_equals(false, &mut di, None).unwrap(), UpdateOutcome::Applied);

        let mut di = DatagramIterator::new(&[0]);
        assert_eq!(
            set_if_equals(false, &mut di, None).unwrap(),
            UpdateOutcome::Rejected(FieldMap::new())
        );

        let mut di = DatagramIterator::new(&[0, 1, 0, 7]);
        let mut current = FieldMap::new();
        current.insert("level".to_string(), FieldValue::UInt8(7));
        assert_eq!(
            set_if_equals(false, &mut di, Some(Arc::clone(&avatar))).unwrap(),
            UpdateOutcome::Rejected(current.clone())
        );

        let mut di = DatagramIterator::new(&[0, 1, 0, 1, 0, 7]);
        assert_eq!(
            set_if_equals(true, &mut di, Some(avatar)).unwrap(),
            UpdateOutcome::Rejected(current)
        );
    }

    #[test]
    fn test_create_truncated() {
        let mut di = DatagramIterator::new(&[1, 2]);
        assert!(matches!(create(&mut di), Err(DbError::Decode(_))));
    }
}
