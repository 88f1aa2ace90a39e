//! Field-level packing: field numbers and multi-parameter fields.

use crate::dclass::{DClass, Field, FieldValue};
use crate::error::{DbError, FieldKey, Result};
use crate::protocol::{Datagram, DatagramIterator};

use super::parameter;

/// Codec for DC field values.
///
/// A field with one parameter takes the bare value. A field with several
/// parameters takes a [`FieldValue::Tuple`] of the same length.
pub struct FieldCodec;

impl FieldCodec {
    /// Append the field number followed by the packed value.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value does not fit the field; `dg` is
    /// left unchanged.
    pub fn pack(field: &Field, value: &FieldValue, dg: &mut Datagram) -> Result<()> {
        let packed = Self::encode(field, value)?;
        dg.add_u16(field.number());
        dg.append(&packed);
        Ok(())
    }

    /// Append the packed value without the field number.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value does not fit the field; `dg` is
    /// left unchanged.
    pub fn pack_value(field: &Field, value: &FieldValue, dg: &mut Datagram) -> Result<()> {
        let packed = Self::encode(field, value)?;
        dg.append(&packed);
        Ok(())
    }

    /// Read one value of `field` from the iterator.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on truncated or malformed input.
    pub fn unpack(field: &Field, di: &mut DatagramIterator<'_>) -> Result<FieldValue> {
        match field.params() {
            [param] => parameter::unpack(param, di),
            params => params
                .iter()
                .map(|param| parameter::unpack(param, di))
                .collect::<Result<Vec<_>>>()
                .map(FieldValue::Tuple),
        }
    }

    /// Look up `name` in `dclass` and append its number and value.
    pub fn pack_named(
        dclass: &DClass,
        name: &str,
        value: &FieldValue,
        dg: &mut Datagram,
    ) -> Result<()> {
        let field = dclass.field_by_name(name).ok_or_else(|| DbError::UnknownField {
            dclass: dclass.name().to_string(),
            field: FieldKey::Name(name.to_string()),
        })?;
        Self::pack(field, value, dg)
    }

    /// Read a field number and its value, resolving the number in `dclass`.
    ///
    /// Returns the field's name with the value.
    pub fn unpack_numbered(
        dclass: &DClass,
        di: &mut DatagramIterator<'_>,
    ) -> Result<(String, FieldValue)> {
        let number = di.get_u16()?;
        let field = dclass.field_by_index(number).ok_or_else(|| DbError::UnknownField {
            dclass: dclass.name().to_string(),
            field: FieldKey::Number(number),
        })?;
        let value = Self::unpack(field, di)?;
        Ok((field.name().to_string(), value))
    }

    fn encode(field: &Field, value: &FieldValue) -> Result<Datagram> {
        let mut scratch = Datagram::new();
        let packed = match (field.params(), value) {
            ([param], _) => parameter::pack(param, value, &mut scratch),
            (params, FieldValue::Tuple(items)) if items.len() == params.len() => params
                .iter()
                .zip(items)
                .try_for_each(|(param, item)| parameter::pack(param, item, &mut scratch)),
            (_, other) => Err(parameter::describe(other)),
        };

        match packed {
            Ok(()) => Ok(scratch),
            Err(found) => Err(DbError::TypeMismatch {
                field: field.name().to_string(),
                expected: field.to_string(),
                found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dclass::ParameterType;

    fn class() -> DClass {
        let p = |s: &str| ParameterType::parse_list(s).unwrap();
        DClass::new(
            3,
            "Toon",
            [
                ("name", p("string")),
                ("pos", p("int16/10, int16/10")),
                ("hp", p("uint16")),
                ("inventory", p("uint32uint8array")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pack_writes_number_then_value() {
        let class = class();
        let mut dg = Datagram::new();
        FieldCodec::pack(class.field_by_name("hp").unwrap(), &FieldValue::UInt16(500), &mut dg)
            .unwrap();
        assert_eq!(dg.as_bytes(), &[2, 0, 0xF4, 0x01]);
    }

    #[test]
    fn test_multi_parameter_tuple() {
        let class = class();
        let field = class.field_by_name("pos").unwrap();
        let value = FieldValue::Tuple(vec![FieldValue::Float64(1.5), FieldValue::Float64(-2.0)]);

        let mut dg = Datagram::new();
        FieldCodec::pack_value(field, &value, &mut dg).unwrap();
        assert_eq!(dg.as_bytes(), &[15, 0, 0xEC, 0xFF]);

        let mut di = DatagramIterator::new(dg.as_bytes());
        assert_eq!(FieldCodec::unpack(field, &mut di).unwrap(), value);
    }

    #[test]
    fn test_multi_parameter_wrong_arity() {
        let class = class();
        let field = class.field_by_name("pos").unwrap();
        let mut dg = Datagram::new();

        let err = FieldCodec::pack(field, &FieldValue::Tuple(vec![1i16.into()]), &mut dg)
            .unwrap_err();
        match err {
            DbError::TypeMismatch { field, expected, found } => {
                assert_eq!(field, "pos");
                assert_eq!(expected, "pos(int16/10, int16/10)");
                assert_eq!(found, "tuple of 1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(dg.is_empty());
    }

    #[test]
    fn test_failed_pack_leaves_datagram_untouched() {
        let class = class();
        let mut dg = Datagram::new();
        dg.add_u8(7);

        let bad = FieldValue::Tuple(vec![FieldValue::Float64(1.0), FieldValue::from("x")]);
        assert!(FieldCodec::pack(class.field_by_name("pos").unwrap(), &bad, &mut dg).is_err());
        assert_eq!(dg.as_bytes(), &[7]);
    }

    #[test]
    fn test_pack_named_unknown_field() {
        let class = class();
        let mut dg = Datagram::new();
        let err = FieldCodec::pack_named(&class, "mana", &FieldValue::UInt8(1), &mut dg)
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::UnknownField { field: FieldKey::Name(ref n), .. } if n == "mana"
        ));
    }

    #[test]
    fn test_unpack_numbered() {
        let class = class();
        let mut dg = Datagram::new();
        FieldCodec::pack_named(&class, "name", &"Flippy".into(), &mut dg).unwrap();
        dg.add_u16(9);

        let mut di = DatagramIterator::new(dg.as_bytes());
        let (name, value) = FieldCodec::unpack_numbered(&class, &mut di).unwrap();
        assert_eq!(name, "name");
        assert_eq!(value, FieldValue::from("Flippy"));

        let err = FieldCodec::unpack_numbered(&class, &mut di).unwrap_err();
        assert!(matches!(err, DbError::UnknownField { field: FieldKey::Number(9), .. }));
    }

    #[test]
    fn test_roundtrip_representative_fields() {
        let class = class();
        let values = [
            ("name", FieldValue::from("Ada")),
            ("hp", FieldValue::UInt16(65535)),
            (
                "inventory",
                FieldValue::Array(vec![FieldValue::Tuple(vec![
                    FieldValue::UInt32(12),
                    FieldValue::UInt8(4),
                ])]),
            ),
        ];

        let mut dg = Datagram::new();
        for (name, value) in &values {
            FieldCodec::pack_named(&class, name, value, &mut dg).unwrap();
        }

        let mut di = DatagramIterator::new(dg.as_bytes());
        for (name, value) in &values {
            assert_eq!(&FieldCodec::unpack_numbered(&class, &mut di).unwrap(), &(name.to_string(), value.clone()));
        }
        assert!(di.is_empty());
    }

    #[test]
    fn test_unpack_truncated_tuple() {
        let class = class();
        let mut di = DatagramIterator::new(&[15, 0, 0xEC]);
        assert!(matches!(
            FieldCodec::unpack(class.field_by_name("pos").unwrap(), &mut di),
            Err(DbError::Decode(_))
        ));
    }
}
