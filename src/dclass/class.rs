//! DClass and field descriptors.

use std::collections::HashMap;
use std::fmt;

use super::types::ParameterType;
use crate::error::{DbError, Result};

/// A numbered, named, typed slot in a DClass.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    number: u16,
    name: String,
    params: Vec<ParameterType>,
}

impl Field {
    /// Field number on the wire.
    #[inline]
    pub fn number(&self) -> u16 {
        self.number
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types, in packing order.
    #[inline]
    pub fn params(&self) -> &[ParameterType] {
        &self.params
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

/// Schema descriptor for a distributed object class.
///
/// Field numbers are the field's index within the class.
#[derive(Debug, Clone, PartialEq)]
pub struct DClass {
    id: u16,
    name: String,
    fields: Vec<Field>,
    by_name: HashMap<String, u16>,
}

impl DClass {
    /// Create a DClass from `(name, params)` pairs in field-number order.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` on duplicate field names, fields without
    /// parameters, or more than 65536 fields.
    pub fn new<I, S>(id: u16, name: &str, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<ParameterType>)>,
        S: Into<String>,
    {
        let mut class = Self {
            id,
            name: name.to_string(),
            fields: Vec::new(),
            by_name: HashMap::new(),
        };

        for (field_name, params) in fields {
            let field_name = field_name.into();
            let number = u16::try_from(class.fields.len())
                .map_err(|_| DbError::Schema(format!("{}: too many fields", name)))?;

            if params.is_empty() {
                return Err(DbError::Schema(format!(
                    "{}.{}: field has no parameters",
                    name, field_name
                )));
            }
            if class.by_name.insert(field_name.clone(), number).is_some() {
                return Err(DbError::Schema(format!(
                    "{}.{}: duplicate field name",
                    name, field_name
                )));
            }

            class.fields.push(Field {
                number,
                name: field_name,
                params,
            });
        }

        Ok(class)
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields in field-number order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name
            .get(name)
            .and_then(|&index| self.field_by_index(index))
    }

    /// Look up a field by its number.
    pub fn field_by_index(&self, index: u16) -> Option<&Field> {
        self.fields.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> DClass {
        DClass::new(
            3,
            "Avatar",
            [
                ("name", ParameterType::parse_list("string").unwrap()),
                ("level", ParameterType::parse_list("uint8").unwrap()),
                ("pos", ParameterType::parse_list("int16/10, int16/10").unwrap()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_field_numbers_follow_declaration_order() {
        let class = avatar();
        assert_eq!(class.id(), 3);
        assert_eq!(class.name(), "Avatar");
        assert_eq!(class.field_by_name("name").unwrap().number(), 0);
        assert_eq!(class.field_by_name("pos").unwrap().number(), 2);
        assert_eq!(class.field_by_index(1).unwrap().name(), "level");
    }

    #[test]
    fn test_missing_lookups() {
        let class = avatar();
        assert!(class.field_by_name("hp").is_none());
        assert!(class.field_by_index(3).is_none());
        assert!(class.field_by_index(u16::MAX).is_none());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = DClass::new(
            0,
            "Dup",
            [
                ("a", ParameterType::parse_list("uint8").unwrap()),
                ("a", ParameterType::parse_list("uint16").unwrap()),
            ],
        );
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_field_without_params_rejected() {
        let result = DClass::new(0, "Empty", [("a", Vec::new())]);
        assert!(result.is_err());
    }

    #[test]
    fn test_field_display() {
        let class = avatar();
        assert_eq!(class.field_by_name("pos").unwrap().to_string(), "pos(int16/10, int16/10)");
    }
}
