//! DClass schema registry.
//!
//! The client only consults the schema through [`SchemaRegistry`], so any
//! registry (for instance one generated from a parsed DC file) can be
//! plugged in. [`DcSchema`] is the bundled implementation; class IDs follow
//! declaration order.
//!
//! # Example
//!
//! ```
//! use astron_db_client::dclass::{DcSchema, SchemaRegistry};
//!
//! let schema = DcSchema::from_json(r#"{
//!     "classes": [
//!         { "name": "Avatar", "fields": [
//!             { "name": "name", "type": "string" },
//!             { "name": "pos", "type": "int16/10, int16/10" }
//!         ] }
//!     ]
//! }"#).unwrap();
//!
//! let avatar = schema.class_by_name("Avatar").unwrap();
//! assert_eq!(avatar.id(), 0);
//! assert_eq!(avatar.field_by_name("pos").unwrap().params().len(), 2);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::class::DClass;
use super::types::ParameterType;
use crate::error::{DbError, Result};

/// Read-only lookup of DClasses by numeric ID and by name.
pub trait SchemaRegistry {
    /// Look up a class by its numeric ID.
    fn class_by_id(&self, id: u16) -> Option<Arc<DClass>>;

    /// Look up a class by name.
    fn class_by_name(&self, name: &str) -> Option<Arc<DClass>>;
}

/// JSON description of a schema.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDef {
    classes: Vec<ClassDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassDef {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    signature: String,
}

/// Immutable in-memory schema.
#[derive(Debug, Default)]
pub struct DcSchema {
    classes: Vec<Arc<DClass>>,
    by_name: HashMap<String, u16>,
}

impl DcSchema {
    /// Start building a schema programmatically.
    pub fn builder() -> DcSchemaBuilder {
        DcSchemaBuilder::new()
    }

    /// Load a schema from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Json` for malformed JSON and `DbError::Schema` for
    /// unknown types or duplicate names.
    pub fn from_json(json: &str) -> Result<Self> {
        let def: SchemaDef = serde_json::from_str(json)?;

        let mut builder = DcSchemaBuilder::new();
        for class in def.classes {
            builder = builder.class(
                &class.name,
                class
                    .fields
                    .iter()
                    .map(|f| (f.name.as_str(), f.signature.as_str())),
            );
        }
        builder.build()
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All classes in ID order.
    pub fn classes(&self) -> &[Arc<DClass>] {
        &self.classes
    }
}

impl SchemaRegistry for DcSchema {
    fn class_by_id(&self, id: u16) -> Option<Arc<DClass>> {
        self.classes.get(id as usize).cloned()
    }

    fn class_by_name(&self, name: &str) -> Option<Arc<DClass>> {
        self.by_name
            .get(name)
            .and_then(|&id| self.class_by_id(id))
    }
}

/// Fluent builder for [`DcSchema`].
///
/// Field types use DC notation; a field with several parameters lists them
/// comma-separated (`"int16/10, int16/10"`). Errors are reported by `build`.
#[derive(Debug, Default)]
pub struct DcSchemaBuilder {
    classes: Vec<(String, Vec<(String, String)>)>,
}

impl DcSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class with `(field name, parameter list)` pairs.
    pub fn class<'a, I>(mut self, name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = fields
            .into_iter()
            .map(|(field, signature)| (field.to_string(), signature.to_string()))
            .collect();
        self.classes.push((name.to_string(), fields));
        self
    }

    /// Build the schema, assigning class IDs in declaration order.
    pub fn build(self) -> Result<DcSchema> {
        let mut schema = DcSchema::default();

        for (index, (name, fields)) in self.classes.into_iter().enumerate() {
            let id = u16::try_from(index)
                .map_err(|_| DbError::Schema("too many classes".to_string()))?;

            let fields = fields
                .into_iter()
                .map(|(field, signature)| match ParameterType::parse_list(&signature) {
                    Ok(params) => Ok((field, params)),
                    Err(DbError::Schema(msg)) => {
                        Err(DbError::Schema(format!("{}.{}: {}", name, field, msg)))
                    }
                    Err(e) => Err(e),
                })
                .collect::<Result<Vec<_>>>()?;

            let class = DClass::new(id, &name, fields)?;
            if schema.by_name.insert(name.clone(), id).is_some() {
                return Err(DbError::Schema(format!("duplicate class {}", name)));
            }
            schema.classes.push(Arc::new(class));
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> DcSchema {
        DcSchema::builder()
            .class("Account", [("username", "string"), ("avatars", "uint32array")])
            .class("Avatar", [("name", "string"), ("level", "uint8")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_ids_follow_declaration_order() {
        let schema = schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.class_by_name("Account").unwrap().id(), 0);
        assert_eq!(schema.class_by_name("Avatar").unwrap().id(), 1);
        assert_eq!(schema.class_by_id(1).unwrap().name(), "Avatar");
    }

    #[test]
    fn test_unknown_lookups() {
        let schema = schema();
        assert!(schema.class_by_id(2).is_none());
        assert!(schema.class_by_name("Ghost").is_none());
    }

    #[test]
    fn test_lookups_share_the_same_class() {
        let schema = schema();
        let by_id = schema.class_by_id(1).unwrap();
        let by_name = schema.class_by_name("Avatar").unwrap();
        assert!(Arc::ptr_eq(&by_id, &by_name));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let result = DcSchema::builder()
            .class("A", [("x", "uint8")])
            .class("A", [("y", "uint8")])
            .build();
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_bad_type_names_field() {
        let err = DcSchema::builder()
            .class("A", [("x", "uint9")])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("A.x"));
    }

    #[test]
    fn test_from_json() {
        let schema = DcSchema::from_json(
            r#"{"classes": [
                {"name": "Empty"},
                {"name": "Item", "fields": [{"name": "weight", "type": "uint16/100"}]}
            ]}"#,
        )
        .unwrap();

        let item = schema.class_by_name("Item").unwrap();
        assert_eq!(item.id(), 1);
        assert_eq!(item.field_by_name("weight").unwrap().params()[0].divisor(), 100);
        assert!(schema.class_by_name("Empty").unwrap().fields().is_empty());
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(DcSchema::from_json("{"), Err(DbError::Json(_))));
        assert!(matches!(
            DcSchema::from_json(r#"{"classes": [], "extra": 1}"#),
            Err(DbError::Json(_))
        ));
    }
}
