//! DClass schema module - classes, fields, parameter types and values.
//!
//! Provides:
//! - [`SchemaRegistry`] - lookup of classes by ID and by name
//! - [`DClass`] / [`Field`] - lookup of fields by name and by number
//! - [`ParameterType`] - DC subatomic types with divisors, range limits and moduli
//! - [`FieldValue`] - dynamic values conforming to a parameter type

mod class;
mod schema;
mod types;
mod value;

pub use class::{DClass, Field};
pub use schema::{DcSchema, DcSchemaBuilder, SchemaRegistry};
pub use types::{ParameterType, RangeLimit, SubatomicType};
pub use value::{FieldMap, FieldValue};
