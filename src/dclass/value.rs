//! Dynamic field values.
//!
//! A [`FieldValue`] has one constructor per DC subatomic type, plus `Array`
//! for the built-in array types and `Tuple` for fields with several
//! parameters. Values packed through a numeric type with a divisor are
//! presented as `Float64`.

use std::collections::BTreeMap;

use serde::Serialize;

/// Field name to value, as carried by create, query and update operations.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A value conforming to a DC parameter type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Char(char),
    Float64(f64),
    String(String),
    Blob(Vec<u8>),
    Array(Vec<FieldValue>),
    Tuple(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Int8(_) => "int8",
            FieldValue::Int16(_) => "int16",
            FieldValue::Int32(_) => "int32",
            FieldValue::Int64(_) => "int64",
            FieldValue::UInt8(_) => "uint8",
            FieldValue::UInt16(_) => "uint16",
            FieldValue::UInt32(_) => "uint32",
            FieldValue::UInt64(_) => "uint64",
            FieldValue::Char(_) => "char",
            FieldValue::Float64(_) => "float64",
            FieldValue::String(_) => "string",
            FieldValue::Blob(_) => "blob",
            FieldValue::Array(_) => "array",
            FieldValue::Tuple(_) => "tuple",
        }
    }

    /// Integer value of any integer variant.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            FieldValue::Int8(v) => Some(v as i128),
            FieldValue::Int16(v) => Some(v as i128),
            FieldValue::Int32(v) => Some(v as i128),
            FieldValue::Int64(v) => Some(v as i128),
            FieldValue::UInt8(v) => Some(v as i128),
            FieldValue::UInt16(v) => Some(v as i128),
            FieldValue::UInt32(v) => Some(v as i128),
            FieldValue::UInt64(v) => Some(v as i128),
            _ => None,
        }
    }

    /// Numeric value of any integer or float variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Float64(v) => Some(v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Blob(b) => Some(b),
            FieldValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    char => Char,
    f64 => Float64,
    String => String,
    Vec<u8> => Blob,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}
