//! DC parameter types.
//!
//! A parameter type is a subatomic type with an optional divisor, range
//! limits and modulus, written the way DC files write it: `uint8`,
//! `int16/10`, `uint8(0-100)`, `uint16%360`, `string(8)`, `uint32array`.
//!
//! # Example
//!
//! ```
//! use astron_db_client::dclass::{ParameterType, SubatomicType};
//!
//! let param: ParameterType = "int16/10".parse().unwrap();
//! assert_eq!(param.kind(), SubatomicType::Int16);
//! assert_eq!(param.divisor(), 10);
//! assert_eq!(param.to_string(), "int16/10");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// The primitive wire types a DC parameter can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubatomicType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Char,
    Float64,
    String,
    Blob,
    Blob32,
    Int8Array,
    Int16Array,
    Int32Array,
    UInt8Array,
    UInt16Array,
    UInt32Array,
    UInt32UInt8Array,
}

impl SubatomicType {
    const ALL: [SubatomicType; 20] = [
        SubatomicType::Int8,
        SubatomicType::Int16,
        SubatomicType::Int32,
        SubatomicType::Int64,
        SubatomicType::UInt8,
        SubatomicType::UInt16,
        SubatomicType::UInt32,
        SubatomicType::UInt64,
        SubatomicType::Char,
        SubatomicType::Float64,
        SubatomicType::String,
        SubatomicType::Blob,
        SubatomicType::Blob32,
        SubatomicType::Int8Array,
        SubatomicType::Int16Array,
        SubatomicType::Int32Array,
        SubatomicType::UInt8Array,
        SubatomicType::UInt16Array,
        SubatomicType::UInt32Array,
        SubatomicType::UInt32UInt8Array,
    ];

    /// DC keyword for this type.
    pub fn name(self) -> &'static str {
        match self {
            SubatomicType::Int8 => "int8",
            SubatomicType::Int16 => "int16",
            SubatomicType::Int32 => "int32",
            SubatomicType::Int64 => "int64",
            SubatomicType::UInt8 => "uint8",
            SubatomicType::UInt16 => "uint16",
            SubatomicType::UInt32 => "uint32",
            SubatomicType::UInt64 => "uint64",
            SubatomicType::Char => "char",
            SubatomicType::Float64 => "float64",
            SubatomicType::String => "string",
            SubatomicType::Blob => "blob",
            SubatomicType::Blob32 => "blob32",
            SubatomicType::Int8Array => "int8array",
            SubatomicType::Int16Array => "int16array",
            SubatomicType::Int32Array => "int32array",
            SubatomicType::UInt8Array => "uint8array",
            SubatomicType::UInt16Array => "uint16array",
            SubatomicType::UInt32Array => "uint32array",
            SubatomicType::UInt32UInt8Array => "uint32uint8array",
        }
    }

    /// Look up a type by its DC keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Element type of a built-in array type.
    ///
    /// `uint32uint8array` has no single element type and returns `None`.
    pub fn element_type(self) -> Option<SubatomicType> {
        match self {
            SubatomicType::Int8Array => Some(SubatomicType::Int8),
            SubatomicType::Int16Array => Some(SubatomicType::Int16),
            SubatomicType::Int32Array => Some(SubatomicType::Int32),
            SubatomicType::UInt8Array => Some(SubatomicType::UInt8),
            SubatomicType::UInt16Array => Some(SubatomicType::UInt16),
            SubatomicType::UInt32Array => Some(SubatomicType::UInt32),
            _ => None,
        }
    }

    /// The scalar a value of this type is made of: the element type of an
    /// array, otherwise the type itself.
    fn scalar(self) -> SubatomicType {
        self.element_type().unwrap_or(self)
    }

    /// Check whether this is one of the built-in array types.
    pub fn is_array(self) -> bool {
        self.element_type().is_some() || self == SubatomicType::UInt32UInt8Array
    }

    /// Check whether a divisor may be applied to this type.
    ///
    /// Strings, blobs and `char` are not numeric.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            SubatomicType::Char
                | SubatomicType::String
                | SubatomicType::Blob
                | SubatomicType::Blob32
                | SubatomicType::UInt32UInt8Array
        )
    }

    /// Packed size of a fixed-width scalar, or of one array element.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            SubatomicType::Int8 | SubatomicType::UInt8 | SubatomicType::Char => Some(1),
            SubatomicType::Int16 | SubatomicType::UInt16 => Some(2),
            SubatomicType::Int32 | SubatomicType::UInt32 => Some(4),
            SubatomicType::Int64 | SubatomicType::UInt64 | SubatomicType::Float64 => Some(8),
            SubatomicType::UInt32UInt8Array => Some(5),
            other => other.element_type().and_then(SubatomicType::fixed_size),
        }
    }
}

impl fmt::Display for SubatomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive `min-max` limit, in the parameter's declared units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeLimit {
    pub min: f64,
    pub max: f64,
}

impl RangeLimit {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A limit admitting exactly one value.
    pub fn exactly(value: f64) -> Self {
        Self::new(value, value)
    }
}

impl fmt::Display for RangeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// A parameter type: subatomic type plus divisor, range limits and modulus.
///
/// Written `int16(0-100)/10%360` in DC notation. On `string`, `blob` and
/// `blob32` the limits bound the byte length; a single exact length makes the
/// parameter fixed-length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterType {
    kind: SubatomicType,
    divisor: u32,
    ranges: Vec<RangeLimit>,
    modulus: Option<f64>,
}

impl ParameterType {
    /// Create a parameter type with divisor 1 and no limits.
    pub fn new(kind: SubatomicType) -> Self {
        Self {
            kind,
            divisor: 1,
            ranges: Vec::new(),
            modulus: None,
        }
    }

    /// Create a parameter type with a fixed-point divisor.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` if the divisor is zero or the type is not numeric.
    pub fn with_divisor(kind: SubatomicType, divisor: u32) -> Result<Self, DbError> {
        if divisor == 0 {
            return Err(DbError::Schema(format!("{}: divisor must be non-zero", kind)));
        }
        if divisor != 1 && !kind.is_numeric() {
            return Err(DbError::Schema(format!("{} cannot take a divisor", kind)));
        }
        Ok(Self {
            divisor,
            ..Self::new(kind)
        })
    }

    /// Restrict values to `ranges`, given in declared units.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` if the type takes no limits or a bound does
    /// not fit the type once scaled.
    pub fn with_ranges(mut self, ranges: Vec<RangeLimit>) -> Result<Self, DbError> {
        for range in &ranges {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(DbError::Schema(format!("{}: invalid range {}", self.kind, range)));
            }
        }

        let kind = self.kind;
        let fits = |bound: f64| match kind {
            SubatomicType::UInt32UInt8Array => false,
            SubatomicType::Float64 => true,
            SubatomicType::String | SubatomicType::Blob | SubatomicType::Blob32 => {
                let max = if kind == SubatomicType::Blob32 {
                    u32::MAX as f64
                } else {
                    u16::MAX as f64
                };
                bound.fract() == 0.0 && (0.0..=max).contains(&bound)
            }
            _ => integer_limits(kind.scalar()).is_some_and(|(lo, hi)| {
                let scaled = scale(bound, self.divisor);
                lo <= scaled && scaled <= hi
            }),
        };

        if kind == SubatomicType::UInt32UInt8Array {
            return Err(DbError::Schema(format!("{} cannot take a range", kind)));
        }
        if let Some(bad) = ranges.iter().find(|r| !(fits(r.min) && fits(r.max))) {
            return Err(DbError::Schema(format!("{}: range {} does not fit", kind, bad)));
        }

        self.ranges = ranges;
        Ok(self)
    }

    /// Wrap packed values into `[0, modulus)`, in declared units.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` for non-numeric types, a non-positive
    /// modulus, or one the type cannot hold once scaled.
    pub fn with_modulus(mut self, modulus: f64) -> Result<Self, DbError> {
        if !self.kind.is_numeric() {
            return Err(DbError::Schema(format!("{} cannot take a modulus", self.kind)));
        }
        if !(modulus.is_finite() && modulus > 0.0) {
            return Err(DbError::Schema(format!("{}: invalid modulus {}", self.kind, modulus)));
        }
        if let Some((lo, hi)) = integer_limits(self.kind.scalar()) {
            let scaled = scale(modulus, self.divisor);
            let span = if lo < 0 { hi + 1 } else { hi - lo + 1 };
            if scaled < 1 || scaled > span {
                return Err(DbError::Schema(format!(
                    "{}: modulus {} does not fit",
                    self.kind, modulus
                )));
            }
        }

        self.modulus = Some(modulus);
        Ok(self)
    }

    #[inline]
    pub fn kind(&self) -> SubatomicType {
        self.kind
    }

    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn ranges(&self) -> &[RangeLimit] {
        &self.ranges
    }

    pub fn modulus(&self) -> Option<f64> {
        self.modulus
    }

    /// Check whether values of this type are presented as `Float64`.
    #[inline]
    pub fn is_scaled(&self) -> bool {
        self.divisor != 1
    }

    /// Byte length of a fixed-length `string`, `blob` or `blob32`.
    ///
    /// Such parameters are packed without a length prefix.
    pub fn fixed_length(&self) -> Option<usize> {
        match (self.kind, self.ranges.as_slice()) {
            (
                SubatomicType::String | SubatomicType::Blob | SubatomicType::Blob32,
                [range],
            ) if range.min == range.max => Some(range.min as usize),
            _ => None,
        }
    }

    /// Modulus in packed integer units.
    pub(crate) fn packed_modulus(&self) -> Option<i128> {
        self.modulus.map(|m| scale(m, self.divisor))
    }

    /// Check a packed integer (already scaled) against the limits.
    pub(crate) fn admits_packed(&self, raw: i128) -> bool {
        self.ranges.is_empty()
            || self
                .ranges
                .iter()
                .any(|r| scale(r.min, self.divisor) <= raw && raw <= scale(r.max, self.divisor))
    }

    /// Check a packed `float64` (already scaled) against the limits.
    pub(crate) fn admits_packed_float(&self, raw: f64) -> bool {
        let divisor = self.divisor as f64;
        self.ranges.is_empty()
            || self
                .ranges
                .iter()
                .any(|r| r.min * divisor <= raw && raw <= r.max * divisor)
    }

    /// Check a string or blob byte length against the limits.
    pub(crate) fn admits_length(&self, len: usize) -> bool {
        let len = len as f64;
        self.ranges.is_empty() || self.ranges.iter().any(|r| r.min <= len && len <= r.max)
    }

    /// Parse a comma-separated parameter list such as `"int16/10, int16/10"`.
    ///
    /// Commas inside range limits do not split.
    pub fn parse_list(list: &str) -> Result<Vec<ParameterType>, DbError> {
        let mut params = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in list.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    params.push(list[start..i].parse()?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        params.push(list[start..].parse()?);
        Ok(params)
    }
}

/// Inclusive integer bounds of a scalar type.
fn integer_limits(kind: SubatomicType) -> Option<(i128, i128)> {
    let limits = match kind {
        SubatomicType::Int8 => (i8::MIN as i128, i8::MAX as i128),
        SubatomicType::Int16 => (i16::MIN as i128, i16::MAX as i128),
        SubatomicType::Int32 => (i32::MIN as i128, i32::MAX as i128),
        SubatomicType::Int64 => (i64::MIN as i128, i64::MAX as i128),
        SubatomicType::UInt8 | SubatomicType::Char => (0, u8::MAX as i128),
        SubatomicType::UInt16 => (0, u16::MAX as i128),
        SubatomicType::UInt32 => (0, u32::MAX as i128),
        SubatomicType::UInt64 => (0, u64::MAX as i128),
        _ => return None,
    };
    Some(limits)
}

/// Scale a declared-unit bound to packed units, rounding half up.
fn scale(value: f64, divisor: u32) -> i128 {
    (value * divisor as f64 + 0.5).floor() as i128
}

fn parse_ranges(list: &str) -> Option<Vec<RangeLimit>> {
    list.split(',')
        .map(|item| {
            let item = item.trim();
            // The first character may be a sign; a later '-' separates the bounds.
            match item.get(1..).and_then(|tail| tail.find('-')) {
                Some(i) => {
                    let (min, max) = item.split_at(i + 1);
                    Some(RangeLimit::new(
                        min.trim().parse().ok()?,
                        max[1..].trim().parse().ok()?,
                    ))
                }
                None => Some(RangeLimit::exactly(item.parse().ok()?)),
            }
        })
        .collect()
}

impl FromStr for ParameterType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |what: &str| DbError::Schema(format!("invalid {} in {:?}", what, s));

        let text = s.trim();
        let end = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(text.len());
        let (name, mut rest) = text.split_at(end);
        let kind = SubatomicType::from_name(name)
            .ok_or_else(|| DbError::Schema(format!("unknown type {:?}", name)))?;

        let mut divisor = 1;
        let mut ranges = None;
        let mut modulus = None;
        loop {
            rest = rest.trim_start();
            let Some(marker) = rest.chars().next() else {
                break;
            };
            match marker {
                '(' => {
                    let close = rest.find(')').ok_or_else(|| invalid("range"))?;
                    ranges = Some(parse_ranges(&rest[1..close]).ok_or_else(|| invalid("range"))?);
                    rest = &rest[close + 1..];
                }
                '/' | '%' => {
                    let arg = &rest[1..];
                    let end = arg.find(['(', '/', '%']).unwrap_or(arg.len());
                    let value = arg[..end].trim();
                    if marker == '/' {
                        divisor = value.parse::<u32>().map_err(|_| invalid("divisor"))?;
                    } else {
                        modulus = Some(value.parse::<f64>().map_err(|_| invalid("modulus"))?);
                    }
                    rest = &arg[end..];
                }
                _ => return Err(invalid("suffix")),
            }
        }

        let mut param = Self::with_divisor(kind, divisor)?;
        if let Some(ranges) = ranges {
            param = param.with_ranges(ranges)?;
        }
        if let Some(modulus) = modulus {
            param = param.with_modulus(modulus)?;
        }
        Ok(param)
    }
}

impl TryFrom<String> for ParameterType {
    type Error = DbError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ParameterType> for String {
    fn from(param: ParameterType) -> Self {
        param.to_string()
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.ranges.is_empty() {
            f.write_str("(")?;
            for (i, range) in self.ranges.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", range)?;
            }
            f.write_str(")")?;
        }
        if self.divisor != 1 {
            write!(f, "/{}", self.divisor)?;
        }
        if let Some(modulus) = self.modulus {
            write!(f, "%{}", modulus)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_parses_back() {
        for kind in SubatomicType::ALL {
            assert_eq!(SubatomicType::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SubatomicType::from_name("float32"), None);
    }

    #[test]
    fn test_parse_with_divisor() {
        let param: ParameterType = " uint16 / 100 ".parse().unwrap();
        assert_eq!(param.kind(), SubatomicType::UInt16);
        assert_eq!(param.divisor(), 100);
        assert!(param.is_scaled());
    }

    #[test]
    fn test_divisor_rejected_for_strings() {
        assert!("string/10".parse::<ParameterType>().is_err());
        assert!("char/2".parse::<ParameterType>().is_err());
        assert!("int8/0".parse::<ParameterType>().is_err());
        assert!("int8/x".parse::<ParameterType>().is_err());
    }

    #[test]
    fn test_divisor_one_allowed_everywhere() {
        let param = ParameterType::with_divisor(SubatomicType::Blob, 1).unwrap();
        assert!(!param.is_scaled());
    }

    #[test]
    fn test_parse_list() {
        let params = ParameterType::parse_list("int16/10, int16/10,uint8").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[2], ParameterType::new(SubatomicType::UInt8));
        assert!(ParameterType::parse_list("int16, bogus").is_err());
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(SubatomicType::Int16.fixed_size(), Some(2));
        assert_eq!(SubatomicType::UInt32Array.fixed_size(), Some(4));
        assert_eq!(SubatomicType::UInt32UInt8Array.fixed_size(), Some(5));
        assert_eq!(SubatomicType::String.fixed_size(), None);
        assert!(SubatomicType::UInt32UInt8Array.is_array());
        assert!(!SubatomicType::Blob.is_array());
    }

    #[test]
    fn test_parse_range_limits() {
        let param: ParameterType = "uint8(0-100)".parse().unwrap();
        assert_eq!(param.ranges(), &[RangeLimit::new(0.0, 100.0)]);
        assert!(param.admits_packed(100));
        assert!(!param.admits_packed(101));

        let param: ParameterType = "int16(-10--5, 3)/10".parse().unwrap();
        assert_eq!(
            param.ranges(),
            &[RangeLimit::new(-10.0, -5.0), RangeLimit::exactly(3.0)]
        );
        assert!(param.admits_packed(-100));
        assert!(param.admits_packed(30));
        assert!(!param.admits_packed(0));
        assert_eq!(param.to_string(), "int16(-10--5, 3)/10");
    }

    #[test]
    fn test_range_must_fit_type() {
        assert!("uint8(0-300)".parse::<ParameterType>().is_err());
        assert!("int8(0-20)/10".parse::<ParameterType>().is_err());
        assert!("uint8(5-1)".parse::<ParameterType>().is_err());
        assert!("uint32uint8array(1-2)".parse::<ParameterType>().is_err());
        assert!("string(-1)".parse::<ParameterType>().is_err());
        assert!("uint8(0-".parse::<ParameterType>().is_err());
    }

    #[test]
    fn test_fixed_length_strings() {
        let param: ParameterType = "string(8)".parse().unwrap();
        assert_eq!(param.fixed_length(), Some(8));
        assert_eq!("blob32(4)".parse::<ParameterType>().unwrap().fixed_length(), Some(4));
        assert_eq!("string(0-8)".parse::<ParameterType>().unwrap().fixed_length(), None);
        assert_eq!("uint8(3)".parse::<ParameterType>().unwrap().fixed_length(), None);
    }

    #[test]
    fn test_parse_modulus() {
        let param: ParameterType = "uint16%360/100".parse().unwrap();
        assert_eq!(param.modulus(), Some(360.0));
        assert_eq!(param.divisor(), 100);
        assert_eq!(param.packed_modulus(), Some(36_000));
        assert_eq!(param.to_string(), "uint16/100%360");

        assert!("int8%128".parse::<ParameterType>().is_ok());
        assert!("int8%129".parse::<ParameterType>().is_err());
        assert!("uint8%256".parse::<ParameterType>().is_ok());
        assert!("uint8/2%200".parse::<ParameterType>().is_err());
        assert!("string%10".parse::<ParameterType>().is_err());
        assert!("int16%0".parse::<ParameterType>().is_err());
    }

    #[test]
    fn test_parse_list_keeps_ranges_together() {
        let params = ParameterType::parse_list("uint8(0-10, 20-30), string(4)").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].ranges().len(), 2);
        assert_eq!(params[1].fixed_length(), Some(4));
    }

    #[test]
    fn test_serde_as_string() {
        let param: ParameterType = serde_json::from_str("\"int32/1000\"").unwrap();
        assert_eq!(param.divisor(), 1000);
        assert_eq!(serde_json::to_string(&param).unwrap(), "\"int32/1000\"");
        assert!(serde_json::from_str::<ParameterType>("\"nope\"").is_err());
    }
}
