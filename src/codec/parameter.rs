//! Packing of single DC parameters.
//!
//! Pack errors carry a description of the offending value; the field layer
//! turns it into `DbError::TypeMismatch` with the field's name and signature.
//! Scaled values round half up, `floor(value * divisor + 0.5)`, the way the
//! DC packer does.

use crate::dclass::{FieldValue, ParameterType, SubatomicType};
use crate::error::{DbError, Result};
use crate::protocol::{Datagram, DatagramIterator};

/// Description of a value that does not fit its parameter type.
pub(super) type Mismatch = String;

pub(super) fn describe(value: &FieldValue) -> Mismatch {
    match value {
        FieldValue::Array(items) => format!("array of {}", items.len()),
        FieldValue::Tuple(items) => format!("tuple of {}", items.len()),
        other => other.type_name().to_string(),
    }
}

fn out_of_range(value: &FieldValue) -> Mismatch {
    format!("{} {:?} (out of range)", value.type_name(), value)
}

/// Append one parameter value.
pub(super) fn pack(
    param: &ParameterType,
    value: &FieldValue,
    dg: &mut Datagram,
) -> std::result::Result<(), Mismatch> {
    match param.kind() {
        SubatomicType::Char => match *value {
            FieldValue::Char(c) if (c as u32) <= 0xFF && param.admits_packed(c as i128) => {
                dg.add_u8(c as u32 as u8);
                Ok(())
            }
            FieldValue::Char(_) => Err(out_of_range(value)),
            _ => Err(describe(value)),
        },
        SubatomicType::String => match value {
            FieldValue::String(s) => pack_bytes(param, s.as_bytes(), value, dg),
            _ => Err(describe(value)),
        },
        SubatomicType::Blob | SubatomicType::Blob32 => {
            let bytes = value.as_bytes().ok_or_else(|| describe(value))?;
            pack_bytes(param, bytes, value, dg)
        }
        SubatomicType::UInt32UInt8Array => {
            let FieldValue::Array(items) = value else {
                return Err(describe(value));
            };
            let first = ParameterType::new(SubatomicType::UInt32);
            let second = ParameterType::new(SubatomicType::UInt8);
            let mut body = Datagram::with_capacity(items.len() * 5);
            for item in items {
                match item {
                    FieldValue::Tuple(pair) if pair.len() == 2 => {
                        pack_scalar(&first, SubatomicType::UInt32, &pair[0], &mut body)?;
                        pack_scalar(&second, SubatomicType::UInt8, &pair[1], &mut body)?;
                    }
                    other => return Err(describe(other)),
                }
            }
            pack_sized16(body.as_bytes(), value, dg)
        }
        kind => match kind.element_type() {
            Some(element) => {
                let FieldValue::Array(items) = value else {
                    return Err(describe(value));
                };
                let mut body = Datagram::with_capacity(items.len() * 4);
                for item in items {
                    pack_scalar(param, element, item, &mut body)?;
                }
                pack_sized16(body.as_bytes(), value, dg)
            }
            None => pack_scalar(param, kind, value, dg),
        },
    }
}

/// Append a string or blob: length-checked, prefixed unless fixed-length.
fn pack_bytes(
    param: &ParameterType,
    bytes: &[u8],
    value: &FieldValue,
    dg: &mut Datagram,
) -> std::result::Result<(), Mismatch> {
    if !param.admits_length(bytes.len()) {
        return Err(out_of_range(value));
    }
    match (param.fixed_length(), param.kind()) {
        (Some(_), _) => {
            dg.add_data(bytes);
            Ok(())
        }
        (None, SubatomicType::Blob32) => {
            let len = u32::try_from(bytes.len()).map_err(|_| out_of_range(value))?;
            dg.add_u32(len);
            dg.add_data(bytes);
            Ok(())
        }
        (None, _) => pack_sized16(bytes, value, dg),
    }
}

/// Append bytes behind a `uint16` length prefix.
fn pack_sized16(
    bytes: &[u8],
    value: &FieldValue,
    dg: &mut Datagram,
) -> std::result::Result<(), Mismatch> {
    let len = u16::try_from(bytes.len()).map_err(|_| out_of_range(value))?;
    dg.add_u16(len);
    dg.add_data(bytes);
    Ok(())
}

/// Append a numeric value of `kind` under `param`'s divisor, modulus and limits.
fn pack_scalar(
    param: &ParameterType,
    kind: SubatomicType,
    value: &FieldValue,
    dg: &mut Datagram,
) -> std::result::Result<(), Mismatch> {
    let divisor = param.divisor();

    if kind == SubatomicType::Float64 {
        let v = value.as_f64().ok_or_else(|| describe(value))?;
        let mut real = v * divisor as f64;
        if let Some(modulus) = param.modulus() {
            real = wrap(real, modulus * divisor as f64);
        }
        if !param.admits_packed_float(real) {
            return Err(out_of_range(value));
        }
        dg.add_f64(real);
        return Ok(());
    }

    let raw = match value.as_integer() {
        Some(v) => {
            let raw = v * divisor as i128;
            match param.packed_modulus() {
                Some(modulus) => raw.rem_euclid(modulus),
                None => raw,
            }
        }
        None if param.is_scaled() => {
            let v = value.as_f64().ok_or_else(|| describe(value))?;
            let mut real = v * divisor as f64;
            if let Some(modulus) = param.modulus() {
                real = wrap(real, modulus * divisor as f64);
            }
            let rounded = (real + 0.5).floor();
            if !rounded.is_finite() {
                return Err(out_of_range(value));
            }
            rounded as i128
        }
        None => return Err(describe(value)),
    };

    if !param.admits_packed(raw) {
        return Err(out_of_range(value));
    }
    pack_integer(kind, raw, dg).ok_or_else(|| out_of_range(value))
}

/// Wrap `real` into `[0, modulus)`; negative values wrap upward.
fn wrap(real: f64, modulus: f64) -> f64 {
    if real < 0.0 {
        let wrapped = modulus - (-real % modulus);
        if wrapped == modulus {
            0.0
        } else {
            wrapped
        }
    } else {
        real % modulus
    }
}

fn pack_integer(kind: SubatomicType, v: i128, dg: &mut Datagram) -> Option<()> {
    match kind {
        SubatomicType::Int8 => dg.add_i8(i8::try_from(v).ok()?),
        SubatomicType::Int16 => dg.add_i16(i16::try_from(v).ok()?),
        SubatomicType::Int32 => dg.add_i32(i32::try_from(v).ok()?),
        SubatomicType::Int64 => dg.add_i64(i64::try_from(v).ok()?),
        SubatomicType::UInt8 => dg.add_u8(u8::try_from(v).ok()?),
        SubatomicType::UInt16 => dg.add_u16(u16::try_from(v).ok()?),
        SubatomicType::UInt32 => dg.add_u32(u32::try_from(v).ok()?),
        SubatomicType::UInt64 => dg.add_u64(u64::try_from(v).ok()?),
        _ => return None,
    }
    Some(())
}

fn outside_limits(param: &ParameterType, raw: impl std::fmt::Display) -> DbError {
    DbError::Decode(format!("{} value {} is outside its range limits", param, raw))
}

/// Read one parameter value.
pub(super) fn unpack(param: &ParameterType, di: &mut DatagramIterator<'_>) -> Result<FieldValue> {
    match param.kind() {
        SubatomicType::Char => {
            let raw = di.get_u8()?;
            if !param.admits_packed(raw as i128) {
                return Err(outside_limits(param, raw));
            }
            Ok(FieldValue::Char(raw as char))
        }
        SubatomicType::String => {
            let data = unpack_bytes(param, di)?;
            String::from_utf8(data.to_vec())
                .map(FieldValue::String)
                .map_err(|_| DbError::Decode("string is not valid UTF-8".to_string()))
        }
        SubatomicType::Blob | SubatomicType::Blob32 => {
            Ok(FieldValue::Blob(unpack_bytes(param, di)?.to_vec()))
        }
        SubatomicType::UInt32UInt8Array => {
            let count = array_len(SubatomicType::UInt32UInt8Array, di)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let a = FieldValue::UInt32(di.get_u32()?);
                let b = FieldValue::UInt8(di.get_u8()?);
                items.push(FieldValue::Tuple(vec![a, b]));
            }
            Ok(FieldValue::Array(items))
        }
        kind => match kind.element_type() {
            Some(element) => {
                let count = array_len(kind, di)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(unpack_scalar(param, element, di)?);
                }
                Ok(FieldValue::Array(items))
            }
            None => unpack_scalar(param, kind, di),
        },
    }
}

/// Read string or blob bytes, honouring fixed lengths and length limits.
fn unpack_bytes<'a>(param: &ParameterType, di: &mut DatagramIterator<'a>) -> Result<&'a [u8]> {
    let len = match (param.fixed_length(), param.kind()) {
        (Some(len), _) => len,
        (None, SubatomicType::Blob32) => di.get_u32()? as usize,
        (None, _) => di.get_u16()? as usize,
    };
    if !param.admits_length(len) {
        return Err(outside_limits(param, format!("of length {}", len)));
    }
    di.get_data(len)
}

/// Read an array's `uint16` byte length and turn it into an element count.
fn array_len(kind: SubatomicType, di: &mut DatagramIterator<'_>) -> Result<usize> {
    let bytes = di.get_u16()? as usize;
    let size = kind.fixed_size().unwrap_or(1);
    if bytes % size != 0 {
        return Err(DbError::Decode(format!(
            "{} length {} is not a multiple of {}",
            kind, bytes, size
        )));
    }
    if di.remaining() < bytes {
        return Err(DbError::truncated(kind.name(), bytes, di.remaining()));
    }
    Ok(bytes / size)
}

fn unpack_scalar(
    param: &ParameterType,
    kind: SubatomicType,
    di: &mut DatagramIterator<'_>,
) -> Result<FieldValue> {
    let value = match kind {
        SubatomicType::Int8 => FieldValue::Int8(di.get_i8()?),
        SubatomicType::Int16 => FieldValue::Int16(di.get_i16()?),
        SubatomicType::Int32 => FieldValue::Int32(di.get_i32()?),
        SubatomicType::Int64 => FieldValue::Int64(di.get_i64()?),
        SubatomicType::UInt8 => FieldValue::UInt8(di.get_u8()?),
        SubatomicType::UInt16 => FieldValue::UInt16(di.get_u16()?),
        SubatomicType::UInt32 => FieldValue::UInt32(di.get_u32()?),
        SubatomicType::UInt64 => FieldValue::UInt64(di.get_u64()?),
        SubatomicType::Float64 => FieldValue::Float64(di.get_f64()?),
        other => {
            return Err(DbError::Decode(format!("{} is not a scalar type", other)));
        }
    };

    let admitted = match (value.as_integer(), value.as_f64()) {
        (Some(raw), _) => param.admits_packed(raw),
        (None, Some(raw)) => param.admits_packed_float(raw),
        (None, None) => true,
    };
    if !admitted {
        return Err(outside_limits(param, format!("{:?}", value)));
    }

    if !param.is_scaled() {
        return Ok(value);
    }
    match value.as_f64() {
        Some(raw) => Ok(FieldValue::Float64(raw / param.divisor() as f64)),
        None => Ok(value),
    }
}
