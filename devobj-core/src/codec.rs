//! Value codec.
//!
//! Converts between an object's borrowed storage and its JSON text:
//!
//! - [`serialize`] appends the current value to a response.
//! - [`validate`] checks that request text converts to the object's type
//!   without touching storage.
//! - [`commit`] performs the same conversion and stores the result.
//!
//! Keeping validation free of side effects is what lets the write handler
//! check a whole batch before committing any of it.
//!
//! Integer text follows the `strtol` base-0 convention: optional sign, `0x`
//! for hex, a leading `0` for octal, decimal otherwise. Values that do not
//! fit the target width are rejected, never truncated.

use crate::object::{DataObject, Value};
use devobj_protocol::{ResponseWriter, Status, TokenKind};

/// Longest value text accepted, plus one: the widest signed 64-bit decimal
/// (`-9223372036854775808`) is 20 bytes.
pub const VALUE_SCRATCH_LEN: usize = 21;

/// A converted value, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Converted<'t> {
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    Bool(bool),
    Str(&'t str),
}

/// Appends the object's value followed by `", "`.
///
/// With `include_name` the value is prefixed by `"<name>":`. Strings are
/// written between quotes as stored, without escaping.
pub fn serialize(
    resp: &mut ResponseWriter<'_>,
    object: &DataObject<'_>,
    include_name: bool,
) -> Result<(), Status> {
    let mark = resp.len();
    let result = write_value(resp, object, include_name);
    if result.is_err() {
        // Drop a name prefix written before the value failed.
        resp.truncate(mark);
    }
    result
}

fn write_value(
    resp: &mut ResponseWriter<'_>,
    object: &DataObject<'_>,
    include_name: bool,
) -> Result<(), Status> {
    if let Value::Exec(_) = object.value {
        return Err(Status::WrongType);
    }
    if include_name {
        resp.append_fmt(format_args!("\"{}\":", object.name))?;
    }

    match object.value {
        Value::U16(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::I16(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::U32(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::I32(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::U64(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::I64(v) => resp.append_fmt(format_args!("{}, ", v.get()))?,
        Value::F32 { value, digits } => {
            resp.append_fmt(format_args!("{:.*}, ", usize::from(digits), value.get()))?
        }
        Value::Bool(v) => resp.append(if v.get() { "true, " } else { "false, " })?,
        Value::Str { value, .. } => {
            let stored = value.try_borrow().map_err(|_| Status::DeviceBusy)?;
            resp.append_fmt(format_args!("\"{}\", ", stored.as_str()))?
        }
        Value::Exec(_) => return Err(Status::WrongType),
    }
    Ok(())
}

/// Checks that `text` (from a token of `kind`) can be stored in `object`.
///
/// Performs the full conversion but never writes to storage.
pub fn validate(object: &DataObject<'_>, kind: TokenKind, text: &str) -> Result<(), Status> {
    convert(object, kind, text)?;
    if let Value::Str { value, .. } = object.value {
        // The commit pass must be able to borrow the string.
        value.try_borrow_mut().map_err(|_| Status::DeviceBusy)?;
    }
    Ok(())
}

/// Converts `text` and stores it in `object`.
///
/// Intended to run only after [`validate`] accepted every field of a batch;
/// it repeats the conversion and reports the same errors if called on text
/// that was never validated.
pub fn commit(object: &DataObject<'_>, kind: TokenKind, text: &str) -> Result<(), Status> {
    match (object.value, convert(object, kind, text)?) {
        (Value::U16(v), Converted::U16(x)) => v.set(x),
        (Value::I16(v), Converted::I16(x)) => v.set(x),
        (Value::U32(v), Converted::U32(x)) => v.set(x),
        (Value::I32(v), Converted::I32(x)) => v.set(x),
        (Value::U64(v), Converted::U64(x)) => v.set(x),
        (Value::I64(v), Converted::I64(x)) => v.set(x),
        (Value::F32 { value, .. }, Converted::F32(x)) => value.set(x),
        (Value::Bool(v), Converted::Bool(x)) => v.set(x),
        (Value::Str { value, .. }, Converted::Str(x)) => {
            let mut stored = value.try_borrow_mut().map_err(|_| Status::DeviceBusy)?;
            stored.clear();
            stored.push_str(x);
        }
        _ => return Err(Status::WrongType),
    }
    Ok(())
}

fn convert<'t>(
    object: &DataObject<'_>,
    kind: TokenKind,
    text: &'t str,
) -> Result<Converted<'t>, Status> {
    if let Value::Exec(_) = object.value {
        return Err(Status::WrongType);
    }
    if text.len() >= VALUE_SCRATCH_LEN {
        return Err(Status::InvalidValue);
    }

    match object.value {
        Value::Str { capacity, .. } => {
            if text.len() >= capacity {
                return Err(Status::InvalidValue);
            }
            if kind != TokenKind::String {
                return Err(Status::WrongType);
            }
            Ok(Converted::Str(text))
        }
        Value::Bool(_) => match text.as_bytes().first() {
            Some(b't' | b'1') => Ok(Converted::Bool(true)),
            Some(b'f' | b'0') => Ok(Converted::Bool(false)),
            _ => Err(Status::WrongType),
        },
        numeric => {
            if kind != TokenKind::Primitive {
                return Err(Status::WrongType);
            }
            match numeric {
                Value::U16(_) => narrow(parse_integer(text)?).map(Converted::U16),
                Value::I16(_) => narrow(parse_integer(text)?).map(Converted::I16),
                Value::U32(_) => narrow(parse_integer(text)?).map(Converted::U32),
                Value::I32(_) => narrow(parse_integer(text)?).map(Converted::I32),
                Value::U64(_) => narrow(parse_integer(text)?).map(Converted::U64),
                Value::I64(_) => narrow(parse_integer(text)?).map(Converted::I64),
                Value::F32 { .. } => parse_float(text).map(Converted::F32),
                Value::Bool(_) | Value::Str { .. } | Value::Exec(_) => Err(Status::WrongType),
            }
        }
    }
}

fn narrow<T: TryFrom<i128>>(value: i128) -> Result<T, Status> {
    T::try_from(value).map_err(|_| Status::InvalidValue)
}

/// Parses integer text with `strtol` base-0 prefixes.
///
/// Text that is not a number is a type error. Input is shorter than
/// [`VALUE_SCRATCH_LEN`], so every magnitude fits in an `i128`.
fn parse_integer(text: &str) -> Result<i128, Status> {
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Status::WrongType);
    }
    let magnitude = u128::from_str_radix(digits, radix).map_err(|_| Status::WrongType)?;
    let magnitude = i128::try_from(magnitude).map_err(|_| Status::InvalidValue)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> Result<f32, Status> {
    let is_numeral = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !is_numeral {
        return Err(Status::WrongType);
    }
    let value: f64 = text.parse().map_err(|_| Status::WrongType)?;
    if !value.is_finite() || value.abs() > f64::from(f32::MAX) {
        return Err(Status::InvalidValue);
    }
    Ok(value as f32)
}
