//! Data object descriptors.
//!
//! A [`DataObject`] pairs a fixed schema (id, name, access rights) with a
//! borrowed storage location. The storage is owned by the embedder; the core
//! reads and writes it in place through the references held in [`Value`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::BitOr;

/// Bits of an object id that carry its category.
pub const CATEGORY_MASK: u16 = 0xF000;

/// Shift of the category field within an object id.
pub const CATEGORY_SHIFT: u16 = 12;

/// Access rights bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Access(u8);

impl Access {
    pub const NONE: Access = Access(0);
    pub const READ: Access = Access(1 << 0);
    pub const WRITE: Access = Access(1 << 1);
    pub const EXEC: Access = Access(1 << 2);
    pub const READ_WRITE: Access = Access(Self::READ.0 | Self::WRITE.0);

    pub fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

/// Declared type of a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    Bool,
    Str,
    Exec,
}

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::U16 => "uint16",
            ObjectType::I16 => "int16",
            ObjectType::U32 => "uint32",
            ObjectType::I32 => "int32",
            ObjectType::U64 => "uint64",
            ObjectType::I64 => "int64",
            ObjectType::F32 => "float32",
            ObjectType::Bool => "bool",
            ObjectType::Str => "string",
            ObjectType::Exec => "exec",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed storage of a data object, tagged with its type.
#[derive(Clone, Copy)]
pub enum Value<'a> {
    U16(&'a Cell<u16>),
    I16(&'a Cell<i16>),
    U32(&'a Cell<u32>),
    I32(&'a Cell<i32>),
    U64(&'a Cell<u64>),
    I64(&'a Cell<i64>),
    /// Rendered with exactly `digits` fractional digits.
    F32 { value: &'a Cell<f32>, digits: u8 },
    Bool(&'a Cell<bool>),
    /// Holds at most `capacity - 1` bytes; `capacity` counts a terminator
    /// so tables can mirror the buffer sizes of C firmware.
    Str {
        value: &'a RefCell<String>,
        capacity: usize,
    },
    /// A function invoked by exec requests.
    Exec(&'a dyn Fn()),
}

impl<'a> Value<'a> {
    pub fn float(value: &'a Cell<f32>, digits: u8) -> Self {
        Value::F32 { value, digits }
    }

    pub fn string(value: &'a RefCell<String>, capacity: usize) -> Self {
        Value::Str { value, capacity }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Value::U16(_) => ObjectType::U16,
            Value::I16(_) => ObjectType::I16,
            Value::U32(_) => ObjectType::U32,
            Value::I32(_) => ObjectType::I32,
            Value::U64(_) => ObjectType::U64,
            Value::I64(_) => ObjectType::I64,
            Value::F32 { .. } => ObjectType::F32,
            Value::Bool(_) => ObjectType::Bool,
            Value::Str { .. } => ObjectType::Str,
            Value::Exec(_) => ObjectType::Exec,
        }
    }

    /// Fractional digits for floats, capacity for strings, 0 otherwise.
    pub fn detail(&self) -> usize {
        match self {
            Value::F32 { digits, .. } => usize::from(*digits),
            Value::Str { capacity, .. } => *capacity,
            _ => 0,
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U16(v) => f.debug_tuple("U16").field(&v.get()).finish(),
            Value::I16(v) => f.debug_tuple("I16").field(&v.get()).finish(),
            Value::U32(v) => f.debug_tuple("U32").field(&v.get()).finish(),
            Value::I32(v) => f.debug_tuple("I32").field(&v.get()).finish(),
            Value::U64(v) => f.debug_tuple("U64").field(&v.get()).finish(),
            Value::I64(v) => f.debug_tuple("I64").field(&v.get()).finish(),
            Value::F32 { value, digits } => f
                .debug_struct("F32")
                .field("value", &value.get())
                .field("digits", digits)
                .finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(&v.get()).finish(),
            Value::Str { value, capacity } => f
                .debug_struct("Str")
                .field("value", value)
                .field("capacity", capacity)
                .finish(),
            Value::Exec(_) => f.write_str("Exec"),
        }
    }
}

/// A named, typed, access-controlled value or function exposed by the device.
#[derive(Debug, Clone, Copy)]
pub struct DataObject<'a> {
    /// Unique id; the top four bits are the category.
    pub id: u16,
    /// Unique name, matched exactly.
    pub name: &'a str,
    pub access: Access,
    pub value: Value<'a>,
}

impl<'a> DataObject<'a> {
    pub fn new(id: u16, name: &'a str, access: Access, value: Value<'a>) -> Self {
        Self {
            id,
            name,
            access,
            value,
        }
    }

    /// Category number (0 to 15) taken from the id.
    pub fn category(&self) -> u8 {
        (self.id >> CATEGORY_SHIFT) as u8
    }

    /// Whether this object passes a category mask; a zero mask matches all.
    pub fn in_category(&self, mask: u16) -> bool {
        mask == 0 || self.id & CATEGORY_MASK == mask
    }

    pub fn object_type(&self) -> ObjectType {
        self.value.object_type()
    }

    pub fn detail(&self) -> usize {
        self.value.detail()
    }

    pub fn can(&self, access: Access) -> bool {
        self.access.contains(access)
    }
}
