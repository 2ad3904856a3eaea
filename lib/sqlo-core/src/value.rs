//!
//! Value Representation
//!
//! Two directions of data flow are modelled here:
//!
//! - Inbound: a host value offered to a bind call is classified into a
//!   `BindValue`, one variant per bindable category (null, number, text,
//!   boolean, blob). Classification is done by the `Bindable` trait and is
//!   pure; any host shape outside the closed set is rejected with
//!   `Unsupported`, never coerced.
//! - Outbound: a column read from a result row is materialized as an owned
//!   `Value`, mirroring the engine's five fundamental storage classes.
//!
//! Numbers keep enough information to choose the narrowest native setter:
//! integral values inside the signed 32-bit range bind as 32-bit ints, other
//! integral values as 64-bit ints, and everything else as doubles.
//!

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::Error;

/// Bindable value categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    Null,
    Number,
    Text,
    Boolean,
    Blob,
}

impl BindType {
    pub fn name(self) -> &'static str {
        match self {
            BindType::Null => "null",
            BindType::Number => "number",
            BindType::Text => "text",
            BindType::Boolean => "boolean",
            BindType::Blob => "blob",
        }
    }
}

impl fmt::Display for BindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric host value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

/// The native setter a number is routed to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberBinding {
    Int32(i32),
    Int64(i64),
    Double(f64),
}

// 2^63 is exactly representable; every f64 in [-2^63, 2^63) converts to i64 losslessly.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;

impl Number {
    pub fn binding(self) -> NumberBinding {
        match self {
            Number::Integer(v) => match i32::try_from(v) {
                Ok(small) => NumberBinding::Int32(small),
                Err(_) => NumberBinding::Int64(v),
            },
            Number::Real(v) => {
                if v.fract() == 0.0 && (I64_LOWER..I64_UPPER_EXCLUSIVE).contains(&v) {
                    Number::Integer(v as i64).binding()
                } else {
                    NumberBinding::Double(v)
                }
            }
        }
    }
}

/// A host value classified into exactly one bindable category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindValue<'a> {
    Null,
    Number(Number),
    Text(&'a str),
    Boolean(bool),
    Blob(&'a [u8]),
}

impl<'a> BindValue<'a> {
    pub fn bind_type(&self) -> BindType {
        match self {
            BindValue::Null => BindType::Null,
            BindValue::Number(_) => BindType::Number,
            BindValue::Text(_) => BindType::Text,
            BindValue::Boolean(_) => BindType::Boolean,
            BindValue::Blob(_) => BindType::Blob,
        }
    }

    /// Reinterprets the value for a forced blob binding.
    ///
    /// Text becomes its UTF-8 bytes and null stays null. Numbers and booleans
    /// have no blob form and yield `None`.
    pub fn into_blob(self) -> Option<BindValue<'a>> {
        match self {
            BindValue::Null => Some(BindValue::Null),
            BindValue::Text(s) => Some(BindValue::Blob(s.as_bytes())),
            BindValue::Blob(b) => Some(BindValue::Blob(b)),
            BindValue::Number(_) | BindValue::Boolean(_) => None,
        }
    }
}

/// A host value whose shape falls outside the bindable categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported {
    pub type_name: &'static str,
}

impl Unsupported {
    pub fn new(type_name: &'static str) -> Self {
        Self { type_name }
    }
}

impl From<Unsupported> for Error {
    fn from(unsupported: Unsupported) -> Self {
        Error::UnsupportedValueType {
            type_name: unsupported.type_name,
            context: "bind()",
        }
    }
}

/// A host value that may be offered to a bind call.
///
/// Implementations must be pure: classifying the same value twice yields
/// the same result.
pub trait Bindable {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported>;
}

impl<T: Bindable + ?Sized> Bindable for &T {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        (**self).classify()
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        match self {
            Some(value) => value.classify(),
            None => Ok(BindValue::Null),
        }
    }
}

impl Bindable for () {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Null)
    }
}

macro_rules! bindable_integer {
    ($($ty:ty),*) => {
        $(
            impl Bindable for $ty {
                fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
                    Ok(BindValue::Number(Number::Integer(i64::from(*self))))
                }
            }
        )*
    };
}

bindable_integer!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! bindable_wide_integer {
    ($($ty:ty),*) => {
        $(
            impl Bindable for $ty {
                fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
                    i64::try_from(*self)
                        .map(|v| BindValue::Number(Number::Integer(v)))
                        .map_err(|_| Unsupported::new(stringify!($ty)))
                }
            }
        )*
    };
}

bindable_wide_integer!(u64, isize, usize);

// Arbitrary-precision integers are never narrowed.
macro_rules! unsupported_integer {
    ($($ty:ty),*) => {
        $(
            impl Bindable for $ty {
                fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
                    Err(Unsupported::new(stringify!($ty)))
                }
            }
        )*
    };
}

unsupported_integer!(i128, u128);

impl Bindable for f32 {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Number(Number::Real(f64::from(*self))))
    }
}

impl Bindable for f64 {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Number(Number::Real(*self)))
    }
}

impl Bindable for bool {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Boolean(*self))
    }
}

impl Bindable for str {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Text(self))
    }
}

impl Bindable for String {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Text(self.as_str()))
    }
}

impl Bindable for Cow<'_, str> {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Text(self.as_ref()))
    }
}

impl Bindable for [u8] {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Blob(self))
    }
}

impl<const N: usize> Bindable for [u8; N] {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Blob(self.as_slice()))
    }
}

impl Bindable for Vec<u8> {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(BindValue::Blob(self.as_slice()))
    }
}

impl Bindable for Value {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        Ok(match self {
            Value::Null => BindValue::Null,
            Value::Integer(v) => BindValue::Number(Number::Integer(*v)),
            Value::Real(v) => BindValue::Number(Number::Real(*v)),
            Value::Text(s) => BindValue::Text(s.as_str()),
            Value::Blob(b) => BindValue::Blob(b.as_slice()),
        })
    }
}

/// JSON is the dynamic host value: scalars classify, containers do not.
impl Bindable for serde_json::Value {
    fn classify(&self) -> Result<BindValue<'_>, Unsupported> {
        use serde_json::Value as Json;

        match self {
            Json::Null => Ok(BindValue::Null),
            Json::Bool(b) => Ok(BindValue::Boolean(*b)),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(BindValue::Number(Number::Integer(v)))
                } else if n.is_u64() {
                    Err(Unsupported::new("u64"))
                } else {
                    n.as_f64()
                        .map(|v| BindValue::Number(Number::Real(v)))
                        .ok_or(Unsupported::new("number"))
                }
            }
            Json::String(s) => Ok(BindValue::Text(s.as_str())),
            Json::Array(_) => Err(Unsupported::new("array")),
            Json::Object(_) => Err(Unsupported::new("object")),
        }
    }
}

/// Fundamental storage class of a column in the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

/// An owned column value read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::Null,
            Value::Integer(_) => ColumnType::Integer,
            Value::Real(_) => ColumnType::Float,
            Value::Text(_) => ColumnType::Text,
            Value::Blob(_) => ColumnType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}
