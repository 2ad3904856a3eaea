///
/// Bind target resolution.
///
/// A bind target is either a 1-based position or a parameter name. Names
/// must include their prefix character (`:`, `@`, `$` or `?`) exactly as
/// written in the SQL. Both forms resolve to a position in
/// `[1, parameter_count]`; anything else is `InvalidParameter`.
///

use std::borrow::Cow;
use std::ffi::{c_int, CString};
use std::fmt;

use rusqlite::ffi;
use sqlo_core::{Error, Result};

/// A positional index or a parameter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey<'a> {
    Index(i64),
    Name(Cow<'a, str>),
}

impl fmt::Display for ParamKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Index(index) => write!(f, "{}", index),
            ParamKey::Name(name) => f.write_str(name),
        }
    }
}

macro_rules! param_key_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamKey<'_> {
                fn from(index: $ty) -> Self {
                    ParamKey::Index(i64::from(index))
                }
            }
        )*
    };
}

param_key_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for ParamKey<'_> {
    fn from(index: usize) -> Self {
        ParamKey::Index(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

impl<'a> From<&'a str> for ParamKey<'a> {
    fn from(name: &'a str) -> Self {
        ParamKey::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ParamKey<'_> {
    fn from(name: String) -> Self {
        ParamKey::Name(Cow::Owned(name))
    }
}

impl<'a> From<&'a String> for ParamKey<'a> {
    fn from(name: &'a String) -> Self {
        ParamKey::Name(Cow::Borrowed(name.as_str()))
    }
}

/// Numeric keys must be integral.
impl TryFrom<f64> for ParamKey<'_> {
    type Error = Error;

    fn try_from(index: f64) -> Result<Self> {
        if !index.is_finite() || index.fract() != 0.0 {
            return Err(Error::InvalidParameter {
                key: index.to_string(),
                reason: "index must be an integer",
            });
        }
        Ok(ParamKey::Index(index as i64))
    }
}

impl<'a> TryFrom<&'a serde_json::Value> for ParamKey<'a> {
    type Error = Error;

    fn try_from(key: &'a serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        match key {
            Json::String(name) => Ok(ParamKey::Name(Cow::Borrowed(name.as_str()))),
            Json::Number(n) => match n.as_i64() {
                Some(index) => Ok(ParamKey::Index(index)),
                None => ParamKey::try_from(n.as_f64().unwrap_or(f64::NAN)),
            },
            other => Err(Error::InvalidParameter {
                key: other.to_string(),
                reason: "key must be an index or a name",
            }),
        }
    }
}

/// Resolves `key` against a statement declaring `parameter_count` parameters.
pub(crate) fn resolve(
    stmt: *mut ffi::sqlite3_stmt,
    parameter_count: usize,
    key: &ParamKey<'_>,
) -> Result<c_int> {
    match key {
        ParamKey::Index(index) => check_position(*index, parameter_count),
        ParamKey::Name(name) => {
            let c_name = CString::new(name.as_bytes()).map_err(|_| Error::InvalidParameter {
                key: key.to_string(),
                reason: "name contains a NUL byte",
            })?;
            let position = unsafe { ffi::sqlite3_bind_parameter_index(stmt, c_name.as_ptr()) };
            if position == 0 {
                return Err(Error::InvalidParameter {
                    key: key.to_string(),
                    reason: "no parameter with this name",
                });
            }
            check_position(i64::from(position), parameter_count)
        }
    }
}

/// Accepts 1-based positions in `[1, parameter_count]`.
pub(crate) fn check_position(index: i64, parameter_count: usize) -> Result<c_int> {
    let in_range = usize::try_from(index).is_ok_and(|i| i >= 1 && i <= parameter_count);
    if !in_range {
        return Err(Error::InvalidParameter {
            key: index.to_string(),
            reason: "index is out of range",
        });
    }
    c_int::try_from(index).map_err(|_| Error::InvalidParameter {
        key: index.to_string(),
        reason: "index is out of range",
    })
}
