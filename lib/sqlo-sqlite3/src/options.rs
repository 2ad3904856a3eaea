///
/// Engine compile options.
///
/// Read-only view over the flags the bundled engine was built with. Names are
/// reported without their `SQLITE_` prefix, and lookups accept either form.
///

use std::ffi::CString;

use indexmap::IndexMap;
use rusqlite::ffi;
use serde::{Serialize, Serializer};

use crate::result::text_from;

/// Value of one compile option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Defined without a value, e.g. `ENABLE_FTS5`.
    Defined,
    Integer(i64),
    Text(String),
}

impl OptionValue {
    fn parse(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) => OptionValue::Integer(n),
            Err(_) => OptionValue::Text(value.to_string()),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Defined => serializer.serialize_bool(true),
            OptionValue::Integer(n) => serializer.serialize_i64(*n),
            OptionValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Every compile option, in the order the engine reports them.
pub fn compile_options() -> IndexMap<String, OptionValue> {
    let mut options = IndexMap::new();
    for index in 0.. {
        let Some(entry) = (unsafe { text_from(ffi::sqlite3_compileoption_get(index)) }) else {
            break;
        };
        let (name, value) = match entry.split_once('=') {
            Some((name, value)) => (name.to_string(), OptionValue::parse(value)),
            None => (entry, OptionValue::Defined),
        };
        options.insert(name, value);
    }
    options
}

/// Whether `name` (with or without the `SQLITE_` prefix) was compiled in.
pub fn compile_option_used(name: &str) -> bool {
    let Ok(c_name) = CString::new(name) else {
        return false;
    };
    unsafe { ffi::sqlite3_compileoption_used(c_name.as_ptr()) != 0 }
}

/// Looks up each of `names`.
pub fn compile_options_used<I, S>(names: I) -> IndexMap<String, bool>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.as_ref();
            (name.to_string(), compile_option_used(name))
        })
        .collect()
}

/// Overwrites every value in `options` with whether its key is compiled in.
pub fn populate_compile_options(options: &mut IndexMap<String, bool>) {
    for (name, used) in options.iter_mut() {
        *used = compile_option_used(name);
    }
}
