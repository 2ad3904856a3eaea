//!
//! sqlo SQLite3 Connection and Statement Layer
//!
//! Provides an object layer over the raw SQLite C API (the `ffi` module of
//! rusqlite with the bundled engine, so there is no system dependency).
//!
//! Architecture:
//! - `Database` exclusively owns one native connection handle and a registry
//!   of the statement states derived from it, keyed by a connection-local
//!   statement id.
//! - `Statement` is the client-side view of one registry entry. It holds a
//!   weak reference back to the connection plus its id and never owns the
//!   native handle itself, so closing the connection finalizes every
//!   statement and later calls through a stale `Statement` fail with
//!   `ResourceClosed`.
//! - Text and blob values are copied into engine-heap buffers that the
//!   statement keeps alive until the binding is replaced, cleared, or the
//!   statement is finalized.
//! - Every native status code goes through one check that fetches the
//!   engine's own message.
//!
//! All types are `!Send`: a connection and its statements belong to one
//! thread.
//!
//! Operations:
//! - Connection: open, open_with, open_in_memory, prepare, exec, close,
//!   file_name, changes, interrupt
//! - Statement: bind, bind_at, bind_values, bind_named, bind_json,
//!   bind_json_at, bind_as_blob, bind_as_blob_at, clear_bindings, reset,
//!   finalize, step, get, row, column_name, column_names, column_type
//! - Engine: compile_options, compile_option_used, version
//!

mod bind;
pub mod config;
pub mod connection;
mod memory;
pub mod options;
pub mod param;
mod result;
pub mod statement;

pub use config::OpenConfig;
pub use connection::Database;
pub use options::{
    compile_option_used, compile_options, compile_options_used, populate_compile_options,
    OptionValue,
};
pub use param::ParamKey;
pub use statement::Statement;

pub use sqlo_core::{
    BindType, BindValue, Bindable, ColumnType, Error, Number, Resource, Result, Unsupported,
    Value,
};

use serde::Serialize;

/// Version of this object layer's API.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine and API version information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub lib: String,
    pub source_id: String,
    pub api: &'static str,
}

pub fn version() -> Version {
    // Both strings are static and owned by the engine.
    let (lib, source_id) = unsafe {
        (
            result::text_from(rusqlite::ffi::sqlite3_libversion()),
            result::text_from(rusqlite::ffi::sqlite3_sourceid()),
        )
    };
    Version {
        lib: lib.unwrap_or_default(),
        source_id: source_id.unwrap_or_default(),
        api: API_VERSION,
    }
}
