///
/// Connection configuration.
///
/// Loaded from TOML, every key optional:
///
/// ```toml
/// name = "app.db"      # absent or empty opens an in-memory database
/// read_only = false
/// create = true        # create the file when missing (ignored when read_only)
/// uri = false          # interpret the name as a file: URI
/// ```
///

use std::ffi::c_int;
use std::fs;
use std::path::Path;

use rusqlite::ffi;
use serde::{Deserialize, Serialize};
use sqlo_core::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenConfig {
    pub name: Option<String>,
    pub read_only: bool,
    pub create: bool,
    pub uri: bool,
}

impl Default for OpenConfig {
    fn default() -> Self {
        Self {
            name: None,
            read_only: false,
            create: true,
            uri: false,
        }
    }
}

impl OpenConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn uri(mut self, uri: bool) -> Self {
        self.uri = uri;
        self
    }

    /// Flags for `sqlite3_open_v2`.
    pub(crate) fn flags(&self) -> c_int {
        let mut flags = if self.read_only {
            ffi::SQLITE_OPEN_READONLY
        } else if self.create {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        } else {
            ffi::SQLITE_OPEN_READWRITE
        };
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        flags
    }
}
