///
/// Binding layer error types.
///
/// Every failure is raised synchronously at the call that detected it.
/// Native failures always carry the engine's own message text; nothing in
/// this layer invents a message for a non-zero engine status code.
///

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The kind of object whose native handle has already been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Database,
    Statement,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Database => f.write_str("Database"),
            Resource::Statement => f.write_str("Statement"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message} (native code {code})")]
    NativeFailure { code: i32, message: String },

    #[error("{resource} has been closed")]
    ResourceClosed { resource: Resource },

    #[error("Invalid bind() parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: &'static str },

    #[error("Unsupported {context} argument type: {type_name}")]
    UnsupportedValueType {
        type_name: &'static str,
        context: &'static str,
    },

    #[error("Empty SQL is not permitted")]
    EmptyStatement,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("This statement has no bindable parameters")]
    NoBindableParameters,

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn closed(resource: Resource) -> Self {
        Error::ResourceClosed { resource }
    }

    /// The engine status code, for `NativeFailure` errors.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::NativeFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ResourceClosed { .. })
    }
}
