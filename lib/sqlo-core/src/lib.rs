//!
//! sqlo-core - Core Value and Error Types
//!
//! This crate provides the fundamental types shared across the sqlo crates:
//!
//! - `Value` for owned column values read back from a result row
//! - `BindValue` for a host value classified into a bindable category
//! - `Bindable` for host types that may be offered to a bind call
//! - `Error` and `Result` for every failure the binding layer reports
//!
//! Classification happens once, at the boundary, through `Bindable::classify`.
//! Everything downstream matches on `BindValue` and never inspects the host
//! type again.
//!

pub mod error;
pub mod value;

pub use error::*;
pub use value::*;
