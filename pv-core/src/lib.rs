//! Piano Video Core - Fundamental types
//!
//! This crate provides the core types used throughout Piano Video:
//! - `Value`: Runtime values held by properties and attributes
//! - `Property`: Typed, validated value containers
//! - `PvError`: Structured errors with machine-readable codes

mod value;
mod props;
mod error;

pub use value::Value;
pub use props::{Property, PropKind, PropError};
pub use error::{PvError, ErrorKind, codes};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Value, Property, PropKind, PvError, ErrorKind};
    pub use crate::error::codes;
}
