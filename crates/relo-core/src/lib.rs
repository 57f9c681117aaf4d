//! Core shared types for relo.
//!
//! This crate is intentionally small: text ranges, line/column conversion and the
//! qualified-name helpers every other crate in the workspace speaks in.

mod name;
mod text;

pub use name::{
    decapitalize, is_valid_identifier, validate_package_name, FqName, PackageNameError,
};
pub use text::{LineCol, LineIndex, TextRange};
