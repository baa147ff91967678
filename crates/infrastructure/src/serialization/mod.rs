//! Deterministic JSON serialization for files written by Tollgate.
//!
//! - 2-space indentation
//! - Trailing newline
//! - UTF-8 encoding without BOM

mod json;

pub use json::*;
