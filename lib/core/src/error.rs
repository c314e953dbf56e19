//! Error handling foundation for backbone.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error enums in its own
//! error module; reports carry them upward through the layers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// `C` is the crate-level error enum the report is rooted in.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
