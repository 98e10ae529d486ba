//! Error and diagnostic system for the template loader.
//!
//! This module provides:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//!
//! Every problem is a [`Diagnostic`]. One or more diagnostics are wrapped in
//! a [`ParseError`], which is what [`crate::Loader::load`] returns.
//!
//! # Example
//!
//! ```
//! # use stackpatch_parser::error::{Diagnostic, ErrorCode};
//! # use stackpatch_parser::Span;
//!
//! let diag = Diagnostic::error("duplicate key `Bucket`")
//!     .with_code(ErrorCode::E102)
//!     .with_label(Span::new(100..106), "duplicate key")
//!     .with_secondary_label(Span::new(50..56), "first defined here")
//!     .with_help("rename or remove one of the entries");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;
pub(crate) use parse_error::Result;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
