//! Error types for stackpatch operations.
//!
//! This module provides the main error type [`StackpatchError`] which wraps
//! the error conditions that can occur while updating templates.

use std::{io, path::PathBuf};

use thiserror::Error;

use stackpatch_parser::{WriteError, error::ParseError};

/// The main error type for stackpatch operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant carries the source text and the path it was read
/// from, so the diagnostics inside it can be rendered with snippets.
#[derive(Debug, Error)]
pub enum StackpatchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse {
        err: ParseError,
        src: String,
        path: PathBuf,
    },

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No image found matching `{pattern}`")]
    ExternalLookupEmpty { pattern: String },

    #[error("Unsupported file {}: expected .yaml, .yml or .json", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StackpatchError {
    /// Create a new `Parse` error with the associated source code and path.
    pub fn new_parse_error(
        err: ParseError,
        src: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::Parse {
            err,
            src: src.into(),
            path: path.into(),
        }
    }
}

impl From<walkdir::Error> for StackpatchError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.into())
    }
}
