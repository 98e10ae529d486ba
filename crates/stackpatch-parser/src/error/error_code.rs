//! Error codes for the loader diagnostics.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Scanner errors (characters and tokens)
//! - `E1xx` - Structure errors (YAML block and flow structure)
//! - `E2xx` - JSON errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Scanner Errors (E0xx)
    // =========================================================================
    /// Tab character in indentation.
    ///
    /// YAML indentation must use spaces.
    E001,

    /// Unexpected character.
    E002,

    /// Invalid escape sequence in a double-quoted scalar.
    E003,

    /// Unterminated quoted scalar.
    E004,

    /// Invalid block scalar header.
    ///
    /// A `|` or `>` indicator was followed by something other than a
    /// chomping indicator, an indentation digit or a comment.
    E005,

    // =========================================================================
    // Structure Errors (E1xx)
    // =========================================================================
    /// Unexpected content.
    ///
    /// A line does not fit the surrounding block structure, usually because
    /// of wrong indentation.
    E100,

    /// Unterminated flow collection.
    E101,

    /// Duplicate mapping key.
    E102,

    /// Anchors and aliases are not supported.
    E103,

    /// Complex mapping keys are not supported.
    E104,

    /// More than one document in a stream.
    E105,

    /// Mapping value in a plain scalar.
    ///
    /// A `: ` sequence appeared where a mapping is not allowed.
    E106,

    // =========================================================================
    // JSON Errors (E2xx)
    // =========================================================================
    /// Invalid JSON.
    ///
    /// Raised for any syntax error reported by the JSON reader.
    E200,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Scanner errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E005 => "E005",
            // Structure errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E104 => "E104",
            ErrorCode::E105 => "E105",
            ErrorCode::E106 => "E106",
            // JSON errors
            ErrorCode::E200 => "E200",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "tab in indentation",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "unterminated quoted scalar",
            ErrorCode::E005 => "invalid block scalar header",
            ErrorCode::E100 => "unexpected content",
            ErrorCode::E101 => "unterminated flow collection",
            ErrorCode::E102 => "duplicate key",
            ErrorCode::E103 => "anchor or alias",
            ErrorCode::E104 => "complex key",
            ErrorCode::E105 => "multiple documents",
            ErrorCode::E106 => "mapping value not allowed here",
            ErrorCode::E200 => "invalid JSON",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
