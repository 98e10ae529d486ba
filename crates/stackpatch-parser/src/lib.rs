//! # Stackpatch Parser
//!
//! Round-trip preserving loader and writer for infrastructure templates. A
//! YAML document that is loaded and written back without changes comes out
//! byte for byte identical: comments, blank lines, quoting, short tags, flow
//! collections and block scalars all survive. Changed or new nodes are
//! rendered with the layout from [`WriterConfig`].
//!
//! ## Usage
//!
//! ```
//! # use stackpatch_parser::{Loader, LoaderConfig, Writer, WriterConfig};
//! # use stackpatch_core::Format;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = "Resources:\n  # the bucket\n  Bucket:\n    Type: AWS::S3::Bucket\n";
//!
//!     let doc = Loader::new(LoaderConfig::default()).load(source, Format::Yaml)?;
//!     let output = Writer::new(WriterConfig::default()).write(&doc)?;
//!     assert_eq!(output, source);
//!     Ok(())
//! }
//! ```

mod config;
mod emit;
pub mod error;
mod json;
mod lines;
mod scan;
mod span;
mod yaml;

pub use config::{LoaderConfig, WriterConfig};
pub use error::{Diagnostic, ErrorCode, ParseError};
pub use span::Span;

use log::debug;
use stackpatch_core::{Document, Format};

/// Error returned when a document cannot be serialized.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads YAML and JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Loads `source` as a document of the given format.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] with one or more diagnostics if `source` is
    /// malformed or uses a YAML feature that cannot be preserved (anchors,
    /// complex keys, multiple documents).
    pub fn load(&self, source: &str, format: Format) -> Result<Document, ParseError> {
        debug!(format:% = format, bytes = source.len(); "Loading document");
        match format {
            Format::Yaml => yaml::load(source, self.config),
            Format::Json => json::load(source),
        }
    }
}

/// Writes documents in their own format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Writer {
    config: WriterConfig,
}

impl Writer {
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Serializes `doc` in the format it was loaded from.
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] if JSON serialization fails.
    pub fn write(&self, doc: &Document) -> Result<String, WriteError> {
        match doc.format() {
            Format::Yaml => Ok(emit::write(doc, &self.config)),
            Format::Json => Ok(json::write(doc, &self.config)?),
        }
    }
}
