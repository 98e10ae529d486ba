//! Collector for accumulating diagnostics.
//!
//! The line scanner reports every offending line instead of stopping at the
//! first one; the [`DiagnosticCollector`] gathers them.

use crate::error::{Diagnostic, ParseError};

/// A collector for accumulating diagnostics during a scanning pass.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Finish collection and return a result.
    ///
    /// Returns `Err(ParseError)` with all diagnostics if any of them is an
    /// error. Warnings alone are logged and discarded.
    pub fn finish(self) -> Result<(), ParseError> {
        if self.has_errors {
            return Err(ParseError::new(self.diagnostics));
        }
        for diagnostic in &self.diagnostics {
            log::warn!(code:? = diagnostic.code(); "{}", diagnostic.message());
        }
        Ok(())
    }
}
