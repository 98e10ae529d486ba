//! Line scanner.
//!
//! Splits the source into lines, classifies each one and records line
//! ending style. Tab indentation is reported for every offending line in a
//! single pass.

use stackpatch_core::document::LineEnding;

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    span::Span,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// Empty or whitespace only.
    Blank,
    /// First non-space character is `#`.
    Comment,
    Content,
}

/// A single source line without its line ending.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub text: &'a str,
    /// Byte offset of the first character in the source.
    pub offset: usize,
    /// Number of leading spaces.
    pub indent: usize,
    pub kind: LineKind,
}

impl Line<'_> {
    pub fn is_content(&self) -> bool {
        self.kind == LineKind::Content
    }

    /// `---` or `...`, optionally followed by whitespace or a comment.
    pub fn document_marker(&self) -> Option<DocumentMarker> {
        let marker = match self.text.get(..3)? {
            "---" => DocumentMarker::Start,
            "..." => DocumentMarker::End,
            _ => return None,
        };
        match self.text[3..].chars().next() {
            None | Some(' ' | '\t') => Some(marker),
            _ => None,
        }
    }

    /// Text after a document marker, without the separating whitespace.
    pub fn after_marker(&self) -> &str {
        self.text.get(3..).unwrap_or_default().trim_start()
    }

    /// Span of the line content, excluding indentation.
    pub fn content_span(&self) -> Span {
        Span::new(self.offset + self.indent..self.offset + self.text.len())
    }

    /// Span from a column to the end of the line.
    pub fn span_from(&self, col: usize) -> Span {
        Span::new(self.offset + col..self.offset + self.text.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentMarker {
    Start,
    End,
}

/// The source split into lines.
#[derive(Debug)]
pub(crate) struct SourceLines<'a> {
    pub lines: Vec<Line<'a>>,
    pub line_ending: LineEnding,
    pub final_newline: bool,
}

impl SourceLines<'_> {
    /// Maps a byte offset to a line index and a column.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let idx = self
            .lines
            .partition_point(|line| line.offset <= offset)
            .saturating_sub(1);
        let col = offset.saturating_sub(self.lines.get(idx).map_or(0, |line| line.offset));
        (idx, col)
    }
}

/// Splits `source` into classified lines.
///
/// # Errors
///
/// Returns every line that starts with a tab character.
pub(crate) fn scan(source: &str) -> Result<SourceLines<'_>, ParseError> {
    let line_ending = match source.find('\n') {
        Some(idx) if idx > 0 && source.as_bytes()[idx - 1] == b'\r' => LineEnding::CrLf,
        _ => LineEnding::Lf,
    };
    let final_newline = source.ends_with('\n');

    let mut diagnostics = DiagnosticCollector::new();
    let mut lines = Vec::new();
    let mut offset = 0;
    let body = source.strip_suffix('\n').unwrap_or(source);

    if !source.is_empty() {
        for raw in body.split('\n') {
            let text = match line_ending {
                LineEnding::CrLf => raw.strip_suffix('\r').unwrap_or(raw),
                LineEnding::Lf => raw,
            };
            let line = classify(text, offset);
            if line.kind != LineKind::Blank && text[line.indent..].starts_with('\t') {
                let indent = &text[line.indent..];
                let tabs = indent.len() - indent.trim_start_matches('\t').len();
                let start = offset + line.indent;
                diagnostics.emit(
                    Diagnostic::coded(
                        ErrorCode::E001,
                        "tab character used for indentation",
                        Span::new(start..start + tabs),
                    )
                    .with_help("indent with spaces"),
                );
            }
            lines.push(line);
            offset += raw.len() + 1;
        }
    }

    diagnostics.finish()?;

    Ok(SourceLines {
        lines,
        line_ending,
        final_newline,
    })
}

fn classify(text: &str, offset: usize) -> Line<'_> {
    let indent = text.len() - text.trim_start_matches(' ').len();
    let rest = text[indent..].trim_start_matches([' ', '\t']);
    let kind = if rest.is_empty() {
        LineKind::Blank
    } else if rest.starts_with('#') {
        LineKind::Comment
    } else {
        LineKind::Content
    };
    Line {
        text,
        offset,
        indent,
        kind,
    }
}
