//! Formatting metadata carried alongside the node tree.
//!
//! Nothing in this module affects the meaning of a document. It records how
//! the source spelled things (comments, spacing, indentation, flow text) so a
//! writer can reproduce untouched regions byte for byte.

use std::borrow::Cow;

/// Source text of a node as it was read.
///
/// `column` is the column of the entry line the text was read under. When
/// the node is written under a different column, continuation lines are
/// shifted by the difference so that multi-line text keeps its shape.
///
/// Collections additionally record a fingerprint of their content at load
/// time; the raw text is only reused while the fingerprint still matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw {
    text: String,
    column: usize,
    fingerprint: Option<u64>,
}

impl Raw {
    /// Creates raw text read under the given entry column.
    pub fn new(text: impl Into<String>, column: usize) -> Self {
        Self {
            text: text.into(),
            column,
            fingerprint: None,
        }
    }

    /// Attaches a content fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: u64) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Returns the text exactly as read.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the entry column the text was read under.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Returns the content fingerprint, if one was recorded.
    pub fn fingerprint(&self) -> Option<u64> {
        self.fingerprint
    }

    /// Returns `true` if the text spans more than one line.
    pub fn is_multiline(&self) -> bool {
        self.text.contains('\n')
    }

    /// Returns the text with continuation lines moved to a new entry column.
    pub fn reindent(&self, column: usize) -> Cow<'_, str> {
        if column == self.column || !self.is_multiline() {
            return Cow::Borrowed(&self.text);
        }

        let mut out = String::with_capacity(self.text.len());
        for (idx, line) in self.text.split('\n').enumerate() {
            if idx > 0 {
                out.push('\n');
                if !line.is_empty() {
                    if column > self.column {
                        out.extend(std::iter::repeat_n(' ', column - self.column));
                        out.push_str(line);
                    } else {
                        let excess = self.column - column;
                        let spaces = line.len() - line.trim_start_matches(' ').len();
                        out.push_str(&line[spaces.min(excess)..]);
                    }
                    continue;
                }
            }
            out.push_str(line);
        }
        Cow::Owned(out)
    }
}

/// Formatting around a single mapping entry or sequence item.
///
/// All strings are stored exactly as they appeared in the source so they can
/// be written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decor {
    /// Blank and comment lines preceding the entry, without line endings.
    pub leading: Vec<String>,
    /// Key text as written, including quotes (mapping entries only).
    pub key: Option<String>,
    /// Text between the `:` or `-` indicator and the value.
    pub gap: Option<String>,
    /// Text between a tag and the value it applies to.
    pub tag_gap: Option<String>,
    /// Whitespace and comment following the value on its line.
    pub trailing: Option<String>,
}

impl Decor {
    /// Returns `true` if any leading line or the trailing text is a comment.
    pub fn has_comments(&self) -> bool {
        self.leading
            .iter()
            .any(|line| line.trim_start().starts_with('#'))
            || self
                .trailing
                .as_deref()
                .is_some_and(|text| text.trim_start().starts_with('#'))
    }

    /// Returns a decor that keeps only the blank leading lines.
    ///
    /// Used when a sibling entry is derived from this one: vertical spacing is
    /// repeated but comments stay with the original.
    pub fn spacing_only(&self) -> Decor {
        Decor {
            leading: self
                .leading
                .iter()
                .filter(|line| line.trim().is_empty())
                .cloned()
                .collect(),
            ..Decor::default()
        }
    }
}

/// How a collection is laid out in YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Indentation based layout.
    Block {
        /// Column of the entries relative to the parent entry line. `None`
        /// lets the writer choose.
        offset: Option<usize>,
        /// Inside a sequence item, whether the first entry shares the line
        /// with the `-` indicator.
        compact: bool,
    },
    /// Bracketed layout (`[a, b]`, `{a: b}`).
    Flow {
        /// Source text of the whole collection.
        raw: Option<Raw>,
    },
}

impl Layout {
    /// Block layout with writer-chosen indentation.
    pub fn block() -> Self {
        Layout::Block {
            offset: None,
            compact: true,
        }
    }

    /// Flow layout without source text.
    pub fn flow() -> Self {
        Layout::Flow { raw: None }
    }

    /// Returns `true` for flow layout.
    pub fn is_flow(&self) -> bool {
        matches!(self, Layout::Flow { .. })
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::block()
    }
}
