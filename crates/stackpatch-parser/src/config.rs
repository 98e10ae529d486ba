//! Loader and writer settings.

/// Settings for reading documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderConfig {
    allow_duplicate_keys: bool,
}

impl LoaderConfig {
    pub fn new(allow_duplicate_keys: bool) -> Self {
        Self {
            allow_duplicate_keys,
        }
    }

    /// Whether a repeated mapping key replaces the earlier value instead of
    /// failing the load.
    pub fn allow_duplicate_keys(&self) -> bool {
        self.allow_duplicate_keys
    }
}

/// Layout used for nodes that have no recorded source formatting.
///
/// Nodes read from a file are always written the way they were read; these
/// settings only apply to new or changed parts of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    mapping_indent: usize,
    sequence_dash_offset: usize,
    sequence_indent: usize,
    json_indent: usize,
}

impl WriterConfig {
    /// Creates a writer configuration.
    ///
    /// `sequence_indent` is the column of item content relative to the
    /// parent key and is raised to at least `sequence_dash_offset + 2` so
    /// there is room for the `- ` indicator.
    pub fn new(
        mapping_indent: usize,
        sequence_dash_offset: usize,
        sequence_indent: usize,
        json_indent: usize,
    ) -> Self {
        Self {
            mapping_indent: mapping_indent.max(1),
            sequence_dash_offset,
            sequence_indent: sequence_indent.max(sequence_dash_offset + 2),
            json_indent,
        }
    }

    /// Column of nested mapping keys relative to the parent key.
    pub fn mapping_indent(&self) -> usize {
        self.mapping_indent
    }

    /// Column of the `-` indicator relative to the parent key.
    pub fn sequence_dash_offset(&self) -> usize {
        self.sequence_dash_offset
    }

    /// Column of sequence item content relative to the parent key.
    pub fn sequence_indent(&self) -> usize {
        self.sequence_indent
    }

    /// Spaces per level in JSON output.
    pub fn json_indent(&self) -> usize {
        self.json_indent
    }

    /// Distance from a `-` indicator to the item content.
    pub(crate) fn item_content_offset(&self) -> usize {
        self.sequence_indent - self.sequence_dash_offset
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new(2, 2, 4, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.mapping_indent(), 2);
        assert_eq!(config.sequence_dash_offset(), 2);
        assert_eq!(config.sequence_indent(), 4);
        assert_eq!(config.json_indent(), 2);
        assert_eq!(config.item_content_offset(), 2);
    }

    #[test]
    fn test_sequence_indent_leaves_room_for_dash() {
        let config = WriterConfig::new(2, 4, 4, 2);
        assert_eq!(config.sequence_indent(), 6);
    }
}
