//! A loaded template and the information needed to write it back.

use std::{fmt, path::Path};

use crate::{
    decor::Decor,
    node::{Mapping, Node},
};

/// Top-level key that marks a document as an infrastructure template.
pub const TEMPLATE_VERSION_KEY: &str = "AWSTemplateFormatVersion";

/// Serialization format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Determines the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`] for anything other than `.yaml`, `.yml`
    /// and `.json`.
    pub fn from_path(path: &Path) -> Result<Self, UnsupportedFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            other => Err(UnsupportedFormat {
                extension: other.unwrap_or_default().to_string(),
            }),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
        }
    }
}

/// A file extension with no known format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported file extension `{extension}`, expected .yaml, .yml or .json")]
pub struct UnsupportedFormat {
    pub extension: String,
}

/// Line ending style of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Text that belongs to the document rather than to any node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTrivia {
    /// Lines before the root node, such as `---` markers and header comments.
    pub prefix: Vec<String>,
    /// Formatting of the root node itself.
    pub root_decor: Decor,
    /// Lines after the root node.
    pub suffix: Vec<String>,
    pub line_ending: LineEnding,
    pub final_newline: bool,
}

impl Default for DocumentTrivia {
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            root_decor: Decor::default(),
            suffix: Vec::new(),
            line_ending: LineEnding::Lf,
            final_newline: true,
        }
    }
}

/// Top-level sections that hold named entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Parameters,
    Mappings,
    Conditions,
    Resources,
    Outputs,
}

impl Section {
    /// Sections whose members are copied between templates.
    pub const ENTITIES: [Section; 4] = [
        Section::Parameters,
        Section::Resources,
        Section::Conditions,
        Section::Mappings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Parameters => "Parameters",
            Section::Mappings => "Mappings",
            Section::Conditions => "Conditions",
            Section::Resources => "Resources",
            Section::Outputs => "Outputs",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded document.
///
/// The dirty flag is set by every operation that changes the meaning of the
/// tree and cleared only after the document has been written.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
    format: Format,
    dirty: bool,
    trivia: DocumentTrivia,
}

impl Document {
    pub fn new(root: Node, format: Format) -> Self {
        Self {
            root,
            format,
            dirty: false,
            trivia: DocumentTrivia::default(),
        }
    }

    pub fn with_trivia(mut self, trivia: DocumentTrivia) -> Self {
        self.trivia = trivia;
        self
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Mutable access to the tree. Callers that change content must also call
    /// [`Document::mark_dirty`].
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn trivia(&self) -> &DocumentTrivia {
        &self.trivia
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Returns `true` if the root mapping has an `AWSTemplateFormatVersion`
    /// key.
    pub fn is_template(&self) -> bool {
        self.root
            .as_mapping()
            .is_some_and(|root| root.contains_key(TEMPLATE_VERSION_KEY))
    }

    pub fn section(&self, section: Section) -> Option<&Mapping> {
        self.root.get(section.as_str()).and_then(Node::as_mapping)
    }

    pub fn section_mut(&mut self, section: Section) -> Option<&mut Mapping> {
        self.root
            .get_mut(section.as_str())
            .and_then(Node::as_mapping_mut)
    }

    /// Shorthand for the `Resources` section.
    pub fn resources(&self) -> Option<&Mapping> {
        self.section(Section::Resources)
    }

    pub fn resources_mut(&mut self) -> Option<&mut Mapping> {
        self.section_mut(Section::Resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Document {
        let mut resources = Mapping::new();
        resources.insert("Bucket", Mapping::new());
        let mut root = Mapping::new();
        root.insert(TEMPLATE_VERSION_KEY, "2010-09-09");
        root.insert("Resources", resources);
        Document::new(root.into(), Format::Yaml)
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.yaml")), Ok(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.yml")), Ok(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.json")), Ok(Format::Json));

        let err = Format::from_path(Path::new("b.txt")).unwrap_err();
        assert_eq!(err.extension, "txt");
        assert!(Format::from_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn test_is_template() {
        assert!(template().is_template());
        let plain = Document::new(Mapping::new().into(), Format::Json);
        assert!(!plain.is_template());
        let scalar = Document::new("text".into(), Format::Yaml);
        assert!(!scalar.is_template());
    }

    #[test]
    fn test_dirty_flag() {
        let mut doc = template();
        assert!(!doc.is_dirty());
        doc.mark_dirty();
        assert!(doc.is_dirty());
        doc.mark_clean();
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_sections() {
        let mut doc = template();
        assert!(doc.resources().is_some_and(|r| r.contains_key("Bucket")));
        assert!(doc.section(Section::Parameters).is_none());
        doc.resources_mut().expect("resources").remove("Bucket");
        assert!(doc.resources().is_some_and(Mapping::is_empty));
    }
}
