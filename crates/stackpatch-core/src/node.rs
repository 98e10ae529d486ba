//! The document tree.
//!
//! A [`Node`] is a mapping, a sequence or a scalar. Collections own their
//! children through [`Entry`] values which pair each child with the
//! formatting found around it in the source.

use std::hash::{DefaultHasher, Hash, Hasher};

use indexmap::IndexMap;

use crate::{
    decor::{Decor, Layout},
    scalar::Scalar,
    tag::Tag,
};

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Sequence),
    Scalar(Scalar),
}

impl Node {
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Node::Mapping(mapping) => mapping.tag(),
            Node::Sequence(sequence) => sequence.tag(),
            Node::Scalar(scalar) => scalar.tag(),
        }
    }

    pub fn set_tag(&mut self, tag: Option<Tag>) {
        match self {
            Node::Mapping(mapping) => mapping.set_tag(tag),
            Node::Sequence(sequence) => sequence.set_tag(tag),
            Node::Scalar(scalar) => scalar.set_tag(tag),
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Node::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Returns the value of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Looks up a key if this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|mapping| mapping.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.as_mapping_mut()
            .and_then(|mapping| mapping.get_mut(key))
    }

    /// Follows a chain of mapping keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn get_path_mut(&mut self, path: &[&str]) -> Option<&mut Node> {
        path.iter().try_fold(self, |node, key| node.get_mut(key))
    }

    /// Compares tags, keys and values, ignoring all formatting.
    pub fn content_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Scalar(a), Node::Scalar(b)) => a.content_eq(b),
            (Node::Mapping(a), Node::Mapping(b)) => {
                a.tag() == b.tag()
                    && a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.content_eq(vb))
            }
            (Node::Sequence(a), Node::Sequence(b)) => {
                a.tag() == b.tag()
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(va, vb)| va.content_eq(vb))
            }
            _ => false,
        }
    }

    /// Hashes the content compared by [`Node::content_eq`].
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_content(&mut hasher);
        hasher.finish()
    }

    fn hash_content(&self, state: &mut DefaultHasher) {
        self.tag().hash(state);
        match self {
            Node::Scalar(scalar) => {
                0u8.hash(state);
                scalar.kind().hash(state);
                scalar.value().hash(state);
            }
            Node::Mapping(mapping) => {
                1u8.hash(state);
                mapping.len().hash(state);
                for (key, value) in mapping.iter() {
                    key.hash(state);
                    value.hash_content(state);
                }
            }
            Node::Sequence(sequence) => {
                2u8.hash(state);
                sequence.len().hash(state);
                for value in sequence.iter() {
                    value.hash_content(state);
                }
            }
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::Mapping(mapping)
    }
}

impl From<Sequence> for Node {
    fn from(sequence: Sequence) -> Self {
        Node::Sequence(sequence)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(Scalar::string(value))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(Scalar::string(value))
    }
}

/// A child node together with its surrounding formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub node: Node,
    pub decor: Decor,
}

impl Entry {
    pub fn new(node: impl Into<Node>) -> Self {
        Self {
            node: node.into(),
            decor: Decor::default(),
        }
    }

    pub fn with_decor(node: impl Into<Node>, decor: Decor) -> Self {
        Self {
            node: node.into(),
            decor,
        }
    }
}

/// An ordered mapping with unique string keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: IndexMap<String, Entry>,
    tag: Option<Tag>,
    layout: Layout,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the position of a key.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key).map(|entry| &entry.node)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.get_mut(key).map(|entry| &mut entry.node)
    }

    pub fn get_entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_entry_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Sets the value of a key.
    ///
    /// An existing key keeps its position and formatting and the previous
    /// value is returned. A new key is appended.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        let key = key.into();
        let node = node.into();
        match self.entries.get_mut(&key) {
            Some(entry) => Some(std::mem::replace(&mut entry.node, node)),
            None => {
                self.entries.insert(key, Entry::new(node));
                None
            }
        }
    }

    /// Appends an entry, replacing any existing entry with the same key.
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: Entry) -> Option<Entry> {
        self.entries.insert(key.into(), entry)
    }

    /// Inserts a new entry directly after `after`, or at the end if `after`
    /// is not a key of this mapping.
    ///
    /// Returns `false` without changing anything if `key` already exists.
    pub fn insert_after(&mut self, after: &str, key: impl Into<String>, entry: Entry) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        let index = self
            .entries
            .get_index_of(after)
            .map_or(self.entries.len(), |idx| idx + 1);
        self.entries.shift_insert(index, key, entry);
        true
    }

    /// Removes a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries
            .iter_mut()
            .map(|(key, entry)| (key.as_str(), &mut entry.node))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&str, &mut Entry)> {
        self.entries
            .iter_mut()
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

/// An ordered list of nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    items: Vec<Entry>,
    tag: Option<Tag>,
    layout: Layout,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.items.get(index).map(|entry| &entry.node)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.items.get_mut(index).map(|entry| &mut entry.node)
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.items.push(Entry::new(node));
    }

    pub fn push_entry(&mut self, entry: Entry) {
        self.items.push(entry);
    }

    pub fn remove(&mut self, index: usize) -> Entry {
        self.items.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.items.iter().map(|entry| &entry.node)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.items.iter_mut().map(|entry| &mut entry.node)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.items.iter_mut()
    }
}

impl<N: Into<Node>> FromIterator<N> for Sequence {
    fn from_iter<I: IntoIterator<Item = N>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Entry::new).collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decor::Raw;

    fn sample() -> Mapping {
        let mut mapping = Mapping::new();
        mapping.insert("A", "1");
        mapping.insert("B", "2");
        mapping.insert("C", "3");
        mapping
    }

    #[test]
    fn test_insert_keeps_position_and_decor() {
        let mut mapping = sample();
        mapping
            .get_entry_mut("B")
            .expect("B exists")
            .decor
            .trailing = Some("  # keep".to_string());

        let previous = mapping.insert("B", "two");

        assert_eq!(
            previous.and_then(|n| n.as_str().map(str::to_owned)),
            Some("2".to_string())
        );
        assert_eq!(mapping.keys().collect::<Vec<_>>(), ["A", "B", "C"]);
        let entry = mapping.get_entry("B").expect("B exists");
        assert_eq!(entry.node.as_str(), Some("two"));
        assert_eq!(entry.decor.trailing.as_deref(), Some("  # keep"));
    }

    #[test]
    fn test_insert_after() {
        let mut mapping = sample();
        assert!(mapping.insert_after("A", "Av1", Entry::new("x")));
        assert!(!mapping.insert_after("A", "C", Entry::new("x")));
        assert!(mapping.insert_after("missing", "Z", Entry::new("z")));

        assert_eq!(
            mapping.keys().collect::<Vec<_>>(),
            ["A", "Av1", "B", "C", "Z"]
        );
        assert_eq!(mapping.get("C").and_then(Node::as_str), Some("3"));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut mapping = sample();
        assert!(mapping.remove("A").is_some());
        assert!(mapping.remove("A").is_none());
        assert_eq!(mapping.keys().collect::<Vec<_>>(), ["B", "C"]);
    }

    #[test]
    fn test_get_path() {
        let mut inner = Mapping::new();
        inner.insert("Type", "AWS::S3::Bucket");
        let mut root = Mapping::new();
        root.insert("Bucket", inner);
        let root = Node::from(root);

        assert_eq!(
            root.get_path(&["Bucket", "Type"]).and_then(Node::as_str),
            Some("AWS::S3::Bucket")
        );
        assert!(root.get_path(&["Bucket", "Properties"]).is_none());
    }

    #[test]
    fn test_content_eq_ignores_formatting() {
        let plain = Node::from(Scalar::string("x"));
        let quoted = Node::from(
            Scalar::string("x")
                .with_style(crate::scalar::ScalarStyle::DoubleQuoted)
                .with_raw(Raw::new("\"x\"", 0)),
        );
        assert!(plain.content_eq(&quoted));
        assert_eq!(plain.fingerprint(), quoted.fingerprint());

        let tagged = Node::from(Scalar::string("x").with_tag(Tag::Ref));
        assert!(!plain.content_eq(&tagged));
        assert_ne!(plain.fingerprint(), tagged.fingerprint());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Node::from(sample());
        let mut copy = original.clone();
        copy.get_mut("A")
            .and_then(Node::as_scalar_mut)
            .expect("scalar")
            .set_value("changed");

        assert_eq!(original.get("A").and_then(Node::as_str), Some("1"));
        assert_eq!(copy.get("A").and_then(Node::as_str), Some("changed"));
    }

    #[test]
    fn test_sequence_from_iter() {
        let sequence: Sequence = ["a", "b"].into_iter().collect();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.get(1).and_then(Node::as_str), Some("b"));
    }
}
