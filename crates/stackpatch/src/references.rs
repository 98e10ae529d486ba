//! Locating and rewriting references between template entities.
//!
//! A template refers to an entity by name in three ways, each of which can be
//! spelled as an explicit mapping or as a YAML short tag:
//!
//! | Kind | Explicit | Short tag |
//! |------|----------|-----------|
//! | [`ReferenceKind::DirectRef`] | `{Ref: Name}` | `!Ref Name` |
//! | [`ReferenceKind::Attribute`] | `{Fn::GetAtt: [Name, Attr]}` | `!GetAtt Name.Attr`, `!GetAtt [Name, Attr]` |
//! | [`ReferenceKind::Substitution`] | `{Fn::Sub: "${Name}"}` | `!Sub "${Name.Attr}"` |
//!
//! [`find`] reports all three kinds. [`rewrite`] renames direct and
//! attribute references only; placeholders inside substitution templates are
//! left as they are.

use std::fmt;

use log::trace;
use winnow::{
    ModalResult, Parser as _,
    combinator::delimited,
    token::{none_of, take_till, take_until},
};

use stackpatch_core::{Mapping, Node, Scalar, Sequence, Tag};

const REF: &str = "Ref";
const GET_ATT: &str = "Fn::GetAtt";
const SUB: &str = "Fn::Sub";

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// The entity itself.
    DirectRef,
    /// An attribute of the entity.
    Attribute,
    /// A `${...}` placeholder inside a substitution template.
    Substitution,
}

/// How a reference is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// A single-key mapping such as `{Ref: Name}`.
    Explicit,
    /// A tagged node such as `!Ref Name`.
    ShortTag,
}

/// One step from a node to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
}

/// A reference found by [`find`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reference<'a> {
    /// The node holding the reference: the tagged node or the explicit
    /// mapping.
    pub node: &'a Node,
    pub kind: ReferenceKind,
    pub encoding: Encoding,
    pub target: &'a str,
    /// Location of `node` relative to the node the search started from.
    pub path: Vec<PathSegment<'a>>,
}

impl Reference<'_> {
    /// Formats the path as `Key.Key[index]`.
    pub fn path_display(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(idx) => out.push_str(&format!("[{idx}]")),
            }
        }
        out
    }
}

impl fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} reference to `{}` at `{}`",
            self.kind,
            self.target,
            self.path_display()
        )
    }
}

/// Pre-order iterator over the references to one entity.
///
/// Cloning the iterator restarts nothing; the clone continues from the same
/// position independently. Call [`find`] again to start over.
#[derive(Debug, Clone)]
pub struct References<'a> {
    target: &'a str,
    stack: Vec<(&'a Node, Vec<PathSegment<'a>>)>,
}

/// Returns every reference to `target` in the tree below `node`, `node`
/// included.
///
/// Mapping values and sequence items are visited in document order. The
/// search is lazy, so `find(..).next().is_some()` stops at the first hit.
pub fn find<'a>(node: &'a Node, target: &'a str) -> References<'a> {
    References {
        target,
        stack: vec![(node, Vec::new())],
    }
}

/// Returns `true` if anything below `node` refers to `target`.
pub fn has_reference(node: &Node, target: &str) -> bool {
    find(node, target).next().is_some()
}

impl<'a> Iterator for References<'a> {
    type Item = Reference<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, path)) = self.stack.pop() {
            let start = self.stack.len();
            match node {
                Node::Mapping(mapping) => {
                    self.stack.extend(mapping.iter().map(|(key, child)| {
                        let mut child_path = path.clone();
                        child_path.push(PathSegment::Key(key));
                        (child, child_path)
                    }));
                }
                Node::Sequence(sequence) => {
                    self.stack
                        .extend(sequence.iter().enumerate().map(|(idx, child)| {
                            let mut child_path = path.clone();
                            child_path.push(PathSegment::Index(idx));
                            (child, child_path)
                        }));
                }
                Node::Scalar(_) => {}
            }
            self.stack[start..].reverse();

            if let Some((kind, encoding)) = classify(node, self.target) {
                let reference = Reference {
                    node,
                    kind,
                    encoding,
                    target: self.target,
                    path,
                };
                trace!(reference:% = reference; "Found reference");
                return Some(reference);
            }
        }
        None
    }
}

fn classify(node: &Node, target: &str) -> Option<(ReferenceKind, Encoding)> {
    let short = match (node, node.tag()) {
        (Node::Scalar(scalar), Some(Tag::Ref)) => {
            (scalar.value() == target).then_some(ReferenceKind::DirectRef)
        }
        (Node::Scalar(scalar), Some(Tag::GetAtt)) => {
            (dotted_name(scalar.value()) == target).then_some(ReferenceKind::Attribute)
        }
        (Node::Sequence(sequence), Some(Tag::GetAtt)) => (sequence.len() >= 2
            && first_value(sequence) == Some(target))
        .then_some(ReferenceKind::Attribute),
        (_, Some(Tag::Sub)) => {
            substitutes(node, target).then_some(ReferenceKind::Substitution)
        }
        (Node::Mapping(mapping), _) => {
            return explicit(mapping, target).map(|kind| (kind, Encoding::Explicit));
        }
        _ => None,
    };
    short.map(|kind| (kind, Encoding::ShortTag))
}

fn explicit(mapping: &Mapping, target: &str) -> Option<ReferenceKind> {
    if mapping
        .get(REF)
        .and_then(Node::as_scalar)
        .is_some_and(|scalar| scalar.value() == target)
    {
        return Some(ReferenceKind::DirectRef);
    }

    let attribute = match mapping.get(GET_ATT) {
        Some(Node::Scalar(scalar)) => dotted_name(scalar.value()) == target,
        Some(Node::Sequence(sequence)) => first_value(sequence) == Some(target),
        _ => false,
    };
    if attribute {
        return Some(ReferenceKind::Attribute);
    }

    mapping
        .get(SUB)
        .is_some_and(|template| substitutes(template, target))
        .then_some(ReferenceKind::Substitution)
}

/// Resource part of `Name.Attr`.
fn dotted_name(text: &str) -> &str {
    text.split('.').next().unwrap_or(text)
}

/// Value of the first item if it is an untagged scalar.
fn first_value(sequence: &Sequence) -> Option<&str> {
    sequence
        .get(0)
        .and_then(Node::as_scalar)
        .filter(|scalar| scalar.tag().is_none())
        .map(Scalar::value)
}

/// Checks the template string of a substitution, given either as a scalar or
/// as the first item of the `[template, variables]` form.
fn substitutes(node: &Node, target: &str) -> bool {
    let template = match node {
        Node::Scalar(scalar) => Some(scalar.value()),
        Node::Sequence(sequence) => first_value(sequence),
        Node::Mapping(_) => None,
    };
    template.is_some_and(|template| {
        placeholders(template)
            .into_iter()
            .any(|body| dotted_name(body) == target)
    })
}

/// Returns the bodies of the `${...}` placeholders in a substitution template.
///
/// `${!Literal}` is an escaped placeholder and is skipped. An opening `${`
/// without a closing brace is ordinary text.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut input = template;
    let mut bodies = Vec::new();
    while skip_to_placeholder(&mut input).is_ok() {
        let start = input;
        match placeholder(&mut input) {
            Ok(body) => bodies.push(body),
            Err(_) => input = &start["${".len()..],
        }
    }
    bodies
}

fn skip_to_placeholder<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_until(0.., "${").parse_next(input)
}

fn placeholder<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    delimited(
        "${",
        (none_of(['!', '}']), take_till(0.., '}')).take(),
        '}',
    )
    .parse_next(input)
}

/// Renames direct and attribute references from `old` to `new` in place.
///
/// Each reference keeps its encoding and quoting. Returns `true` if anything
/// changed.
pub fn rewrite(node: &mut Node, old: &str, new: &str) -> bool {
    let mut changed = false;
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        match node {
            Node::Scalar(scalar) => match scalar.tag() {
                Some(Tag::Ref) => changed |= rename(scalar, old, new),
                Some(Tag::GetAtt) => changed |= rename_dotted(scalar, old, new),
                _ => {}
            },
            Node::Sequence(sequence) => {
                if sequence.tag() == Some(&Tag::GetAtt) && sequence.len() >= 2 {
                    changed |= rename_first(sequence, old, new);
                }
                stack.extend(sequence.iter_mut());
            }
            Node::Mapping(mapping) => {
                if let Some(Node::Scalar(scalar)) = mapping.get_mut(REF) {
                    changed |= rename(scalar, old, new);
                }
                match mapping.get_mut(GET_ATT) {
                    Some(Node::Scalar(scalar)) => changed |= rename_dotted(scalar, old, new),
                    Some(Node::Sequence(sequence)) => {
                        changed |= rename_first(sequence, old, new);
                    }
                    _ => {}
                }
                stack.extend(mapping.iter_mut().map(|(_, child)| child));
            }
        }
    }
    changed
}

fn rename(scalar: &mut Scalar, old: &str, new: &str) -> bool {
    if scalar.value() != old {
        return false;
    }
    scalar.set_value(new);
    true
}

fn rename_dotted(scalar: &mut Scalar, old: &str, new: &str) -> bool {
    let renamed = match scalar.value().split_once('.') {
        Some((name, attribute)) if name == old => format!("{new}.{attribute}"),
        None if scalar.value() == old => new.to_string(),
        _ => return false,
    };
    scalar.set_value(renamed);
    true
}

fn rename_first(sequence: &mut Sequence, old: &str, new: &str) -> bool {
    match sequence.get_mut(0) {
        Some(Node::Scalar(scalar)) if scalar.tag().is_none() => rename(scalar, old, new),
        _ => false,
    }
}
