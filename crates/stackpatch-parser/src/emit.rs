//! YAML writer.
//!
//! Untouched parts of the tree are written from the source text recorded at
//! load time. Anything without recorded text is rendered using the
//! [`WriterConfig`] layout.

use stackpatch_core::{
    Document, Mapping, Node, Scalar, ScalarKind, ScalarStyle, Sequence,
    decor::{Decor, Layout},
    document::LineEnding,
};

use crate::config::WriterConfig;

/// Characters that cannot start a plain scalar.
const INDICATORS: &str = "[]{},#&*!|>'\"%@`";

/// Writes a document as YAML.
pub(crate) fn write(doc: &Document, config: &WriterConfig) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        config,
    };
    let trivia = doc.trivia();

    for line in &trivia.prefix {
        emitter.push_line(line);
    }
    emitter.root(doc.root(), &trivia.root_decor);
    for line in &trivia.suffix {
        emitter.push_line(line);
    }

    let mut out = emitter.out;
    if !trivia.final_newline && out.ends_with('\n') {
        out.pop();
    }
    match trivia.line_ending {
        LineEnding::Lf => out,
        LineEnding::CrLf => out.replace('\n', "\r\n"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Mapping,
    SequenceItem,
}

struct Emitter<'c> {
    out: String,
    config: &'c WriterConfig,
}

fn spaces(count: usize) -> String {
    " ".repeat(count)
}

fn block_layout(node: &Node) -> Option<(Option<usize>, bool)> {
    let layout = match node {
        Node::Mapping(mapping) if !mapping.is_empty() => mapping.layout(),
        Node::Sequence(sequence) if !sequence.is_empty() => sequence.layout(),
        _ => return None,
    };
    match layout {
        Layout::Block { offset, compact } => Some((*offset, *compact)),
        Layout::Flow { .. } => None,
    }
}

/// Whitespace recorded before a value, or `default` when there is none or
/// it no longer fits.
fn gap<'a>(recorded: Option<&'a str>, default: &'a str, keep_breaks: bool) -> &'a str {
    match recorded {
        Some(gap) if !gap.is_empty() && (keep_breaks || !gap.contains('\n')) => gap,
        _ => default,
    }
}

impl Emitter<'_> {
    fn push_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn leading(&mut self, decor: &Decor) {
        for line in &decor.leading {
            self.push_line(line);
        }
    }

    fn root(&mut self, node: &Node, decor: &Decor) {
        if let Some((offset, _)) = block_layout(node) {
            if node.tag().is_none() {
                self.collection(node, offset.unwrap_or(0));
                return;
            }
        }

        let (text, from_source) = self.inline(node, 0);
        let mut line = String::new();
        if let Some(tag) = node.tag() {
            line.push_str(decor.gap.as_deref().unwrap_or_default());
            line.push_str(&tag.to_string());
            if !text.is_empty() {
                line.push_str(gap(decor.tag_gap.as_deref(), " ", from_source));
            }
        } else if !text.is_empty() {
            line.push_str(gap(decor.gap.as_deref(), "", from_source));
        }
        line.push_str(&text);
        if line.is_empty() && decor.trailing.as_deref().unwrap_or_default().is_empty() {
            return;
        }
        self.push_value_line(line, &text, decor);
    }

    fn collection(&mut self, node: &Node, col: usize) {
        match node {
            Node::Mapping(mapping) => self.mapping_entries(mapping, col),
            Node::Sequence(sequence) => self.sequence_items(sequence, col),
            Node::Scalar(_) => {}
        }
    }

    fn mapping_entries(&mut self, mapping: &Mapping, col: usize) {
        for (key, entry) in mapping.entries() {
            self.leading(&entry.decor);
            let key_text = entry
                .decor
                .key
                .clone()
                .unwrap_or_else(|| render_key(key));
            let head = format!("{}{key_text}:", spaces(col));
            self.entry(head, &entry.node, &entry.decor, col, Parent::Mapping);
        }
    }

    fn sequence_items(&mut self, sequence: &Sequence, col: usize) {
        for entry in sequence.entries() {
            self.leading(&entry.decor);
            let head = format!("{}-", spaces(col));
            self.entry(head, &entry.node, &entry.decor, col, Parent::SequenceItem);
        }
    }

    /// Writes one mapping entry or sequence item. `head` holds everything up
    /// to and including the `:` or `-` indicator.
    fn entry(&mut self, head: String, node: &Node, decor: &Decor, col: usize, parent: Parent) {
        if let Some((offset, compact)) = block_layout(node) {
            self.block_entry(head, node, decor, col, parent, offset, compact);
            return;
        }

        let (text, from_source) = self.inline(node, col);
        let mut line = head;
        if let Some(tag) = node.tag() {
            line.push_str(gap(decor.gap.as_deref(), " ", false));
            line.push_str(&tag.to_string());
            if !text.is_empty() {
                line.push_str(gap(decor.tag_gap.as_deref(), " ", from_source));
            }
        } else if !text.is_empty() {
            line.push_str(gap(decor.gap.as_deref(), " ", from_source));
        }
        line.push_str(&text);
        self.push_value_line(line, &text, decor);
    }

    /// Appends the trailing text and writes a possibly multi-line value.
    ///
    /// A rendered block scalar keeps its trailing comment on the header line.
    fn push_value_line(&mut self, mut line: String, text: &str, decor: &Decor) {
        let trailing = decor.trailing.as_deref().unwrap_or_default();
        if text.starts_with(['|', '>']) {
            if let Some(header_end) = line.find('\n') {
                line.insert_str(header_end, trailing);
                self.push_line(&line);
                return;
            }
        }
        line.push_str(trailing);
        self.push_line(&line);
    }

    #[allow(clippy::too_many_arguments)]
    fn block_entry(
        &mut self,
        head: String,
        node: &Node,
        decor: &Decor,
        col: usize,
        parent: Parent,
        offset: Option<usize>,
        compact: bool,
    ) {
        let is_mapping = matches!(node, Node::Mapping(_));

        if parent == Parent::SequenceItem && compact && node.tag().is_none() {
            let child_col = col + offset.unwrap_or(self.config.item_content_offset()).max(2);
            let start = self.out.len();
            self.collection(node, child_col);
            let body = self.out.split_off(start);
            match body.strip_prefix(spaces(child_col).as_str()) {
                Some(rest) => {
                    self.out.push_str(&head);
                    self.out.push_str(&spaces(child_col - col - 1));
                    self.out.push_str(rest);
                }
                None => {
                    self.push_line(&head);
                    self.out.push_str(&body);
                }
            }
            return;
        }

        let mut line = head;
        if let Some(tag) = node.tag() {
            line.push_str(gap(decor.gap.as_deref(), " ", false));
            line.push_str(&tag.to_string());
        }
        line.push_str(decor.trailing.as_deref().unwrap_or_default());
        self.push_line(&line);

        let default = match (parent, is_mapping) {
            (Parent::Mapping, true) => self.config.mapping_indent(),
            (Parent::Mapping, false) => self.config.sequence_dash_offset(),
            (Parent::SequenceItem, true) => {
                self.config.item_content_offset() + self.config.mapping_indent()
            }
            (Parent::SequenceItem, false) => {
                self.config.item_content_offset() + self.config.sequence_dash_offset()
            }
        };
        let mut offset = offset.unwrap_or(default);
        if is_mapping || parent == Parent::SequenceItem {
            offset = offset.max(1);
        }
        self.collection(node, col + offset);
    }

    /// Text of a scalar or flow collection and whether it came from the
    /// source unchanged.
    fn inline(&self, node: &Node, col: usize) -> (String, bool) {
        match node {
            Node::Scalar(scalar) => match scalar.raw() {
                Some(raw) => (raw.reindent(col).into_owned(), true),
                None => (self.render_scalar(scalar, col), false),
            },
            Node::Mapping(mapping) => self.flow_text(node, mapping.layout(), col),
            Node::Sequence(sequence) => self.flow_text(node, sequence.layout(), col),
        }
    }

    /// Recorded flow text while the collection is unchanged, otherwise a
    /// fresh single-line rendering.
    fn flow_text(&self, node: &Node, layout: &Layout, col: usize) -> (String, bool) {
        if let Layout::Flow { raw: Some(raw) } = layout {
            if raw.fingerprint() == Some(node.fingerprint()) {
                return (raw.reindent(col).into_owned(), true);
            }
        }
        (render_flow(node), false)
    }

    fn render_scalar(&self, scalar: &Scalar, col: usize) -> String {
        if scalar.kind() != ScalarKind::String {
            return scalar.value().to_string();
        }
        let value = scalar.value();
        match scalar.style() {
            ScalarStyle::DoubleQuoted => double_quote(value),
            _ if value.is_empty() => "''".to_string(),
            ScalarStyle::Literal | ScalarStyle::Folded => {
                self.literal(value, col)
            }
            _ if value.contains('\n') => self.literal(value, col),
            _ if value.chars().any(char::is_control) => double_quote(value),
            ScalarStyle::SingleQuoted => single_quote(value),
            ScalarStyle::Plain if is_plain_safe(value, false) => value.to_string(),
            ScalarStyle::Plain => single_quote(value),
        }
    }

    /// Renders a `|` block scalar with content indented one mapping level
    /// past the entry column.
    fn literal(&self, value: &str, col: usize) -> String {
        let indent = self.config.mapping_indent();
        let (body, chomp) = match value.strip_suffix('\n') {
            None => (value, "-"),
            Some(body) if body.ends_with('\n') || body.is_empty() => (body, "+"),
            Some(body) => (body, ""),
        };

        let mut out = String::from("|");
        if body.starts_with([' ', '\t']) {
            out.push_str(&indent.to_string());
        }
        out.push_str(chomp);
        let prefix = spaces(col + indent);
        for line in body.split('\n') {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&prefix);
                out.push_str(line);
            }
        }
        out
    }
}

/// Renders a collection in flow style on a single line. The tag of `node`
/// itself is written by the caller.
fn render_flow(node: &Node) -> String {
    let mut out = String::new();
    match node {
        Node::Scalar(scalar) => out.push_str(&render_flow_scalar(scalar)),
        Node::Sequence(sequence) => {
            let items: Vec<String> = sequence.iter().map(render_flow_item).collect();
            out.push('[');
            out.push_str(&items.join(", "));
            out.push(']');
        }
        Node::Mapping(mapping) => {
            let entries: Vec<String> = mapping
                .iter()
                .map(|(key, value)| {
                    let key = if is_plain_safe(key, true) {
                        key.to_string()
                    } else {
                        single_quote(key)
                    };
                    format!("{key}: {}", render_flow_item(value))
                })
                .collect();
            out.push('{');
            out.push_str(&entries.join(", "));
            out.push('}');
        }
    }
    out
}

fn render_flow_item(node: &Node) -> String {
    match node.tag() {
        Some(tag) => format!("{tag} {}", render_flow(node)),
        None => render_flow(node),
    }
}

fn render_flow_scalar(scalar: &Scalar) -> String {
    let reusable = |text: &str| {
        !text.is_empty()
            && (text.starts_with(['\'', '"']) || !text.contains([',', '[', ']', '{', '}']))
    };
    if let Some(raw) = scalar.raw().filter(|raw| !raw.is_multiline()) {
        if reusable(raw.text()) {
            return raw.text().to_string();
        }
    }
    let value = scalar.value();
    match scalar.kind() {
        ScalarKind::String => {}
        ScalarKind::Null if value.is_empty() => return "null".to_string(),
        _ => return value.to_string(),
    }
    if value.contains('\n') || value.chars().any(char::is_control) {
        return double_quote(value);
    }
    match scalar.style() {
        ScalarStyle::DoubleQuoted => double_quote(value),
        ScalarStyle::Plain if is_plain_safe(value, true) => value.to_string(),
        _ => single_quote(value),
    }
}

fn render_key(key: &str) -> String {
    if key.contains('\n') || key.chars().any(char::is_control) {
        double_quote(key)
    } else if is_plain_safe(key, false) {
        key.to_string()
    } else {
        single_quote(key)
    }
}

/// Returns `true` if `value` reads back as the same string when written
/// without quotes.
fn is_plain_safe(value: &str, in_flow: bool) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if ScalarKind::resolve(value) != ScalarKind::String {
        return false;
    }
    if value.starts_with([' ', '\t']) || value.ends_with([' ', '\t', ':']) {
        return false;
    }
    if INDICATORS.contains(first) {
        return false;
    }
    if matches!(first, '-' | '?' | ':') {
        let second = value[1..].chars().next();
        if second.is_none_or(|c| c == ' ' || c == '\t') {
            return false;
        }
    }
    if value.starts_with("---") || value.starts_with("...") {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.contains('\n') {
        return false;
    }
    if in_flow && value.contains([',', '[', ']', '{', '}']) {
        return false;
    }
    !value.chars().any(char::is_control)
}

fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{code:02x}"));
                } else {
                    out.push_str(&format!("\\u{code:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
