//! Block structure loader.
//!
//! Walks the classified source lines and builds the node tree, recording the
//! formatting of every entry so the writer can reproduce it. Indentation is
//! tracked as (line, column) positions; everything inside a line is handed to
//! the token parsers in [`crate::scan`].

use std::collections::HashMap;

use log::trace;
use stackpatch_core::{
    Document, Entry, Format, Mapping, Node, Scalar, ScalarStyle, Sequence, Tag,
    decor::{Decor, Layout, Raw},
    document::DocumentTrivia,
};
use winnow::{Parser as _, combinator::alt, stream::Location};

use crate::{
    config::LoaderConfig,
    error::{Diagnostic, ErrorCode, ParseError, Result},
    lines::{DocumentMarker, Line, LineKind, SourceLines, scan},
    scan::{
        FlowParser, Input, block_key, block_plain_len, decode_quoted, double_quoted, fold_lines,
        has_mapping_indicator, into_diagnostic, normalize_newlines, plain_scalar, quoted_scalar,
        single_quoted,
    },
    span::Span,
};

/// Loads a YAML document.
pub(crate) fn load(
    source: &str,
    config: LoaderConfig,
) -> std::result::Result<Document, ParseError> {
    let lines = scan(source)?;
    let mut parser = BlockParser {
        source,
        lines,
        next: 0,
        config,
    };

    let prefix = parser.prefix()?;
    let (root, root_decor) = parser.root()?;
    let suffix = parser.suffix()?;

    let trivia = DocumentTrivia {
        prefix,
        root_decor,
        suffix,
        line_ending: parser.lines.line_ending,
        final_newline: parser.lines.final_newline,
    };
    Ok(Document::new(root, Format::Yaml).with_trivia(trivia))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    MappingValue,
    SequenceItem,
}

/// A parsed value together with the formatting around it.
struct Value {
    node: Node,
    gap: Option<String>,
    tag_gap: Option<String>,
    trailing: Option<String>,
}

impl Value {
    fn into_entry(self, leading: Vec<String>, key: Option<String>) -> Entry {
        Entry::with_decor(
            self.node,
            Decor {
                leading,
                key,
                gap: self.gap,
                tag_gap: self.tag_gap,
                trailing: self.trailing,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Clip,
    Strip,
    Keep,
}

struct BlockParser<'s> {
    source: &'s str,
    lines: SourceLines<'s>,
    /// Index of the first line not yet consumed.
    next: usize,
    config: LoaderConfig,
}

fn is_sequence_item(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('-') && matches!(chars.next(), None | Some(' ' | '\t'))
}

fn leading_ws(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

fn is_blank_or_comment(text: &str) -> bool {
    let rest = text.trim_start_matches([' ', '\t']);
    rest.is_empty() || rest.starts_with('#')
}

/// Sets a tag on a node and refreshes the fingerprint of recorded flow text.
fn attach_tag(node: &mut Node, tag: Option<Tag>) {
    if tag.is_none() {
        return;
    }
    node.set_tag(tag);
    let fingerprint = node.fingerprint();
    let layout = match &*node {
        Node::Mapping(mapping) => mapping.layout(),
        Node::Sequence(sequence) => sequence.layout(),
        Node::Scalar(_) => return,
    };
    if let Layout::Flow { raw: Some(raw) } = layout {
        let layout = Layout::Flow {
            raw: Some(raw.clone().with_fingerprint(fingerprint)),
        };
        match node {
            Node::Mapping(mapping) => mapping.set_layout(layout),
            Node::Sequence(sequence) => sequence.set_layout(layout),
            Node::Scalar(_) => {}
        }
    }
}

impl<'s> BlockParser<'s> {
    fn line(&self, idx: usize) -> Line<'s> {
        self.lines.lines[idx]
    }

    fn line_count(&self) -> usize {
        self.lines.lines.len()
    }

    /// Index of the next content line at or after the cursor.
    fn next_content(&self) -> Option<usize> {
        (self.next..self.line_count()).find(|&idx| self.line(idx).is_content())
    }

    /// Consumes the lines up to `upto` and returns their text.
    fn take_lines(&mut self, upto: usize) -> Vec<String> {
        let taken = (self.next..upto)
            .map(|idx| self.line(idx).text.to_string())
            .collect();
        self.next = upto;
        taken
    }

    fn unexpected(&self, idx: usize, col: usize, message: &str) -> Diagnostic {
        let line = self.line(idx);
        Diagnostic::coded(ErrorCode::E100, message, line.span_from(col))
            .with_help("check the indentation of this line")
    }

    fn prefix(&mut self) -> Result<Vec<String>> {
        let start = self.next;
        let mut seen_start = false;
        while let Some(idx) = self.next_content() {
            let line = self.line(idx);
            if line.text.starts_with('%') {
                self.next = idx + 1;
                continue;
            }
            match line.document_marker() {
                Some(DocumentMarker::Start) => {
                    if seen_start {
                        return Err(Diagnostic::coded(
                            ErrorCode::E105,
                            "multiple documents are not supported",
                            line.content_span(),
                        )
                        .with_help("split the stream into one file per document"));
                    }
                    if !is_blank_or_comment(line.after_marker()) {
                        return Err(self.unexpected(
                            idx,
                            3,
                            "content on the document start line is not supported",
                        ));
                    }
                    seen_start = true;
                    self.next = idx + 1;
                }
                _ => break,
            }
        }

        // With no content at all, every remaining line is prefix. Directives
        // and the start marker stay in it.
        let upto = self.next_content().unwrap_or(self.line_count());
        self.next = start;
        Ok(self.take_lines(upto))
    }

    fn root(&mut self) -> Result<(Node, Decor)> {
        let empty = || Node::Scalar(Scalar::null().with_raw(Raw::new("", 0)));
        let Some(idx) = self.next_content() else {
            return Ok((empty(), Decor::default()));
        };
        let line = self.line(idx);
        if line.document_marker().is_some() {
            return Ok((empty(), Decor::default()));
        }

        let col = line.indent;
        let text = &line.text[col..];
        if is_sequence_item(text) {
            let mut sequence = self.block_sequence(col, false)?;
            sequence.set_layout(Layout::Block {
                offset: Some(col),
                compact: false,
            });
            return Ok((sequence.into(), Decor::default()));
        }
        if self.starts_mapping(text) {
            let mut mapping = self.block_mapping(col, false)?;
            mapping.set_layout(Layout::Block {
                offset: Some(col),
                compact: false,
            });
            return Ok((mapping.into(), Decor::default()));
        }

        let value = self.value(idx, 0, 0, Context::MappingValue)?;
        let decor = Decor {
            gap: value.gap,
            tag_gap: value.tag_gap,
            trailing: value.trailing,
            ..Decor::default()
        };
        Ok((value.node, decor))
    }

    fn suffix(&mut self) -> Result<Vec<String>> {
        let mut seen_end = false;
        for idx in self.next..self.line_count() {
            let line = self.line(idx);
            if !line.is_content() {
                continue;
            }
            match line.document_marker() {
                Some(DocumentMarker::End) if !seen_end => seen_end = true,
                Some(_) => {
                    return Err(Diagnostic::coded(
                        ErrorCode::E105,
                        "multiple documents are not supported",
                        line.content_span(),
                    )
                    .with_help("split the stream into one file per document"));
                }
                None if seen_end => {
                    return Err(Diagnostic::coded(
                        ErrorCode::E105,
                        "content after the document end marker",
                        line.content_span(),
                    ));
                }
                None => {
                    return Err(self.unexpected(idx, line.indent, "unexpected content"));
                }
            }
        }
        Ok(self.take_lines(self.line_count()))
    }

    /// Whether `text` starts a block mapping entry (or something that can
    /// only be a broken one).
    fn starts_mapping(&self, text: &str) -> bool {
        block_key(text).is_some()
            || text == "?"
            || text.starts_with("? ")
            || text.starts_with(['&', '*'])
    }

    fn block_mapping(&mut self, col: usize, inline_first: bool) -> Result<Mapping> {
        let mut mapping = Mapping::new();
        let mut key_spans: HashMap<String, Span> = HashMap::new();
        let mut first = true;

        loop {
            let idx = if first && inline_first {
                self.next
            } else {
                match self.next_content() {
                    Some(idx)
                        if self.line(idx).indent == col
                            && self.line(idx).document_marker().is_none() =>
                    {
                        idx
                    }
                    _ => break,
                }
            };
            let line = self.line(idx);
            let text = &line.text[col..];

            if text == "?" || text.starts_with("? ") {
                return Err(Diagnostic::coded(
                    ErrorCode::E104,
                    "complex mapping keys are not supported",
                    line.span_from(col),
                ));
            }
            if text.starts_with(['&', '*']) {
                return Err(Diagnostic::coded(
                    ErrorCode::E103,
                    "anchors and aliases are not supported",
                    line.span_from(col),
                ));
            }
            let Some(key) = block_key(text) else {
                if is_sequence_item(text) {
                    return Err(self.unexpected(
                        idx,
                        col,
                        "sequence item where a mapping key was expected",
                    ));
                }
                return Err(self.unexpected(idx, col, "expected a mapping key"));
            };

            let leading = if first && inline_first {
                Vec::new()
            } else {
                self.take_lines(idx)
            };

            let key_start = line.offset + col;
            let key_span = Span::new(key_start..key_start + key.raw.trim_end().len());
            if let Some(first_span) = key_spans.get(&key.value) {
                if !self.config.allow_duplicate_keys() {
                    return Err(Diagnostic::error(format!("duplicate key `{}`", key.value))
                        .with_code(ErrorCode::E102)
                        .with_label(key_span, "duplicate key")
                        .with_secondary_label(*first_span, "first defined here")
                        .with_help("rename or remove one of the entries"));
                }
            } else {
                key_spans.insert(key.value.clone(), key_span);
            }

            trace!(key = key.value.as_str(), line = idx + 1; "mapping entry");
            let value = self.value(idx, col + key.len, col, Context::MappingValue)?;
            mapping.insert_entry(key.value, value.into_entry(leading, Some(key.raw)));
            first = false;
        }

        Ok(mapping)
    }

    fn block_sequence(&mut self, col: usize, inline_first: bool) -> Result<Sequence> {
        let mut sequence = Sequence::new();
        let mut first = true;

        loop {
            let idx = if first && inline_first {
                self.next
            } else {
                match self.next_content() {
                    Some(idx)
                        if self.line(idx).indent == col
                            && is_sequence_item(&self.line(idx).text[col..]) =>
                    {
                        idx
                    }
                    _ => break,
                }
            };

            let leading = if first && inline_first {
                Vec::new()
            } else {
                self.take_lines(idx)
            };
            let value = self.value(idx, col + 1, col, Context::SequenceItem)?;
            sequence.push_entry(value.into_entry(leading, None));
            first = false;
        }

        Ok(sequence)
    }

    /// Parses the value that follows an indicator at `pos` on line `idx`.
    ///
    /// `entry_col` is the column of the key or `-` the value belongs to.
    fn value(&mut self, idx: usize, pos: usize, entry_col: usize, ctx: Context) -> Result<Value> {
        let line = self.line(idx);
        let text = line.text;
        let rest = &text[pos..];
        let ws = leading_ws(rest);
        let mut cpos = pos + ws;

        if is_blank_or_comment(rest) {
            self.next = idx + 1;
            return self.block_child(entry_col, ctx, None, rest.to_string(), None);
        }
        let gap = rest[..ws].to_string();

        let mut tag = None;
        let mut tag_gap = None;
        if text[cpos..].starts_with('!') {
            let tag_text = &text[cpos + 1..];
            let tag_len = tag_text
                .find(char::is_whitespace)
                .unwrap_or(tag_text.len());
            let after_tag = &text[cpos + 1 + tag_len..];
            let parsed = Tag::parse(&tag_text[..tag_len]);
            if is_blank_or_comment(after_tag) {
                self.next = idx + 1;
                return self.block_child(
                    entry_col,
                    ctx,
                    Some(parsed),
                    after_tag.to_string(),
                    Some(gap),
                );
            }
            let ws = leading_ws(after_tag);
            tag_gap = Some(after_tag[..ws].to_string());
            tag = Some(parsed);
            cpos += 1 + tag_len + ws;
        }

        let content = &text[cpos..];
        if ctx == Context::SequenceItem && tag.is_none() {
            if is_sequence_item(content) {
                self.next = idx;
                let mut sequence = self.block_sequence(cpos, true)?;
                sequence.set_layout(Layout::Block {
                    offset: Some(cpos - entry_col),
                    compact: true,
                });
                return Ok(Value {
                    node: sequence.into(),
                    gap: Some(gap),
                    tag_gap: None,
                    trailing: None,
                });
            }
            if self.starts_mapping(content) {
                self.next = idx;
                let mut mapping = self.block_mapping(cpos, true)?;
                mapping.set_layout(Layout::Block {
                    offset: Some(cpos - entry_col),
                    compact: true,
                });
                return Ok(Value {
                    node: mapping.into(),
                    gap: Some(gap),
                    tag_gap: None,
                    trailing: None,
                });
            }
        }
        if ctx == Context::MappingValue && is_sequence_item(content) {
            return Err(self.unexpected(idx, cpos, "a block sequence must start on its own line"));
        }

        let (node, trailing) = self.inline(idx, cpos, entry_col, tag)?;
        Ok(Value {
            node,
            gap: Some(gap),
            tag_gap,
            trailing,
        })
    }

    /// Parses the block value of an entry whose header line has no inline
    /// content. The cursor is on the line after the header.
    fn block_child(
        &mut self,
        entry_col: usize,
        ctx: Context,
        tag: Option<Tag>,
        header_trailing: String,
        gap: Option<String>,
    ) -> Result<Value> {
        let child = self
            .next_content()
            .filter(|&idx| self.line(idx).document_marker().is_none());

        if let Some(idx) = child {
            let line = self.line(idx);
            let col = line.indent;
            let text = &line.text[col..];
            let indentless =
                ctx == Context::MappingValue && col == entry_col && is_sequence_item(text);

            if col > entry_col || indentless {
                let offset = Some(col - entry_col);
                if is_sequence_item(text) {
                    let mut sequence = self.block_sequence(col, false)?;
                    sequence.set_layout(Layout::Block {
                        offset,
                        compact: false,
                    });
                    let mut node = Node::Sequence(sequence);
                    node.set_tag(tag);
                    return Ok(Value {
                        node,
                        gap,
                        tag_gap: None,
                        trailing: Some(header_trailing),
                    });
                }
                if self.starts_mapping(text) {
                    let mut mapping = self.block_mapping(col, false)?;
                    mapping.set_layout(Layout::Block {
                        offset,
                        compact: false,
                    });
                    let mut node = Node::Mapping(mapping);
                    node.set_tag(tag);
                    return Ok(Value {
                        node,
                        gap,
                        tag_gap: None,
                        trailing: Some(header_trailing),
                    });
                }

                // A scalar or flow collection on the following line. The line
                // break and indentation become part of the gap before it.
                let mut between = header_trailing;
                for skipped in self.take_lines(idx) {
                    between.push('\n');
                    between.push_str(&skipped);
                }
                between.push('\n');
                between.push_str(&line.text[..col]);

                let has_tag = tag.is_some();
                let (node, trailing) = self.inline(idx, col, entry_col, tag)?;
                let (gap, tag_gap) = if has_tag {
                    (gap, Some(between))
                } else {
                    (Some(between), None)
                };
                return Ok(Value {
                    node,
                    gap,
                    tag_gap,
                    trailing,
                });
            }
        }

        let node = Node::Scalar(plain_scalar(String::new(), Raw::new("", entry_col), tag));
        Ok(Value {
            node,
            gap,
            tag_gap: None,
            trailing: Some(header_trailing),
        })
    }

    /// Parses a scalar or flow collection starting at `cpos` on line `idx`
    /// and returns it with the text that follows it on its last line.
    fn inline(
        &mut self,
        idx: usize,
        cpos: usize,
        entry_col: usize,
        tag: Option<Tag>,
    ) -> Result<(Node, Option<String>)> {
        let line = self.line(idx);
        let content = &line.text[cpos..];

        match content.chars().next() {
            Some('&' | '*') => Err(Diagnostic::coded(
                ErrorCode::E103,
                "anchors and aliases are not supported",
                line.span_from(cpos),
            )
            .with_help("repeat the value instead of referring to it")),
            Some('?') if content == "?" || content.starts_with("? ") => Err(Diagnostic::coded(
                ErrorCode::E104,
                "complex mapping keys are not supported",
                line.span_from(cpos),
            )),
            Some('|' | '>') => self
                .block_scalar(idx, cpos, entry_col, tag)
                .map(|node| (node, None)),
            Some('[' | '{') => self.flow(idx, cpos, entry_col, tag),
            Some('"' | '\'') => self.quoted(idx, cpos, entry_col, tag),
            _ => self.plain(idx, cpos, entry_col, tag),
        }
    }

    /// Text after a multi-line token, which may only be whitespace or a
    /// comment.
    fn after_token(&mut self, end: usize, what: &str) -> Result<Option<String>> {
        let (end_idx, end_col) = self.lines.locate(end);
        let line = self.line(end_idx);
        let rest = &line.text[end_col.min(line.text.len())..];
        if !is_blank_or_comment(rest) || (!rest.is_empty() && leading_ws(rest) == 0) {
            return Err(self.unexpected(
                end_idx,
                end_col,
                &format!("unexpected content after {what}"),
            ));
        }
        self.next = end_idx + 1;
        Ok(Some(rest.to_string()))
    }

    fn flow(
        &mut self,
        idx: usize,
        cpos: usize,
        entry_col: usize,
        tag: Option<Tag>,
    ) -> Result<(Node, Option<String>)> {
        let base = self.line(idx).offset + cpos;
        let mut input = Input::new(&self.source[base..]);
        let parser = FlowParser {
            column: entry_col,
            allow_duplicate_keys: self.config.allow_duplicate_keys(),
        };
        let mut node = parser
            .node(&mut input)
            .map_err(|err| into_diagnostic(err, input.current_token_start(), base))?;
        attach_tag(&mut node, tag);

        let trailing = self.after_token(base + input.current_token_start(), "flow collection")?;
        Ok((node, trailing))
    }

    fn quoted(
        &mut self,
        idx: usize,
        cpos: usize,
        entry_col: usize,
        tag: Option<Tag>,
    ) -> Result<(Node, Option<String>)> {
        let base = self.line(idx).offset + cpos;
        let mut input = Input::new(&self.source[base..]);
        let quoted = alt((double_quoted, single_quoted))
            .parse_next(&mut input)
            .map_err(|err| into_diagnostic(err, input.current_token_start(), base))?;
        let quoted = normalize_newlines(quoted);
        let value = decode_quoted(&quoted).map_err(|pos| {
            Diagnostic::coded(
                ErrorCode::E003,
                "invalid escape sequence",
                Span::new(base + pos..base + pos + 2),
            )
            .with_help("see the YAML double-quoted escapes, e.g. `\\n`, `\\\"`, `\\u00e9`")
        })?;

        let node = Node::Scalar(quoted_scalar(&quoted, value, entry_col, tag));
        let trailing = self.after_token(base + input.current_token_start(), "quoted scalar")?;
        Ok((node, trailing))
    }

    fn plain(
        &mut self,
        idx: usize,
        cpos: usize,
        entry_col: usize,
        tag: Option<Tag>,
    ) -> Result<(Node, Option<String>)> {
        let line = self.line(idx);
        let first = &line.text[cpos..];
        let len = block_plain_len(first);
        if has_mapping_indicator(&first[..len]) {
            return Err(Diagnostic::coded(
                ErrorCode::E106,
                "mapping values are not allowed here",
                Span::new(line.offset + cpos..line.offset + cpos + len),
            )
            .with_help("quote the value if it contains `: `"));
        }

        let mut raw = first[..len].to_string();
        let mut end_idx = idx;
        let mut end_pos = cpos + len;
        let mut closed = first[len..].trim_start().starts_with('#');

        let mut probe = idx + 1;
        while !closed {
            let mut candidate = probe;
            while candidate < self.line_count() && self.line(candidate).kind == LineKind::Blank {
                candidate += 1;
            }
            let Some(next) = (candidate < self.line_count()).then(|| self.line(candidate)) else {
                break;
            };
            if !next.is_content() || next.indent <= entry_col || next.document_marker().is_some() {
                break;
            }

            let body = &next.text[next.indent..];
            let body_len = block_plain_len(body);
            for blank in probe..candidate {
                raw.push('\n');
                raw.push_str(self.line(blank).text);
            }
            raw.push('\n');
            raw.push_str(&next.text[..next.indent + body_len]);
            end_idx = candidate;
            end_pos = next.indent + body_len;
            closed = body[body_len..].trim().starts_with('#');
            probe = candidate + 1;
        }

        let value = fold_lines(&raw);
        let node = Node::Scalar(plain_scalar(value, Raw::new(raw, entry_col), tag));
        self.next = end_idx + 1;
        Ok((node, Some(self.line(end_idx).text[end_pos..].to_string())))
    }

    fn block_scalar(
        &mut self,
        idx: usize,
        cpos: usize,
        entry_col: usize,
        tag: Option<Tag>,
    ) -> Result<Node> {
        let line = self.line(idx);
        let header = &line.text[cpos..];
        let style = if header.starts_with('|') {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };

        let mut chomping = Chomping::Clip;
        let mut explicit_indent = None;
        let mut header_len = 1;
        for c in header[1..].chars().take(2) {
            match c {
                '-' if chomping == Chomping::Clip => chomping = Chomping::Strip,
                '+' if chomping == Chomping::Clip => chomping = Chomping::Keep,
                '1'..='9' if explicit_indent.is_none() => {
                    explicit_indent = c.to_digit(10).map(|d| d as usize);
                }
                _ => break,
            }
            header_len += 1;
        }
        let after = &header[header_len..];
        if !is_blank_or_comment(after) || (!after.is_empty() && leading_ws(after) == 0) {
            return Err(Diagnostic::coded(
                ErrorCode::E005,
                "invalid block scalar header",
                Span::new(line.offset + cpos..line.offset + line.text.len()),
            )
            .with_help("use `|` or `>` followed by an optional `-`, `+` or indentation digit"));
        }

        let content_indent = match explicit_indent {
            Some(digit) => Some(entry_col + digit),
            None => ((idx + 1)..self.line_count())
                .map(|i| self.line(i))
                .find(|l| !l.text.trim_matches([' ', '\t']).is_empty())
                .map(|l| l.indent)
                .filter(|&indent| indent > entry_col),
        };

        let mut last_content = idx;
        let mut last_line = idx;
        if let Some(indent) = content_indent {
            for i in (idx + 1)..self.line_count() {
                let l = self.line(i);
                if l.text.trim_matches([' ', '\t']).is_empty() {
                    last_line = i;
                } else if l.indent >= indent {
                    last_content = i;
                    last_line = i;
                } else {
                    break;
                }
            }
        }
        let end_idx = if chomping == Chomping::Keep {
            last_line
        } else {
            last_content
        };

        let mut raw = header.to_string();
        let mut body_lines = Vec::new();
        for i in (idx + 1)..=end_idx {
            let text = self.line(i).text;
            raw.push('\n');
            raw.push_str(text);
            let indent = content_indent.unwrap_or(0);
            body_lines.push(text.get(indent..).unwrap_or_default());
        }

        let trailing_empty = body_lines.iter().rev().take_while(|l| l.is_empty()).count();
        let content = &body_lines[..body_lines.len() - trailing_empty];
        let mut value = match style {
            ScalarStyle::Folded => fold_block(content),
            _ => content.join("\n"),
        };
        match chomping {
            Chomping::Strip => {}
            Chomping::Clip => {
                if !content.is_empty() {
                    value.push('\n');
                }
            }
            Chomping::Keep => {
                let breaks = trailing_empty + usize::from(!content.is_empty());
                value.extend(std::iter::repeat_n('\n', breaks));
            }
        }

        self.next = end_idx + 1;
        let scalar = Scalar::string(value)
            .with_style(style)
            .with_raw(Raw::new(raw, entry_col));
        Ok(Node::Scalar(match tag {
            Some(tag) => scalar.with_tag(tag),
            None => scalar,
        }))
    }
}

/// Folds the lines of a `>` block scalar.
///
/// Adjacent lines are joined with a space, empty lines become newlines and
/// more-indented lines keep their line breaks.
fn fold_block(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut prev_folds = false;
    let mut empty_lines = 0;
    let mut started = false;

    for line in lines {
        if line.is_empty() {
            empty_lines += 1;
            continue;
        }
        let folds = !line.starts_with([' ', '\t']);
        if started {
            if prev_folds && folds && empty_lines == 0 {
                out.push(' ');
            } else if prev_folds && folds {
                out.extend(std::iter::repeat_n('\n', empty_lines));
            } else {
                out.extend(std::iter::repeat_n('\n', empty_lines + 1));
            }
        } else {
            out.extend(std::iter::repeat_n('\n', empty_lines));
        }
        out.push_str(line);
        prev_folds = folds;
        empty_lines = 0;
        started = true;
    }
    out
}
