//! Token level parsers shared by the block loader.
//!
//! Everything that can be recognized without knowing the surrounding
//! indentation lives here: tags, keys, quoted scalars, plain scalar extents
//! and complete flow collections. Parsers run on a [`LocatingSlice`] over the
//! remainder of the document so that quoted scalars and flow collections can
//! span several lines.

use stackpatch_core::{
    Mapping, Node, Scalar, ScalarKind, ScalarStyle, Sequence, Tag,
    decor::{Layout, Raw},
};
use winnow::{
    Parser as _,
    combinator::{alt, cut_err, opt, preceded, repeat, terminated},
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{any, none_of, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode},
    span::Span,
};

/// Diagnostic information attached to winnow errors via `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanDiagnostic {
    pub code: ErrorCode,
    pub message: &'static str,
    pub help: Option<&'static str>,
    /// Start of the error span, relative to the parser input.
    pub start: usize,
}

pub(crate) type Input<'a> = LocatingSlice<&'a str>;
pub(crate) type ScanResult<O> = ModalResult<O, ContextError<ScanDiagnostic>>;

/// Converts a winnow error into a diagnostic.
///
/// `base` is the absolute offset of the parser input in the source and
/// `error_pos` the input position at which parsing failed.
pub(crate) fn into_diagnostic(
    err: ErrMode<ContextError<ScanDiagnostic>>,
    error_pos: usize,
    base: usize,
) -> Diagnostic {
    let context_error = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    if let Some(ScanDiagnostic {
        code,
        message,
        help,
        start,
    }) = context_error.context().next()
    {
        let end = error_pos.max(*start + 1);
        let mut diag = Diagnostic::coded(*code, *message, Span::new(base + start..base + end));
        if let Some(h) = help {
            diag = diag.with_help(*h);
        }
        return diag;
    }

    let span = Span::new(base + error_pos..base + error_pos + 1);
    Diagnostic::coded(ErrorCode::E002, "unexpected character", span)
}

fn fail<O>(input: &mut Input<'_>, diagnostic: ScanDiagnostic) -> ScanResult<O> {
    Err(ErrMode::Cut(ContextError::new().add_context(
        input,
        &input.checkpoint(),
        diagnostic,
    )))
}

fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

/// Parses a tag and returns its text without the leading `!`.
///
/// `!!str` yields `"!str"`.
pub(crate) fn tag<'a>(input: &mut Input<'a>) -> ScanResult<&'a str> {
    preceded(
        '!',
        take_while(0.., |c: char| !c.is_whitespace() && !is_flow_indicator(c)),
    )
    .parse_next(input)
}

/// Parses a double-quoted scalar and returns it including the quotes.
pub(crate) fn double_quoted<'a>(input: &mut Input<'a>) -> ScanResult<&'a str> {
    let start = input.current_token_start();
    (
        '"',
        cut_err((
            repeat::<_, _, (), _, _>(
                0..,
                alt((('\\', any).void(), none_of(['"', '\\']).void())),
            ),
            '"',
        ))
        .context(ScanDiagnostic {
            code: ErrorCode::E004,
            message: "unterminated double-quoted scalar",
            help: Some("add a closing `\"`"),
            start,
        }),
    )
    .take()
    .parse_next(input)
}

/// Parses a single-quoted scalar and returns it including the quotes.
pub(crate) fn single_quoted<'a>(input: &mut Input<'a>) -> ScanResult<&'a str> {
    let start = input.current_token_start();
    (
        '\'',
        cut_err((
            repeat::<_, _, (), _, _>(0.., alt(("''".void(), none_of(['\'']).void()))),
            '\'',
        ))
        .context(ScanDiagnostic {
            code: ErrorCode::E004,
            message: "unterminated single-quoted scalar",
            help: Some("add a closing `'`"),
            start,
        }),
    )
    .take()
    .parse_next(input)
}

/// A mapping key as written in block context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockKey {
    /// Key text up to the `:` indicator, as written.
    pub raw: String,
    pub value: String,
    /// Length of `raw` plus the `:` indicator.
    pub len: usize,
}

/// Recognizes `key:` at the start of `text`, where the colon is followed by
/// whitespace or the end of the line.
///
/// Returns `None` if `text` does not start with a mapping key.
pub(crate) fn block_key(text: &str) -> Option<BlockKey> {
    let first = text.chars().next()?;
    let (key_len, value) = match first {
        '"' | '\'' => {
            let mut input = Input::new(text);
            let quoted = alt((double_quoted, single_quoted))
                .parse_next(&mut input)
                .ok()?;
            let value = decode_quoted(quoted).ok()?;
            (quoted.len(), value)
        }
        '-' | '?' | ':' if text[1..].starts_with([' ', '\t']) || text.len() == 1 => return None,
        '[' | ']' | '{' | '}' | ',' | '#' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`' => {
            return None;
        }
        _ => {
            let colon = find_mapping_colon(text)?;
            let raw = text[..colon].trim_end_matches([' ', '\t']);
            (raw.len(), raw.to_string())
        }
    };

    let rest = &text[key_len..];
    let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let after = &rest[spaces..];
    let after_colon = after.strip_prefix(':')?;
    if !(after_colon.is_empty() || after_colon.starts_with([' ', '\t'])) {
        return None;
    }

    Some(BlockKey {
        raw: text[..key_len + spaces].to_string(),
        value,
        len: key_len + spaces + 1,
    })
}

/// Position of the first `:` followed by whitespace or the end of the line,
/// not inside a comment.
fn find_mapping_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut prev_space = false;
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'#' if prev_space => return None,
            b':' if matches!(bytes.get(idx + 1), None | Some(b' ' | b'\t')) => return Some(idx),
            _ => {}
        }
        prev_space = matches!(b, b' ' | b'\t');
    }
    None
}

/// Length of a plain scalar at the start of `text` in block context.
///
/// The scalar ends at a comment or at the end of the line; trailing
/// whitespace is not included.
pub(crate) fn block_plain_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = bytes.len();
    for idx in 1..bytes.len() {
        if bytes[idx] == b'#' && matches!(bytes[idx - 1], b' ' | b'\t') {
            end = idx;
            break;
        }
    }
    text[..end].trim_end_matches([' ', '\t']).len()
}

/// Returns `true` if a block plain scalar contains a `: ` indicator.
pub(crate) fn has_mapping_indicator(plain: &str) -> bool {
    find_mapping_colon(plain).is_some()
}

/// Length of a plain scalar at the start of `text` in flow context.
fn flow_plain_len(text: &str) -> usize {
    let mut end = text.len();
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        let stop = match c {
            '\n' | '\r' => true,
            c if is_flow_indicator(c) => true,
            ':' => next.is_none_or(|n| n.is_whitespace() || is_flow_indicator(n)),
            '#' => prev.is_some_and(|p| p == ' ' || p == '\t'),
            _ => false,
        };
        if stop {
            end = idx;
            break;
        }
        prev = Some(c);
    }
    text[..end].trim_end_matches([' ', '\t']).len()
}

/// Decodes a quoted scalar including its quotes.
///
/// On failure returns the byte offset of the invalid escape in `quoted`.
pub(crate) fn decode_quoted(quoted: &str) -> Result<String, usize> {
    let inner = &quoted[1..quoted.len().saturating_sub(1).max(1)];
    if quoted.starts_with('"') {
        decode_double(inner).map_err(|pos| pos + 1)
    } else {
        Ok(fold_lines(inner).replace("''", "'"))
    }
}

/// Folds a multi-line flow scalar: a single line break becomes a space and
/// each empty line becomes a newline.
pub(crate) fn fold_lines(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut pending = 0usize;
    for (idx, line) in text.split('\n').enumerate() {
        let line = if idx == 0 {
            line.trim_end_matches([' ', '\t'])
        } else {
            line.trim_matches([' ', '\t'])
        };
        if idx == 0 {
            out.push_str(line);
        } else if line.is_empty() {
            pending += 1;
        } else {
            push_break(&mut out, pending);
            out.push_str(line);
            pending = 0;
        }
    }
    if pending > 0 {
        push_break(&mut out, pending);
    }
    out
}

fn push_break(out: &mut String, empty_lines: usize) {
    if empty_lines == 0 {
        out.push(' ');
    } else {
        out.extend(std::iter::repeat_n('\n', empty_lines));
    }
}

fn decode_double(inner: &str) -> Result<String, usize> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let Some((_, escape)) = chars.next() else {
                    return Err(idx);
                };
                let decoded = match escape {
                    '0' => '\0',
                    'a' => '\u{07}',
                    'b' => '\u{08}',
                    't' | '\t' => '\t',
                    'n' => '\n',
                    'v' => '\u{0B}',
                    'f' => '\u{0C}',
                    'r' => '\r',
                    'e' => '\u{1B}',
                    ' ' => ' ',
                    '"' => '"',
                    '/' => '/',
                    '\\' => '\\',
                    'N' => '\u{85}',
                    '_' => '\u{A0}',
                    'L' => '\u{2028}',
                    'P' => '\u{2029}',
                    'x' | 'u' | 'U' => {
                        let digits = match escape {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = 0u32;
                        for _ in 0..digits {
                            let digit = chars
                                .next()
                                .and_then(|(_, d)| d.to_digit(16))
                                .ok_or(idx)?;
                            code = code * 16 + digit;
                        }
                        char::from_u32(code).ok_or(idx)?
                    }
                    '\n' => {
                        while chars.next_if(|&(_, n)| n == ' ' || n == '\t').is_some() {}
                        continue;
                    }
                    _ => return Err(idx),
                };
                out.push(decoded);
            }
            '\n' => {
                while out.ends_with([' ', '\t']) {
                    out.pop();
                }
                let mut empty_lines = 0;
                loop {
                    while chars.next_if(|&(_, n)| n == ' ' || n == '\t').is_some() {}
                    if chars.next_if(|&(_, n)| n == '\n').is_some() {
                        empty_lines += 1;
                    } else {
                        break;
                    }
                }
                push_break(&mut out, empty_lines);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Normalizes line endings in text taken from the source.
pub(crate) fn normalize_newlines(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n")
    } else {
        text.to_string()
    }
}

/// Builds a scalar from a plain token.
///
/// Intrinsic function arguments are always strings; other plain scalars
/// resolve through the core schema.
pub(crate) fn plain_scalar(value: String, raw: Raw, tag: Option<Tag>) -> Scalar {
    let kind = match &tag {
        Some(tag) if !tag.is_custom() && !value.is_empty() => ScalarKind::String,
        _ => ScalarKind::resolve(&value),
    };
    let scalar = Scalar::with_kind(value, kind).with_raw(raw);
    match tag {
        Some(tag) => scalar.with_tag(tag),
        None => scalar,
    }
}

/// Builds a scalar from a quoted token.
pub(crate) fn quoted_scalar(
    quoted: &str,
    value: String,
    column: usize,
    tag: Option<Tag>,
) -> Scalar {
    let style = if quoted.starts_with('"') {
        ScalarStyle::DoubleQuoted
    } else {
        ScalarStyle::SingleQuoted
    };
    let scalar = Scalar::string(value)
        .with_style(style)
        .with_raw(Raw::new(quoted, column));
    match tag {
        Some(tag) => scalar.with_tag(tag),
        None => scalar,
    }
}

/// Parser for flow collections (`[...]`, `{...}`) and flow scalars.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowParser {
    /// Entry column the collection is read under, recorded in raw text.
    pub column: usize,
    pub allow_duplicate_keys: bool,
}

impl FlowParser {
    /// Parses a flow node, optionally tagged.
    pub fn node(&self, input: &mut Input<'_>) -> ScanResult<Node> {
        let tag = opt(terminated(tag, flow_ws))
            .parse_next(input)?
            .map(Tag::parse);
        let start = input.current_token_start();

        match input.chars().next() {
            Some('[') => {
                let (sequence, taken) = (|i: &mut Input<'_>| self.sequence(i))
                    .with_taken()
                    .parse_next(input)?;
                Ok(self.with_flow_raw(Node::Sequence(sequence), tag, taken))
            }
            Some('{') => {
                let (mapping, taken) = (|i: &mut Input<'_>| self.mapping(i))
                    .with_taken()
                    .parse_next(input)?;
                Ok(self.with_flow_raw(Node::Mapping(mapping), tag, taken))
            }
            Some('"' | '\'') => {
                let quoted = alt((double_quoted, single_quoted)).parse_next(input)?;
                let quoted = normalize_newlines(quoted);
                match decode_quoted(&quoted) {
                    Ok(value) => Ok(Node::Scalar(quoted_scalar(&quoted, value, self.column, tag))),
                    Err(pos) => fail(
                        input,
                        ScanDiagnostic {
                            code: ErrorCode::E003,
                            message: "invalid escape sequence",
                            help: Some("see the YAML double-quoted escapes, e.g. `\\n`, `\\\"`, `\\u00e9`"),
                            start: start + pos,
                        },
                    ),
                }
            }
            Some('&' | '*') => fail(
                input,
                ScanDiagnostic {
                    code: ErrorCode::E103,
                    message: "anchors and aliases are not supported",
                    help: Some("repeat the value instead of referring to it"),
                    start,
                },
            ),
            None | Some(',' | ']' | '}') => {
                Ok(Node::Scalar(plain_scalar(String::new(), Raw::new("", self.column), tag)))
            }
            Some(_) => {
                let len = flow_plain_len(input);
                if len == 0 {
                    return fail(
                        input,
                        ScanDiagnostic {
                            code: ErrorCode::E002,
                            message: "unexpected character in flow collection",
                            help: None,
                            start,
                        },
                    );
                }
                let text = input.next_slice(len);
                Ok(Node::Scalar(plain_scalar(
                    text.to_string(),
                    Raw::new(text, self.column),
                    tag,
                )))
            }
        }
    }

    /// Tags a flow collection and records its source text.
    fn with_flow_raw(&self, mut node: Node, tag: Option<Tag>, taken: &str) -> Node {
        node.set_tag(tag);
        let raw = Raw::new(normalize_newlines(taken), self.column)
            .with_fingerprint(node.fingerprint());
        let layout = Layout::Flow { raw: Some(raw) };
        match &mut node {
            Node::Mapping(mapping) => mapping.set_layout(layout),
            Node::Sequence(sequence) => sequence.set_layout(layout),
            Node::Scalar(_) => {}
        }
        node
    }

    fn sequence(&self, input: &mut Input<'_>) -> ScanResult<Sequence> {
        let start = input.current_token_start();
        '['.parse_next(input)?;
        let unterminated = ScanDiagnostic {
            code: ErrorCode::E101,
            message: "unterminated flow sequence",
            help: Some("add a closing `]`"),
            start,
        };

        let mut sequence = Sequence::new();
        loop {
            flow_ws(input)?;
            if opt(']').parse_next(input)?.is_some() {
                return Ok(sequence);
            }
            if input.is_empty() {
                return fail(input, unterminated);
            }
            sequence.push(self.node(input)?);
            flow_ws(input)?;
            match input.chars().next() {
                Some(',') => {
                    input.next_token();
                }
                Some(']') => {}
                _ => return fail(input, unterminated),
            }
        }
    }

    fn mapping(&self, input: &mut Input<'_>) -> ScanResult<Mapping> {
        let start = input.current_token_start();
        '{'.parse_next(input)?;
        let unterminated = ScanDiagnostic {
            code: ErrorCode::E101,
            message: "unterminated flow mapping",
            help: Some("add a closing `}`"),
            start,
        };

        let mut mapping = Mapping::new();
        loop {
            flow_ws(input)?;
            if opt('}').parse_next(input)?.is_some() {
                return Ok(mapping);
            }
            if input.is_empty() {
                return fail(input, unterminated);
            }

            let key_start = input.current_token_start();
            let key = match input.chars().next() {
                Some('"' | '\'') => {
                    let quoted = alt((double_quoted, single_quoted)).parse_next(input)?;
                    match decode_quoted(quoted) {
                        Ok(key) => key,
                        Err(_) => return fail(input, unterminated),
                    }
                }
                _ => {
                    let len = flow_plain_len(input);
                    if len == 0 {
                        return fail(input, unterminated);
                    }
                    input.next_slice(len).to_string()
                }
            };
            flow_ws(input)?;

            let value = if opt(':').parse_next(input)?.is_some() {
                flow_ws(input)?;
                self.node(input)?
            } else {
                Node::Scalar(Scalar::null().with_raw(Raw::new("", self.column)))
            };

            if mapping.contains_key(&key) && !self.allow_duplicate_keys {
                return fail(
                    input,
                    ScanDiagnostic {
                        code: ErrorCode::E102,
                        message: "duplicate key in flow mapping",
                        help: Some("rename or remove one of the entries"),
                        start: key_start,
                    },
                );
            }
            mapping.insert(key, value);

            flow_ws(input)?;
            match input.chars().next() {
                Some(',') => {
                    input.next_token();
                }
                Some('}') => {}
                _ => return fail(input, unterminated),
            }
        }
    }
}

/// Skips whitespace, line breaks and comments inside flow collections.
fn flow_ws(input: &mut Input<'_>) -> ScanResult<()> {
    repeat(
        0..,
        alt((
            take_while(1.., [' ', '\t', '\r', '\n']).void(),
            ('#', take_while(0.., |c: char| c != '\n')).void(),
        )),
    )
    .parse_next(input)
}
