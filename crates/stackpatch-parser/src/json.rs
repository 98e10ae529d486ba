//! JSON loader and writer.
//!
//! JSON documents keep their key order and number text but carry no comments
//! or layout. Short tags have no JSON spelling, so tagged nodes are written
//! in their explicit mapping form.

use log::warn;
use serde::Serialize as _;
use serde_json::{Map, Number, Value, ser::PrettyFormatter};
use stackpatch_core::{
    Document, Format, Mapping, Node, Scalar, ScalarKind, Sequence, Tag,
    document::{DocumentTrivia, LineEnding},
};

use crate::{
    config::WriterConfig,
    error::{Diagnostic, ErrorCode, ParseError},
    span::Span,
};

/// Loads a JSON document.
///
/// A repeated object key replaces the earlier value.
pub(crate) fn load(source: &str) -> Result<Document, ParseError> {
    let value: Value = serde_json::from_str(source).map_err(|err| {
        let offset = offset_of(source, err.line(), err.column());
        Diagnostic::coded(
            ErrorCode::E200,
            err.to_string(),
            Span::new(offset..offset + 1),
        )
    })?;

    let line_ending = match source.find('\n') {
        Some(idx) if idx > 0 && source.as_bytes()[idx - 1] == b'\r' => LineEnding::CrLf,
        _ => LineEnding::Lf,
    };
    let trivia = DocumentTrivia {
        line_ending,
        final_newline: source.ends_with('\n'),
        ..DocumentTrivia::default()
    };
    Ok(Document::new(to_node(value), Format::Json).with_trivia(trivia))
}

/// Writes a document as JSON.
pub(crate) fn write(doc: &Document, config: &WriterConfig) -> Result<String, serde_json::Error> {
    let value = to_value(doc.root());
    let indent = vec![b' '; config.json_indent()];
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut serializer)?;

    let mut out = String::from_utf8_lossy(&buf).into_owned();
    let trivia = doc.trivia();
    if trivia.final_newline {
        out.push('\n');
    }
    Ok(match trivia.line_ending {
        LineEnding::Lf => out,
        LineEnding::CrLf => out.replace('\n', "\r\n"),
    })
}

/// Byte offset of a 1-based line and column.
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

fn to_node(value: Value) -> Node {
    match value {
        Value::Null => Scalar::null().into(),
        Value::Bool(b) => Scalar::with_kind(b.to_string(), ScalarKind::Bool).into(),
        Value::Number(n) => {
            let text = n.to_string();
            let kind = if text.contains(['.', 'e', 'E']) {
                ScalarKind::Float
            } else {
                ScalarKind::Int
            };
            Scalar::with_kind(text, kind).into()
        }
        Value::String(s) => Scalar::string(s).into(),
        Value::Array(items) => items.into_iter().map(to_node).collect::<Sequence>().into(),
        Value::Object(map) => {
            let mut mapping = Mapping::new();
            for (key, value) in map {
                mapping.insert(key, to_node(value));
            }
            mapping.into()
        }
    }
}

fn to_value(node: &Node) -> Value {
    let untagged = match node {
        Node::Scalar(scalar) => scalar_value(scalar),
        Node::Sequence(sequence) => Value::Array(sequence.iter().map(to_value).collect()),
        Node::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .map(|(key, value)| (key.to_string(), to_value(value)))
                .collect::<Map<_, _>>(),
        ),
    };

    let Some(tag) = node.tag() else {
        return untagged;
    };
    let Some(function) = tag.function_name() else {
        warn!(tag:% = tag; "dropping custom tag without a JSON form");
        return untagged;
    };

    let argument = match (tag, untagged) {
        (Tag::GetAtt, Value::String(target)) => match target.split_once('.') {
            Some((resource, attribute)) => Value::Array(vec![
                Value::String(resource.to_string()),
                Value::String(attribute.to_string()),
            ]),
            None => Value::String(target),
        },
        (_, Value::Null) => Value::String(String::new()),
        (_, value) => value,
    };
    let mut map = Map::new();
    map.insert(function, argument);
    Value::Object(map)
}

fn scalar_value(scalar: &Scalar) -> Value {
    let text = scalar.value();
    match scalar.kind() {
        ScalarKind::Null => Value::Null,
        ScalarKind::String => Value::String(text.to_string()),
        ScalarKind::Bool => Value::Bool(matches!(text, "true" | "True" | "TRUE")),
        ScalarKind::Int => int_value(text).unwrap_or_else(|| Value::String(text.to_string())),
        ScalarKind::Float => float_value(text).unwrap_or_else(|| Value::String(text.to_string())),
    }
}

fn int_value(text: &str) -> Option<Value> {
    let (radix, digits) = if let Some(hex) = text.strip_prefix("0x") {
        (16, hex)
    } else if let Some(octal) = text.strip_prefix("0o") {
        (8, octal)
    } else {
        let decimal = text.strip_prefix('+').unwrap_or(text);
        return decimal.parse::<Number>().ok().map(Value::Number);
    };
    i64::from_str_radix(digits, radix)
        .ok()
        .map(|n| Value::Number(n.into()))
}

fn float_value(text: &str) -> Option<Value> {
    let text = text.strip_prefix('+').unwrap_or(text);
    if let Ok(number) = text.parse::<Number>() {
        return Some(Value::Number(number));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(source: &str) -> String {
        let doc = load(source).expect("loads");
        write(&doc, &WriterConfig::default()).expect("writes")
    }

    #[test]
    fn test_json_round_trip_keeps_order_and_numbers() {
        let source = "{\n  \"Zeta\": 1,\n  \"Alpha\": {\n    \"Price\": 1.50,\n    \"Big\": 123456789012345678901234567890\n  },\n  \"List\": [\n    true,\n    null,\n    \"x\"\n  ]\n}\n";
        assert_eq!(round_trip(source), source);
    }

    #[test]
    fn test_json_empty_collections_and_no_final_newline() {
        let source = "{\n  \"A\": {},\n  \"B\": []\n}";
        assert_eq!(round_trip(source), source);
    }

    #[test]
    fn test_json_kinds() {
        let doc = load("{\"a\": 1, \"b\": 2.5, \"c\": \"s\", \"d\": false}").expect("loads");
        let kind = |key: &str| doc.root().get(key).and_then(Node::as_scalar).map(Scalar::kind);

        assert_eq!(kind("a"), Some(ScalarKind::Int));
        assert_eq!(kind("b"), Some(ScalarKind::Float));
        assert_eq!(kind("c"), Some(ScalarKind::String));
        assert_eq!(kind("d"), Some(ScalarKind::Bool));
    }

    #[test]
    fn test_short_tags_become_explicit() {
        let mut root = Mapping::new();
        root.insert("A", Scalar::string("Bucket").with_tag(Tag::Ref));
        root.insert("B", Scalar::string("Role.Arn").with_tag(Tag::GetAtt));
        root.insert("C", Scalar::plain("0x1F"));

        let value = to_value(&root.into());
        assert_eq!(
            value,
            serde_json::json!({
                "A": {"Ref": "Bucket"},
                "B": {"Fn::GetAtt": ["Role", "Arn"]},
                "C": 31
            })
        );
    }

    #[test]
    fn test_json_error_span() {
        let err = load("{\n  \"a\": ,\n}").expect_err("invalid");
        let diag = &err.diagnostics()[0];

        assert_eq!(diag.code(), Some(ErrorCode::E200));
        let start = diag.labels()[0].span().start();
        assert!((2..12).contains(&start), "span starts at {start}");
    }

    #[test]
    fn test_offset_of() {
        assert_eq!(offset_of("ab\ncd", 2, 2), 4);
        assert_eq!(offset_of("ab", 1, 1), 0);
    }
}
