//! Scalar values and their resolved kinds.

use crate::{decor::Raw, tag::Tag};

/// The type a plain scalar resolves to.
///
/// Resolution follows the YAML 1.2 core schema. Quoted and block scalars are
/// always [`ScalarKind::String`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    String,
}

impl ScalarKind {
    /// Resolves the kind of an unquoted scalar.
    pub fn resolve(text: &str) -> Self {
        match text {
            "" | "~" | "null" | "Null" | "NULL" => return ScalarKind::Null,
            "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => return ScalarKind::Bool,
            ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf"
            | "-.INF" | ".nan" | ".NaN" | ".NAN" => return ScalarKind::Float,
            _ => {}
        }

        if is_int(text) {
            ScalarKind::Int
        } else if is_float(text) {
            ScalarKind::Float
        } else {
            ScalarKind::String
        }
    }
}

fn is_int(text: &str) -> bool {
    if let Some(octal) = text.strip_prefix("0o") {
        return !octal.is_empty() && octal.bytes().all(|b| (b'0'..=b'7').contains(&b));
    }
    if let Some(hex) = text.strip_prefix("0x") {
        return !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit());
    }
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// [-+]? ( \. [0-9]+ | [0-9]+ ( \. [0-9]* )? ) ( [eE] [-+]? [0-9]+ )?
fn is_float(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            (!int.is_empty() || !frac.is_empty())
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => !mantissa.is_empty() && mantissa.bytes().all(|b| b.is_ascii_digit()),
    };

    let exponent_ok = exponent.is_none_or(|exp| {
        let digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    });

    mantissa_ok && exponent_ok
}

/// How a scalar is written in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar.
    Literal,
    /// `>` block scalar.
    Folded,
}

impl ScalarStyle {
    /// Returns `true` for the `|` and `>` styles.
    pub fn is_block(self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

/// A leaf value.
///
/// `value` holds the decoded text. `raw` holds the token exactly as it
/// appeared in the source and is dropped whenever the value changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    value: String,
    kind: ScalarKind,
    style: ScalarStyle,
    tag: Option<Tag>,
    raw: Option<Raw>,
}

impl Scalar {
    /// Creates a string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: ScalarKind::String,
            style: ScalarStyle::Plain,
            tag: None,
            raw: None,
        }
    }

    /// Creates a scalar of the given kind. `value` must be its canonical text.
    pub fn with_kind(value: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            kind,
            ..Self::string(value)
        }
    }

    /// Creates a null scalar.
    pub fn null() -> Self {
        Self::with_kind("null", ScalarKind::Null)
    }

    /// Creates a scalar from a plain token, resolving its kind.
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = ScalarKind::resolve(&value);
        Self::with_kind(value, kind)
    }

    /// Sets the YAML style.
    pub fn with_style(mut self, style: ScalarStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Records the source token.
    pub fn with_raw(mut self, raw: Raw) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn raw(&self) -> Option<&Raw> {
        self.raw.as_ref()
    }

    /// Returns the value if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        (self.kind == ScalarKind::String).then_some(self.value.as_str())
    }

    /// Replaces the value with a string, keeping the style.
    ///
    /// The source token is discarded so the writer renders the new value.
    /// Setting the same string again is a no-op and keeps the token.
    pub fn set_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if self.kind == ScalarKind::String && self.value == value {
            return;
        }
        self.value = value;
        self.kind = ScalarKind::String;
        self.raw = None;
    }

    /// Replaces the style. The source token is discarded.
    pub fn set_style(&mut self, style: ScalarStyle) {
        if self.style != style {
            self.style = style;
            self.raw = None;
        }
    }

    pub fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }

    /// Returns `true` if both scalars have the same kind, value and tag.
    pub fn content_eq(&self, other: &Scalar) -> bool {
        self.kind == other.kind && self.value == other.value && self.tag == other.tag
    }
}
