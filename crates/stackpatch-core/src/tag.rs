//! Intrinsic function short tags.
//!
//! Templates may spell an intrinsic function either as an explicit mapping
//! (`{ "Fn::GetAtt": [...] }`) or as a YAML short tag (`!GetAtt ...`). The
//! [`Tag`] enum names every recognized short tag so that callers match on a
//! closed set of variants instead of comparing tag suffixes.

use std::fmt;

/// A YAML tag attached to a node.
///
/// Each recognized intrinsic function has its own variant. Anything else is
/// kept verbatim in [`Tag::Custom`] so that it survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Ref,
    GetAtt,
    Sub,
    Base64,
    Cidr,
    FindInMap,
    GetAZs,
    ImportValue,
    Join,
    Select,
    Split,
    Transform,
    Length,
    ToJsonString,
    And,
    Equals,
    If,
    Not,
    Or,
    Condition,
    /// Any other tag, stored without the leading `!`.
    Custom(String),
}

impl Tag {
    /// Parses tag text without the leading `!`, e.g. `"GetAtt"`.
    pub fn parse(text: &str) -> Self {
        match text {
            "Ref" => Tag::Ref,
            "GetAtt" => Tag::GetAtt,
            "Sub" => Tag::Sub,
            "Base64" => Tag::Base64,
            "Cidr" => Tag::Cidr,
            "FindInMap" => Tag::FindInMap,
            "GetAZs" => Tag::GetAZs,
            "ImportValue" => Tag::ImportValue,
            "Join" => Tag::Join,
            "Select" => Tag::Select,
            "Split" => Tag::Split,
            "Transform" => Tag::Transform,
            "Length" => Tag::Length,
            "ToJsonString" => Tag::ToJsonString,
            "And" => Tag::And,
            "Equals" => Tag::Equals,
            "If" => Tag::If,
            "Not" => Tag::Not,
            "Or" => Tag::Or,
            "Condition" => Tag::Condition,
            other => Tag::Custom(other.to_string()),
        }
    }

    /// Returns the tag text without the leading `!`.
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Ref => "Ref",
            Tag::GetAtt => "GetAtt",
            Tag::Sub => "Sub",
            Tag::Base64 => "Base64",
            Tag::Cidr => "Cidr",
            Tag::FindInMap => "FindInMap",
            Tag::GetAZs => "GetAZs",
            Tag::ImportValue => "ImportValue",
            Tag::Join => "Join",
            Tag::Select => "Select",
            Tag::Split => "Split",
            Tag::Transform => "Transform",
            Tag::Length => "Length",
            Tag::ToJsonString => "ToJsonString",
            Tag::And => "And",
            Tag::Equals => "Equals",
            Tag::If => "If",
            Tag::Not => "Not",
            Tag::Or => "Or",
            Tag::Condition => "Condition",
            Tag::Custom(text) => text,
        }
    }

    /// Returns the key used by the explicit mapping form of this function.
    ///
    /// `Ref` and `Condition` keep their bare name, every other intrinsic is
    /// prefixed with `Fn::`. Custom tags have no explicit form.
    pub fn function_name(&self) -> Option<String> {
        match self {
            Tag::Ref | Tag::Condition => Some(self.as_str().to_string()),
            Tag::Custom(_) => None,
            _ => Some(format!("Fn::{}", self.as_str())),
        }
    }

    /// Returns `true` for tags that are not intrinsic functions.
    pub fn is_custom(&self) -> bool {
        matches!(self, Tag::Custom(_))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.as_str())
    }
}
