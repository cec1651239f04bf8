//! HTML5 token model.
//!
//! Tokens own their payloads. The input buffer they were read from can be
//! rewritten by `document.write` between two tokens, so spans into it would not
//! survive; a token lives only from `next_token` until the tree builder has
//! applied it.

use super::AtomId;

/// HTML attribute with interned name and optional value.
///
/// Attributes on a `StartTag` are stored in encounter order; duplicates are
/// dropped after the first occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: AtomId,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Doctype {
        /// Name atomized with HTML ASCII-folding rules.
        name: Option<AtomId>,
    },
    StartTag {
        name: AtomId,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: AtomId,
    },
    Comment {
        text: String,
    },
    /// A maximal run of character data between markup.
    Text {
        text: String,
    },
    Eof,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self, Token::Eof)
    }
}

/// Value of the first attribute named `name`; a valueless attribute reads as "".
pub fn attribute_value(attrs: &[Attribute], name: AtomId) -> Option<&str> {
    attrs
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| attr.value.as_deref().unwrap_or(""))
}
