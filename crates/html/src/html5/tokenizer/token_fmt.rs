//! Deterministic token formatting for tests and traces.
//!
//! Attribute order is the tokenizer's encounter order, so two token streams
//! format identically only if they are identical.

use crate::html5::shared::{AtomId, AtomTable, Attribute, Token};
use std::fmt::Write;

#[derive(Debug)]
pub enum TokenFmtError {
    UnknownAtomId { id: AtomId },
}

impl std::fmt::Display for TokenFmtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenFmtError::UnknownAtomId { id } => write!(f, "unknown atom id: {id:?}"),
        }
    }
}

impl std::error::Error for TokenFmtError {}

/// Formatter context resolving atoms against a document's atom table.
pub struct TokenFmt<'a> {
    atoms: &'a AtomTable,
}

impl<'a> TokenFmt<'a> {
    pub fn new(atoms: &'a AtomTable) -> Self {
        Self { atoms }
    }

    pub fn resolve_atom(&self, id: AtomId) -> Result<&'a str, TokenFmtError> {
        self.atoms
            .resolve(id)
            .ok_or(TokenFmtError::UnknownAtomId { id })
    }

    pub fn format_token(&self, token: &Token) -> Result<String, TokenFmtError> {
        match token {
            Token::Doctype { name } => {
                let name = match name {
                    None => "null",
                    Some(id) => self.resolve_atom(*id)?,
                };
                Ok(format!("DOCTYPE name={name}"))
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                let mut out = String::new();
                out.push_str("START name=");
                out.push_str(self.resolve_atom(*name)?);
                out.push_str(" attrs=[");
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.push_attr(&mut out, attr)?;
                }
                out.push_str("] self_closing=");
                out.push_str(if *self_closing { "true" } else { "false" });
                Ok(out)
            }
            Token::EndTag { name } => Ok(format!("END name={}", self.resolve_atom(*name)?)),
            Token::Comment { text } => Ok(format!("COMMENT text=\"{}\"", escape_text(text))),
            Token::Text { text } => Ok(format!("CHAR text=\"{}\"", escape_text(text))),
            Token::Eof => Ok("EOF".to_string()),
        }
    }

    fn push_attr(&self, out: &mut String, attr: &Attribute) -> Result<(), TokenFmtError> {
        out.push_str(self.resolve_atom(attr.name)?);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            out.push_str(&escape_text(value));
            out.push('"');
        }
        Ok(())
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' || ch == '\u{7f}' => {
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}
