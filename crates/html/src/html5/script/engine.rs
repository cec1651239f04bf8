//! Script evaluation seam.
//!
//! The parser only needs one thing from a script engine: run this source, and
//! let it call back into the document through a `DocumentWriter`.
//! `DocumentWriteEngine` understands exactly `document.write(...)` and
//! `document.writeln(...)` with string literal arguments, which is enough to
//! drive reentrant parsing end to end.

use crate::html5::script::DocumentWriter;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    /// Byte offset into the script source.
    pub offset: usize,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for ScriptError {}

pub trait ScriptEngine {
    fn evaluate(&mut self, source: &str, writer: &mut dyn DocumentWriter)
    -> Result<(), ScriptError>;
}

/// Engine that evaluates nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEngine;

impl ScriptEngine for NoopEngine {
    fn evaluate(
        &mut self,
        _source: &str,
        _writer: &mut dyn DocumentWriter,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// Engine recognizing `document.write("..")` / `document.writeln('..')` calls.
///
/// Arguments may be several string literals joined with `+`. Everything else in
/// the source is skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentWriteEngine;

const WRITE: &str = "document.write";

impl ScriptEngine for DocumentWriteEngine {
    fn evaluate(
        &mut self,
        source: &str,
        writer: &mut dyn DocumentWriter,
    ) -> Result<(), ScriptError> {
        let mut pos = 0;
        while let Some(found) = source[pos..].find(WRITE) {
            let mut at = pos + found + WRITE.len();
            let newline = source[at..].starts_with("ln");
            if newline {
                at += 2;
            }
            at = skip_whitespace(source, at);
            if !source[at..].starts_with('(') {
                pos = at;
                continue;
            }
            let (mut text, end) = parse_arguments(source, at + 1)?;
            if newline {
                text.push('\n');
            }
            log::trace!(target: "html5.script", "document.write({} bytes)", text.len());
            writer.write(&text);
            pos = end;
        }
        Ok(())
    }
}

/// Parse `lit (+ lit)* )` starting after the opening parenthesis.
fn parse_arguments(source: &str, start: usize) -> Result<(String, usize), ScriptError> {
    let mut out = String::new();
    let mut at = skip_whitespace(source, start);
    loop {
        at = parse_string_literal(source, at, &mut out)?;
        at = skip_whitespace(source, at);
        match source[at..].chars().next() {
            Some('+') => at = skip_whitespace(source, at + 1),
            Some(')') => return Ok((out, at + 1)),
            _ => {
                return Err(ScriptError {
                    message: "expected `+` or `)` after string argument".to_string(),
                    offset: at,
                });
            }
        }
    }
}

fn parse_string_literal(source: &str, start: usize, out: &mut String) -> Result<usize, ScriptError> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, quote @ ('"' | '\''))) => quote,
        _ => {
            return Err(ScriptError {
                message: "document.write argument is not a string literal".to_string(),
                offset: start,
            });
        }
    };
    while let Some((idx, ch)) = chars.next() {
        match ch {
            ch if ch == quote => return Ok(start + idx + 1),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            _ => out.push(ch),
        }
    }
    Err(ScriptError {
        message: "unterminated string literal".to_string(),
        offset: start,
    })
}

fn skip_whitespace(source: &str, start: usize) -> usize {
    start
        + source[start..]
            .find(|ch: char| !ch.is_whitespace())
            .unwrap_or(source.len() - start)
}
