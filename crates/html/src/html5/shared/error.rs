//! Parse errors for tokenization/tree-building.
//!
//! Malformed markup is recovered from in place; errors are only recorded on the
//! document context for diagnostics and never returned to callers.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorCode {
    UnexpectedNullCharacter,
    EofInTag,
    EofInComment,
    EofInScriptData,
    UnexpectedEndTag,
    InvalidFirstCharacterOfTagName,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub line: u32,
}
