//! Tokenizer input helpers.

use crate::html5::shared::InputStream;
use crate::html5::tokenizer::Html5Tokenizer;
use memchr::{memchr_iter, memrchr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MatchResult {
    Matched,
    NeedMoreInput,
    NoMatch,
}

impl Html5Tokenizer {
    pub(super) fn peek(&self, input: &InputStream) -> Option<char> {
        input.current().chars().next()
    }

    /// Consume `bytes` bytes, tracking line/column.
    pub(super) fn consume(&mut self, input: &mut InputStream, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let consumed = &input.current()[..bytes];
        let raw = consumed.as_bytes();
        let newlines = memchr_iter(b'\n', raw).count();
        if newlines > 0 {
            self.line = self.line.saturating_add(newlines as u32);
            let after = memrchr(b'\n', raw).map_or(0, |idx| idx + 1);
            self.column = consumed[after..].chars().count() as u32;
        } else {
            self.column = self
                .column
                .saturating_add(consumed.chars().count() as u32);
        }
        input.advance(bytes);
    }

    /// Match an ASCII keyword at the cursor without consuming it.
    ///
    /// A partial match at the end of an open stream is `NeedMoreInput`; once the
    /// stream is closed no more characters can complete it.
    pub(super) fn match_ascii_prefix(
        &self,
        input: &InputStream,
        seq: &[u8],
        ignore_case: bool,
    ) -> MatchResult {
        let rest = input.current().as_bytes();
        let n = rest.len().min(seq.len());
        let same = if ignore_case {
            rest[..n].eq_ignore_ascii_case(&seq[..n])
        } else {
            rest[..n] == seq[..n]
        };
        if !same {
            MatchResult::NoMatch
        } else if n == seq.len() {
            MatchResult::Matched
        } else if input.is_closed() {
            MatchResult::NoMatch
        } else {
            MatchResult::NeedMoreInput
        }
    }
}

/// Byte length of the leading run of `text` whose chars satisfy `keep`.
pub(super) fn run_length(text: &str, keep: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|&(_, ch)| !keep(ch))
        .map_or(text.len(), |(idx, _)| idx)
}

pub(super) fn is_html_whitespace(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\u{0C}' | '\r' | ' ')
}
