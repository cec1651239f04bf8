//! HTML5 tokenizer public API.
//!
//! This is a pull tokenizer: each `next_token` call consumes characters from an
//! `InputStream` until one token is complete or the stream runs dry. Partial
//! tokens (a half-read tag name, an unterminated comment) live in the
//! tokenizer's own buffers, never as offsets into the stream, because
//! `document.write` may insert text at the cursor between two calls.
//!
//! Invariants:
//! - Chunk-equivalence: feeding input in one chunk or many chunks yields the same
//!   token sequence. Character data is buffered until markup or end-of-stream.
//! - No busy progress: with no new input, a call after `NeedMoreInput` returns
//!   `NeedMoreInput` again without consuming anything.
//! - EOF is emitted exactly once, after the stream is closed and drained.

use crate::html5::shared::{DocumentParseContext, InputStream, ParseErrorCode, Token};
use input::{MatchResult, is_html_whitespace, run_length};
use memchr::memchr;
use states::TokenizerState;
use std::collections::VecDeque;

mod emit;
mod input;
mod states;
mod token_fmt;

pub use states::RawTextKind;
pub use token_fmt::{TokenFmt, TokenFmtError};

/// Configuration for the tokenizer.
#[derive(Clone, Debug)]
pub struct TokenizerConfig {
    /// Emit an `EOF` token once the closed stream is drained.
    pub emit_eof: bool,
    /// Enter raw text mode after `<script>`, `<style>`, `<textarea>` and
    /// `<title>` start tags.
    pub raw_text_switching: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            emit_eof: true,
            raw_text_switching: true,
        }
    }
}

/// Result of one `next_token` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenizeResult {
    Token(Token),
    /// The stream holds no complete token; call again after more input arrives.
    NeedMoreInput,
}

/// Minimal tokenizer instrumentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    pub next_token_calls: u64,
    pub steps: u64,
    pub state_transitions: u64,
    pub tokens_emitted: u64,
}

/// Tag under construction.
#[derive(Debug, Default)]
struct TagBuilder {
    name: String,
    is_end: bool,
    self_closing: bool,
    // The attribute currently being read is always the last entry.
    attrs: Vec<(String, Option<String>)>,
}

impl TagBuilder {
    fn start() -> Self {
        Self::default()
    }

    fn end() -> Self {
        Self {
            is_end: true,
            ..Self::default()
        }
    }

    fn current_attr_name(&mut self) -> &mut String {
        if self.attrs.is_empty() {
            self.attrs.push((String::new(), None));
        }
        let last = self.attrs.len() - 1;
        &mut self.attrs[last].0
    }

    fn current_attr_value(&mut self) -> &mut String {
        if self.attrs.is_empty() {
            self.attrs.push((String::new(), None));
        }
        let last = self.attrs.len() - 1;
        self.attrs[last].1.get_or_insert_with(String::new)
    }
}

/// HTML5 tokenizer.
pub struct Html5Tokenizer {
    config: TokenizerConfig,
    state: TokenizerState,
    ready: VecDeque<Token>,
    text: String,
    comment: String,
    doctype: String,
    tag: TagBuilder,
    line: u32,
    column: u32,
    eof_emitted: bool,
    stats: TokenizerStats,
}

impl Html5Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config,
            state: TokenizerState::Data,
            ready: VecDeque::new(),
            text: String::new(),
            comment: String::new(),
            doctype: String::new(),
            tag: TagBuilder::default(),
            line: 1,
            column: 0,
            eof_emitted: false,
            stats: TokenizerStats::default(),
        }
    }

    /// Produce the next token, or `NeedMoreInput` if the stream has none.
    ///
    /// Consumed characters leave `input` for good; the cursor of `input` is the
    /// only position the tokenizer relies on.
    pub fn next_token(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> TokenizeResult {
        self.stats.next_token_calls = self.stats.next_token_calls.saturating_add(1);
        let mut idle_steps = 0u32;
        loop {
            if let Some(token) = self.ready.pop_front() {
                ctx.counters.tokens_emitted = ctx.counters.tokens_emitted.saturating_add(1);
                return TokenizeResult::Token(token);
            }
            if self.eof_emitted {
                return TokenizeResult::NeedMoreInput;
            }

            let before = (input.len(), self.state, self.text.len());
            self.stats.steps = self.stats.steps.saturating_add(1);
            match self.step(input, ctx) {
                Step::Progress => {
                    if before == (input.len(), self.state, self.text.len()) && self.ready.is_empty()
                    {
                        idle_steps += 1;
                        assert!(
                            idle_steps < 4,
                            "tokenizer step made no observable progress: state={:?} remaining={}",
                            self.state,
                            input.len()
                        );
                    } else {
                        idle_steps = 0;
                    }
                }
                Step::NeedMoreInput => {
                    if input.is_exhausted() {
                        self.emit_eof(ctx);
                        continue;
                    }
                    return TokenizeResult::NeedMoreInput;
                }
            }
        }
    }

    /// Tokenizer is in `Data` with no partial token buffered.
    ///
    /// Only in this state can a second tokenizer start scanning from the same
    /// position and reach the same conclusions.
    pub fn is_in_initial_state(&self) -> bool {
        self.state == TokenizerState::Data && self.ready.is_empty()
    }

    /// Raw text element whose content is currently being read, if any.
    pub fn raw_text_kind(&self) -> Option<RawTextKind> {
        match self.state {
            TokenizerState::RawText(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn eof_emitted(&self) -> bool {
        self.eof_emitted
    }

    /// 1-based line of the next unconsumed character.
    pub fn line_number(&self) -> u32 {
        self.line
    }

    /// 0-based column of the next unconsumed character.
    pub fn column_number(&self) -> u32 {
        self.column
    }

    /// Return a copy of current instrumentation counters.
    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    fn transition_to(&mut self, next: TokenizerState) {
        if self.state == next {
            return;
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "html5.tokenizer",
            "state {:?} -> {:?} @{}:{}",
            self.state,
            next,
            self.line,
            self.column
        );
        self.state = next;
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
    }

    fn step(&mut self, input: &mut InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.state {
            TokenizerState::Data => self.step_data(input),
            TokenizerState::TagOpen => self.step_tag_open(input, ctx),
            TokenizerState::EndTagOpen => self.step_end_tag_open(input, ctx),
            TokenizerState::TagName => self.step_tag_name(input, ctx),
            TokenizerState::BeforeAttributeName => self.step_before_attribute_name(input, ctx),
            TokenizerState::AttributeName => self.step_attribute_name(input),
            TokenizerState::AfterAttributeName => self.step_after_attribute_name(input, ctx),
            TokenizerState::BeforeAttributeValue => self.step_before_attribute_value(input, ctx),
            TokenizerState::AttributeValueDoubleQuoted => self.step_attribute_value_quoted(input, b'"'),
            TokenizerState::AttributeValueSingleQuoted => {
                self.step_attribute_value_quoted(input, b'\'')
            }
            TokenizerState::AttributeValueUnquoted => self.step_attribute_value_unquoted(input, ctx),
            TokenizerState::SelfClosingStartTag => self.step_self_closing_start_tag(input, ctx),
            TokenizerState::MarkupDeclarationOpen => self.step_markup_declaration_open(input),
            TokenizerState::Comment => self.step_comment(input),
            TokenizerState::BogusComment => self.step_bogus_comment(input),
            TokenizerState::Doctype => self.step_doctype(input, ctx),
            TokenizerState::RawText(kind) => self.step_raw_text(input, kind),
        }
    }

    fn step_data(&mut self, input: &mut InputStream) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        match memchr(b'<', rest.as_bytes()) {
            Some(0) => {
                // Flush at the delimiter so token boundaries do not depend on
                // chunk boundaries.
                self.flush_text();
                self.consume(input, 1);
                self.transition_to(TokenizerState::TagOpen);
                Step::Progress
            }
            Some(idx) => {
                self.text.push_str(&rest[..idx]);
                self.consume(input, idx);
                Step::Progress
            }
            None => {
                let len = rest.len();
                self.text.push_str(rest);
                self.consume(input, len);
                Step::NeedMoreInput
            }
        }
    }

    fn step_tag_open(&mut self, input: &mut InputStream, ctx: &mut DocumentParseContext) -> Step {
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('!') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::MarkupDeclarationOpen);
                Step::Progress
            }
            Some('/') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::EndTagOpen);
                Step::Progress
            }
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.tag = TagBuilder::start();
                self.transition_to(TokenizerState::TagName);
                Step::Progress
            }
            Some('?') => {
                ctx.record_error(ParseErrorCode::InvalidFirstCharacterOfTagName, self.line);
                self.comment.clear();
                self.transition_to(TokenizerState::BogusComment);
                Step::Progress
            }
            Some(_) => {
                // Recovery: a lone `<` is character data.
                ctx.record_error(ParseErrorCode::InvalidFirstCharacterOfTagName, self.line);
                self.text.push('<');
                self.transition_to(TokenizerState::Data);
                Step::Progress
            }
        }
    }

    fn step_end_tag_open(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.tag = TagBuilder::end();
                self.transition_to(TokenizerState::TagName);
                Step::Progress
            }
            Some('>') => {
                // `</>` is dropped entirely.
                ctx.record_error(ParseErrorCode::InvalidFirstCharacterOfTagName, self.line);
                self.consume(input, 1);
                self.transition_to(TokenizerState::Data);
                Step::Progress
            }
            Some(_) => {
                ctx.record_error(ParseErrorCode::InvalidFirstCharacterOfTagName, self.line);
                self.comment.clear();
                self.transition_to(TokenizerState::BogusComment);
                Step::Progress
            }
        }
    }

    fn step_tag_name(&mut self, input: &mut InputStream, ctx: &mut DocumentParseContext) -> Step {
        let rest = input.current();
        let len = run_length(rest, |ch| !is_html_whitespace(ch) && ch != '/' && ch != '>');
        if len > 0 {
            self.tag.name.push_str(&rest[..len]);
            self.consume(input, len);
        }
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('/') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
                Step::Progress
            }
            Some('>') => {
                self.consume(input, 1);
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some(ch) => {
                self.consume(input, ch.len_utf8());
                self.transition_to(TokenizerState::BeforeAttributeName);
                Step::Progress
            }
        }
    }

    fn step_before_attribute_name(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        let skipped = run_length(input.current(), is_html_whitespace);
        self.consume(input, skipped);
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('/') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
                Step::Progress
            }
            Some('>') => {
                self.consume(input, 1);
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some('=') => {
                // A leading `=` belongs to the attribute name.
                self.consume(input, 1);
                self.tag.attrs.push(("=".to_string(), None));
                self.transition_to(TokenizerState::AttributeName);
                Step::Progress
            }
            Some(_) => {
                self.tag.attrs.push((String::new(), None));
                self.transition_to(TokenizerState::AttributeName);
                Step::Progress
            }
        }
    }

    fn step_attribute_name(&mut self, input: &mut InputStream) -> Step {
        let rest = input.current();
        let len = run_length(rest, |ch| {
            !is_html_whitespace(ch) && ch != '/' && ch != '>' && ch != '='
        });
        if len > 0 {
            self.tag.current_attr_name().push_str(&rest[..len]);
            self.consume(input, len);
        }
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('=') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeValue);
                Step::Progress
            }
            Some(_) => {
                self.transition_to(TokenizerState::AfterAttributeName);
                Step::Progress
            }
        }
    }

    fn step_after_attribute_name(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        let skipped = run_length(input.current(), is_html_whitespace);
        self.consume(input, skipped);
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('=') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::BeforeAttributeValue);
                Step::Progress
            }
            Some('/') => {
                self.consume(input, 1);
                self.transition_to(TokenizerState::SelfClosingStartTag);
                Step::Progress
            }
            Some('>') => {
                self.consume(input, 1);
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some(_) => {
                self.tag.attrs.push((String::new(), None));
                self.transition_to(TokenizerState::AttributeName);
                Step::Progress
            }
        }
    }

    fn step_before_attribute_value(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        let skipped = run_length(input.current(), is_html_whitespace);
        self.consume(input, skipped);
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('"') => {
                self.consume(input, 1);
                self.tag.current_attr_value();
                self.transition_to(TokenizerState::AttributeValueDoubleQuoted);
                Step::Progress
            }
            Some('\'') => {
                self.consume(input, 1);
                self.tag.current_attr_value();
                self.transition_to(TokenizerState::AttributeValueSingleQuoted);
                Step::Progress
            }
            Some('>') => {
                self.consume(input, 1);
                self.tag.current_attr_value();
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some(_) => {
                self.tag.current_attr_value();
                self.transition_to(TokenizerState::AttributeValueUnquoted);
                Step::Progress
            }
        }
    }

    fn step_attribute_value_quoted(&mut self, input: &mut InputStream, quote: u8) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        match memchr(quote, rest.as_bytes()) {
            Some(idx) => {
                self.tag.current_attr_value().push_str(&rest[..idx]);
                self.consume(input, idx + 1);
                self.transition_to(TokenizerState::BeforeAttributeName);
                Step::Progress
            }
            None => {
                let len = rest.len();
                self.tag.current_attr_value().push_str(rest);
                self.consume(input, len);
                Step::NeedMoreInput
            }
        }
    }

    fn step_attribute_value_unquoted(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        let rest = input.current();
        let len = run_length(rest, |ch| !is_html_whitespace(ch) && ch != '>');
        if len > 0 {
            self.tag.current_attr_value().push_str(&rest[..len]);
            self.consume(input, len);
        }
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('>') => {
                self.consume(input, 1);
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some(ch) => {
                self.consume(input, ch.len_utf8());
                self.transition_to(TokenizerState::BeforeAttributeName);
                Step::Progress
            }
        }
    }

    fn step_self_closing_start_tag(
        &mut self,
        input: &mut InputStream,
        ctx: &mut DocumentParseContext,
    ) -> Step {
        match self.peek(input) {
            None => Step::NeedMoreInput,
            Some('>') => {
                self.consume(input, 1);
                self.tag.self_closing = true;
                self.emit_current_tag(ctx);
                Step::Progress
            }
            Some(_) => {
                self.transition_to(TokenizerState::BeforeAttributeName);
                Step::Progress
            }
        }
    }

    fn step_markup_declaration_open(&mut self, input: &mut InputStream) -> Step {
        match self.match_ascii_prefix(input, b"--", false) {
            MatchResult::Matched => {
                self.consume(input, 2);
                self.comment.clear();
                self.transition_to(TokenizerState::Comment);
                return Step::Progress;
            }
            MatchResult::NeedMoreInput => return Step::NeedMoreInput,
            MatchResult::NoMatch => {}
        }
        match self.match_ascii_prefix(input, b"DOCTYPE", true) {
            MatchResult::Matched => {
                self.consume(input, b"DOCTYPE".len());
                self.doctype.clear();
                self.transition_to(TokenizerState::Doctype);
                return Step::Progress;
            }
            MatchResult::NeedMoreInput => return Step::NeedMoreInput,
            MatchResult::NoMatch => {}
        }
        // CDATA and anything else unsupported reads as a bogus comment.
        self.comment.clear();
        self.transition_to(TokenizerState::BogusComment);
        Step::Progress
    }

    fn step_comment(&mut self, input: &mut InputStream) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        // `<!-->` and `<!--->` close immediately.
        if self.comment.is_empty() {
            for abrupt in ["->", ">"] {
                if rest.starts_with(abrupt) {
                    self.consume(input, abrupt.len());
                    self.emit_comment();
                    return Step::Progress;
                }
            }
        }
        if let Some(idx) = rest.find("-->") {
            self.comment.push_str(&rest[..idx]);
            self.consume(input, idx + 3);
            self.emit_comment();
            return Step::Progress;
        }
        // Hold back trailing dashes that may start the terminator.
        let dashes = rest.len() - rest.trim_end_matches('-').len();
        let keep = if input.is_closed() { 0 } else { dashes.min(2) };
        let take = rest.len() - keep;
        if take > 0 {
            self.comment.push_str(&rest[..take]);
            self.consume(input, take);
        }
        Step::NeedMoreInput
    }

    fn step_bogus_comment(&mut self, input: &mut InputStream) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        match memchr(b'>', rest.as_bytes()) {
            Some(idx) => {
                self.comment.push_str(&rest[..idx]);
                self.consume(input, idx + 1);
                self.emit_comment();
                Step::Progress
            }
            None => {
                let len = rest.len();
                self.comment.push_str(rest);
                self.consume(input, len);
                Step::NeedMoreInput
            }
        }
    }

    fn step_doctype(&mut self, input: &mut InputStream, ctx: &mut DocumentParseContext) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        match memchr(b'>', rest.as_bytes()) {
            Some(idx) => {
                self.doctype.push_str(&rest[..idx]);
                self.consume(input, idx + 1);
                self.emit_doctype(ctx);
                Step::Progress
            }
            None => {
                let len = rest.len();
                self.doctype.push_str(rest);
                self.consume(input, len);
                Step::NeedMoreInput
            }
        }
    }

    fn step_raw_text(&mut self, input: &mut InputStream, kind: RawTextKind) -> Step {
        let rest = input.current();
        if rest.is_empty() {
            return Step::NeedMoreInput;
        }
        match memchr(b'<', rest.as_bytes()) {
            None => {
                let len = rest.len();
                self.text.push_str(rest);
                self.consume(input, len);
                Step::NeedMoreInput
            }
            Some(idx) if idx > 0 => {
                self.text.push_str(&rest[..idx]);
                self.consume(input, idx);
                Step::Progress
            }
            Some(_) => match self.match_raw_text_end_tag(input, kind) {
                MatchResult::Matched => {
                    self.flush_text();
                    self.consume(input, 2);
                    self.tag = TagBuilder::end();
                    self.transition_to(TokenizerState::TagName);
                    Step::Progress
                }
                MatchResult::NeedMoreInput => Step::NeedMoreInput,
                MatchResult::NoMatch => {
                    self.text.push('<');
                    self.consume(input, 1);
                    Step::Progress
                }
            },
        }
    }

    /// `</name` followed by whitespace, `/` or `>` ends a raw text element.
    fn match_raw_text_end_tag(&self, input: &InputStream, kind: RawTextKind) -> MatchResult {
        let mut seq = String::with_capacity(2 + kind.tag_name().len());
        seq.push_str("</");
        seq.push_str(kind.tag_name());
        match self.match_ascii_prefix(input, seq.as_bytes(), true) {
            MatchResult::Matched => {}
            other => return other,
        }
        match input.current().as_bytes().get(seq.len()) {
            None if input.is_closed() => MatchResult::NoMatch,
            None => MatchResult::NeedMoreInput,
            Some(b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' | b'/' | b'>') => MatchResult::Matched,
            Some(_) => MatchResult::NoMatch,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Progress,
    NeedMoreInput,
}
