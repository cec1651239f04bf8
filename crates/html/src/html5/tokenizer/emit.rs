//! Token emission helpers.

use crate::html5::shared::{Attribute, DocumentParseContext, ParseErrorCode, Token};
use crate::html5::tokenizer::states::{RawTextKind, TokenizerState};
use crate::html5::tokenizer::{Html5Tokenizer, TagBuilder};

impl Html5Tokenizer {
    pub(super) fn emit_token(&mut self, token: Token) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html5.tokenizer", "emit token: {token:?}");
        self.ready.push_back(token);
        self.stats.tokens_emitted = self.stats.tokens_emitted.saturating_add(1);
    }

    /// Emit buffered character data as one `Text` token.
    pub(super) fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        self.emit_token(Token::Text { text });
    }

    pub(super) fn emit_comment(&mut self) {
        let text = std::mem::take(&mut self.comment);
        self.emit_token(Token::Comment { text });
        self.transition_to(TokenizerState::Data);
    }

    pub(super) fn emit_doctype(&mut self, ctx: &mut DocumentParseContext) {
        let raw = std::mem::take(&mut self.doctype);
        let name = raw
            .split_ascii_whitespace()
            .next()
            .map(|name| ctx.atoms.intern_ascii_folded(name));
        self.emit_token(Token::Doctype { name });
        self.transition_to(TokenizerState::Data);
    }

    /// Finalize the tag under construction.
    ///
    /// Names are interned ASCII-folded. Attributes keep encounter order and
    /// later duplicates are dropped. A non-self-closing raw text start tag
    /// switches the tokenizer into raw text for that element.
    pub(super) fn emit_current_tag(&mut self, ctx: &mut DocumentParseContext) {
        let tag = std::mem::take(&mut self.tag);
        let name = ctx.atoms.intern_ascii_folded(&tag.name);
        if tag.is_end {
            self.emit_token(Token::EndTag { name });
            self.transition_to(TokenizerState::Data);
            return;
        }

        let mut attrs: Vec<Attribute> = Vec::with_capacity(tag.attrs.len());
        for (raw_name, value) in tag.attrs {
            if raw_name.is_empty() {
                continue;
            }
            let attr_name = ctx.atoms.intern_ascii_folded(&raw_name);
            if attrs.iter().any(|attr| attr.name == attr_name) {
                continue;
            }
            attrs.push(Attribute {
                name: attr_name,
                value,
            });
        }

        let next = if self.config.raw_text_switching && !tag.self_closing {
            ctx.atoms
                .resolve(name)
                .and_then(RawTextKind::from_tag_name)
                .map_or(TokenizerState::Data, TokenizerState::RawText)
        } else {
            TokenizerState::Data
        };
        self.emit_token(Token::StartTag {
            name,
            attrs,
            self_closing: tag.self_closing,
        });
        self.transition_to(next);
    }

    /// Flush whatever the current state holds and emit end-of-stream.
    pub(super) fn emit_eof(&mut self, ctx: &mut DocumentParseContext) {
        match self.state {
            TokenizerState::Data => {}
            TokenizerState::TagOpen => self.text.push('<'),
            TokenizerState::EndTagOpen => self.text.push_str("</"),
            TokenizerState::TagName
            | TokenizerState::BeforeAttributeName
            | TokenizerState::AttributeName
            | TokenizerState::AfterAttributeName
            | TokenizerState::BeforeAttributeValue
            | TokenizerState::AttributeValueDoubleQuoted
            | TokenizerState::AttributeValueSingleQuoted
            | TokenizerState::AttributeValueUnquoted
            | TokenizerState::SelfClosingStartTag => {
                ctx.record_error(ParseErrorCode::EofInTag, self.line);
                self.tag = TagBuilder::default();
            }
            TokenizerState::MarkupDeclarationOpen | TokenizerState::BogusComment => {
                self.emit_comment();
            }
            TokenizerState::Comment => {
                ctx.record_error(ParseErrorCode::EofInComment, self.line);
                self.emit_comment();
            }
            TokenizerState::Doctype => self.emit_doctype(ctx),
            TokenizerState::RawText(kind) => {
                if kind == RawTextKind::Script {
                    ctx.record_error(ParseErrorCode::EofInScriptData, self.line);
                }
            }
        }
        if memchr::memchr(0, self.text.as_bytes()).is_some() {
            ctx.record_error(ParseErrorCode::UnexpectedNullCharacter, self.line);
        }
        self.flush_text();
        self.transition_to(TokenizerState::Data);
        if self.config.emit_eof {
            self.emit_token(Token::Eof);
        }
        self.eof_emitted = true;
        log::debug!(
            target: "html5.tokenizer",
            "eof at line {} after {} tokens",
            self.line,
            self.stats.tokens_emitted
        );
    }
}
