//! Speculative preload scanning.
//!
//! While the parser is blocked on a script, bytes keep arriving that the tree
//! builder cannot touch yet. The preload scanner tokenizes a private copy of
//! that tail and starts fetches for resources it finds, so they are likely
//! cached by the time the parser reaches them.
//!
//! A scanner is only valid when created from a tokenizer in its initial state:
//! it starts its own tokenizer in `Data` and would misread a tail that begins
//! mid-tag.

use crate::contains_ignore_ascii_case;
use crate::html5::script::{Initiator, ResourceLoader};
use crate::html5::shared::{
    AtomId, Attribute, DocumentParseContext, InputStream, Token, attribute_value,
};
use crate::html5::tokenizer::{Html5Tokenizer, TokenizeResult, TokenizerConfig};
use core_types::ResourceKind;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreloadStats {
    pub scans: u64,
    pub tokens_scanned: u64,
    pub requests_issued: u64,
    pub duplicates_skipped: u64,
}

#[derive(Clone, Copy, Debug)]
struct PreloadAtoms {
    script: AtomId,
    link: AtomId,
    img: AtomId,
    src: AtomId,
    href: AtomId,
    rel: AtomId,
}

pub struct PreloadScanner {
    ctx: DocumentParseContext,
    input: InputStream,
    tokenizer: Html5Tokenizer,
    atoms: PreloadAtoms,
    requested: HashSet<String>,
    stats: PreloadStats,
}

impl PreloadScanner {
    pub fn new() -> Self {
        let mut ctx = DocumentParseContext::new();
        let atoms = PreloadAtoms {
            script: ctx.atoms.intern_ascii_folded("script"),
            link: ctx.atoms.intern_ascii_folded("link"),
            img: ctx.atoms.intern_ascii_folded("img"),
            src: ctx.atoms.intern_ascii_folded("src"),
            href: ctx.atoms.intern_ascii_folded("href"),
            rel: ctx.atoms.intern_ascii_folded("rel"),
        };
        let tokenizer = Html5Tokenizer::new(TokenizerConfig {
            emit_eof: false,
            ..TokenizerConfig::default()
        });
        Self {
            ctx,
            input: InputStream::new(),
            tokenizer,
            atoms,
            requested: HashSet::new(),
            stats: PreloadStats::default(),
        }
    }

    /// Queue more of the document tail for scanning.
    pub fn append_to_end(&mut self, text: &str) {
        self.input.append_to_end(text);
    }

    /// Tokenize everything queued and request newly found resources.
    ///
    /// Returns the number of requests issued. Scanning the same input twice
    /// issues nothing the second time.
    pub fn scan(&mut self, loader: &mut dyn ResourceLoader) -> usize {
        self.stats.scans = self.stats.scans.saturating_add(1);
        let mut issued = 0;
        while let TokenizeResult::Token(token) =
            self.tokenizer.next_token(&mut self.input, &mut self.ctx)
        {
            self.stats.tokens_scanned = self.stats.tokens_scanned.saturating_add(1);
            let Token::StartTag { name, attrs, .. } = token else {
                continue;
            };
            let Some((url, kind)) = self.resource_for(name, &attrs) else {
                continue;
            };
            if !self.requested.insert(url.to_string()) {
                self.stats.duplicates_skipped = self.stats.duplicates_skipped.saturating_add(1);
                continue;
            }
            let id = loader.request(url, kind, Initiator::PreloadScanner);
            log::debug!(target: "html5.preload", "preload {} {url:?} as {id:?}", kind.as_str());
            issued += 1;
        }
        self.stats.requests_issued = self.stats.requests_issued.saturating_add(issued as u64);
        issued
    }

    pub fn stats(&self) -> PreloadStats {
        self.stats
    }

    fn resource_for<'a>(
        &self,
        name: AtomId,
        attrs: &'a [Attribute],
    ) -> Option<(&'a str, ResourceKind)> {
        let (url, kind) = if name == self.atoms.script {
            (attribute_value(attrs, self.atoms.src)?, ResourceKind::Script)
        } else if name == self.atoms.img {
            (attribute_value(attrs, self.atoms.src)?, ResourceKind::Image)
        } else if name == self.atoms.link {
            let rel = attribute_value(attrs, self.atoms.rel)?;
            if !contains_ignore_ascii_case(rel, b"stylesheet") {
                return None;
            }
            (attribute_value(attrs, self.atoms.href)?, ResourceKind::Stylesheet)
        } else {
            return None;
        };
        let url = url.trim();
        (!url.is_empty()).then_some((url, kind))
    }
}

impl Default for PreloadScanner {
    fn default() -> Self {
        Self::new()
    }
}
