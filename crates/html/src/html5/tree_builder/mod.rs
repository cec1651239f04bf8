//! HTML5 tree builder public API.
//!
//! Consumes HTML5 tokens and emits DOM mutation patches. Tree construction is
//! a plain open-elements model: elements nest under the current open element,
//! void and self-closing elements never open, and an end tag closes the nearest
//! open element with the same name (unmatched end tags are ignored).
//!
//! Pause contract:
//! - A `</script>` closing a script element pauses the builder and captures a
//!   `PendingScript` (scripting-enabled documents only; fragments never pause).
//! - While paused, feeding a token is a contract violation.
//! - `take_script_to_process` hands the captured script out exactly once; the
//!   owner then decides via `set_paused` whether construction may continue.

use crate::contains_ignore_ascii_case;
use crate::dom_patch::{DomPatch, PatchKey};
use crate::html5::shared::{
    AtomId, Attribute, DocumentParseContext, ParseErrorCode, Token, attribute_value,
};
use stack::{OpenElement, OpenElementsStack};
use std::sync::Arc;

mod emit;
mod stack;

#[derive(Clone, Debug)]
pub struct TreeBuilderConfig {
    /// Pause for scripts. Disabled documents insert script elements inertly.
    pub scripting_enabled: bool,
    /// Fragment parsing: never pause, never request stylesheets.
    pub fragment: bool,
    /// Merge adjacent text under the same parent into one text node.
    pub coalesce_text: bool,
}

impl Default for TreeBuilderConfig {
    fn default() -> Self {
        Self {
            scripting_enabled: true,
            fragment: false,
            coalesce_text: true,
        }
    }
}

/// Tree builder step result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeBuilderStepResult {
    Continue,
    Suspend(SuspendReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspendReason {
    Script,
}

/// Patch sink for streaming emission.
pub trait PatchSink {
    fn push(&mut self, patch: DomPatch);

    fn push_many(&mut self, patches: &mut Vec<DomPatch>) {
        for patch in patches.drain(..) {
            self.push(patch);
        }
    }
}

/// Patch sink that buffers into a Vec.
pub struct VecPatchSink<'a>(pub &'a mut Vec<DomPatch>);

impl<'a> PatchSink for VecPatchSink<'a> {
    fn push(&mut self, patch: DomPatch) {
        self.0.push(patch);
    }
}

/// A closed `<script>` element as seen by the script runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptElement {
    pub key: PatchKey,
    pub src: Option<String>,
    pub script_type: Option<String>,
    /// Inline source text.
    pub text: String,
    pub is_async: bool,
    pub is_defer: bool,
}

impl ScriptElement {
    pub fn is_external(&self) -> bool {
        self.src.is_some()
    }
}

/// Script captured when the builder paused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingScript {
    pub element: ScriptElement,
    /// Line of the script start tag.
    pub line: u32,
}

/// `<link rel=stylesheet>` seen during construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylesheetRequest {
    pub key: PatchKey,
    pub href: String,
}

/// What the builder reports from `finished()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeBuilderSummary {
    pub document: PatchKey,
    pub nodes_created: u32,
    pub max_depth: u32,
    pub scripts_captured: u32,
}

#[derive(Clone, Copy, Debug)]
struct KnownAtoms {
    script: AtomId,
    link: AtomId,
    rel: AtomId,
    href: AtomId,
    src: AtomId,
    type_: AtomId,
    async_: AtomId,
    defer: AtomId,
}

impl KnownAtoms {
    fn new(ctx: &mut DocumentParseContext) -> Self {
        let atoms = &mut ctx.atoms;
        Self {
            script: atoms.intern_ascii_folded("script"),
            link: atoms.intern_ascii_folded("link"),
            rel: atoms.intern_ascii_folded("rel"),
            href: atoms.intern_ascii_folded("href"),
            src: atoms.intern_ascii_folded("src"),
            type_: atoms.intern_ascii_folded("type"),
            async_: atoms.intern_ascii_folded("async"),
            defer: atoms.intern_ascii_folded("defer"),
        }
    }
}

/// Script element that is open and collecting its text.
#[derive(Debug)]
struct ScriptCapture {
    element: ScriptElement,
    line: u32,
}

/// Last text node inserted, for coalescing.
#[derive(Debug)]
struct TextRun {
    parent: PatchKey,
    key: PatchKey,
    text: String,
}

/// HTML5 tree builder.
pub struct Html5TreeBuilder {
    config: TreeBuilderConfig,
    atoms: KnownAtoms,
    next_key: u32,
    document: Option<PatchKey>,
    open: OpenElementsStack,
    script: Option<ScriptCapture>,
    paused: bool,
    pending_script: Option<PendingScript>,
    stylesheet_requests: Vec<StylesheetRequest>,
    last_text: Option<TextRun>,
    nodes_created: u32,
    scripts_captured: u32,
    finished: bool,
}

impl Html5TreeBuilder {
    pub fn new(config: TreeBuilderConfig, ctx: &mut DocumentParseContext) -> Self {
        Self {
            config,
            atoms: KnownAtoms::new(ctx),
            next_key: 0,
            document: None,
            open: OpenElementsStack::default(),
            script: None,
            paused: false,
            pending_script: None,
            stylesheet_requests: Vec::new(),
            last_text: None,
            nodes_created: 0,
            scripts_captured: 0,
            finished: false,
        }
    }

    /// Apply one token; `line` is the tokenizer line after the token.
    pub fn construct_tree_from_token(
        &mut self,
        token: Token,
        line: u32,
        ctx: &mut DocumentParseContext,
        sink: &mut dyn PatchSink,
    ) -> TreeBuilderStepResult {
        assert!(
            !self.paused,
            "Html5TreeBuilder::construct_tree_from_token called while paused; no token may be fed until set_paused(false)"
        );
        assert!(
            !self.finished,
            "Html5TreeBuilder::construct_tree_from_token called after finished()"
        );
        match token {
            Token::Doctype { name } => {
                if self.document.is_none() {
                    let doctype = name.map(|id| resolve_name(ctx, id).to_string());
                    self.ensure_document(doctype, sink);
                }
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => self.insert_element(name, attrs, self_closing, line, ctx, sink),
            Token::EndTag { name } => return self.close_element(name, line, ctx),
            Token::Text { text } => self.insert_text(text, sink),
            Token::Comment { text } => {
                let parent = self.insertion_parent(sink);
                let key = self.alloc_key();
                self.last_text = None;
                self.create_and_append(parent, DomPatch::CreateComment { key, text }, key, sink);
            }
            Token::Eof => {}
        }
        TreeBuilderStepResult::Continue
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Resume (`false`) or keep waiting (`true`) after the captured script was
    /// handed out.
    pub fn set_paused(&mut self, paused: bool) {
        if !paused {
            assert!(
                self.pending_script.is_none(),
                "Html5TreeBuilder::set_paused(false) with a captured script that was never taken"
            );
        }
        if self.paused != paused {
            log::debug!(target: "html5.tree_builder", "paused: {} -> {}", self.paused, paused);
        }
        self.paused = paused;
    }

    /// Hand out the script captured by the current pause.
    pub fn take_script_to_process(&mut self) -> PendingScript {
        assert!(
            self.paused,
            "Html5TreeBuilder::take_script_to_process called while not paused"
        );
        match self.pending_script.take() {
            Some(script) => script,
            None => panic!(
                "Html5TreeBuilder::take_script_to_process called twice for the same pause"
            ),
        }
    }

    /// Drain stylesheet links seen since the last call.
    pub fn take_stylesheet_requests(&mut self) -> Vec<StylesheetRequest> {
        std::mem::take(&mut self.stylesheet_requests)
    }

    /// Close every open element and report the finished tree.
    pub fn finished(&mut self, sink: &mut dyn PatchSink) -> TreeBuilderSummary {
        assert!(!self.finished, "Html5TreeBuilder::finished called twice");
        assert!(
            !self.paused,
            "Html5TreeBuilder::finished called while paused for a script"
        );
        let document = self.ensure_document(None, sink);
        self.open.clear();
        self.script = None;
        self.last_text = None;
        self.finished = true;
        let summary = TreeBuilderSummary {
            document,
            nodes_created: self.nodes_created,
            max_depth: self.open.max_depth(),
            scripts_captured: self.scripts_captured,
        };
        log::debug!(target: "html5.tree_builder", "finished: {summary:?}");
        summary
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn open_element_count(&self) -> usize {
        self.open.len()
    }

    fn insert_element(
        &mut self,
        name: AtomId,
        attrs: Vec<Attribute>,
        self_closing: bool,
        line: u32,
        ctx: &mut DocumentParseContext,
        sink: &mut dyn PatchSink,
    ) {
        let parent = self.insertion_parent(sink);
        let key = self.alloc_key();
        let tag_name = resolve_name(ctx, name);
        let attributes = attrs
            .iter()
            .map(|attr| (resolve_name(ctx, attr.name), attr.value.clone()))
            .collect();
        let opens = !self_closing && !is_void_element(&tag_name);
        self.last_text = None;
        self.create_and_append(
            parent,
            DomPatch::CreateElement {
                key,
                name: tag_name,
                attributes,
            },
            key,
            sink,
        );

        if name == self.atoms.link && !self.config.fragment {
            self.note_stylesheet_link(key, &attrs);
        }
        if !opens {
            return;
        }
        self.open.push(OpenElement::new(key, name));
        if name == self.atoms.script {
            let owned = |attr| attribute_value(&attrs, attr).map(str::to_string);
            self.script = Some(ScriptCapture {
                element: ScriptElement {
                    key,
                    src: owned(self.atoms.src),
                    script_type: owned(self.atoms.type_),
                    text: String::new(),
                    is_async: attribute_value(&attrs, self.atoms.async_).is_some(),
                    is_defer: attribute_value(&attrs, self.atoms.defer).is_some(),
                },
                line,
            });
        }
    }

    fn note_stylesheet_link(&mut self, key: PatchKey, attrs: &[Attribute]) {
        let rel = attribute_value(attrs, self.atoms.rel).unwrap_or("");
        let href = attribute_value(attrs, self.atoms.href).unwrap_or("").trim();
        if href.is_empty() || !contains_ignore_ascii_case(rel, b"stylesheet") {
            return;
        }
        self.stylesheet_requests.push(StylesheetRequest {
            key,
            href: href.to_string(),
        });
    }

    fn close_element(
        &mut self,
        name: AtomId,
        line: u32,
        ctx: &mut DocumentParseContext,
    ) -> TreeBuilderStepResult {
        let closes_script = name == self.atoms.script
            && matches!(
                (&self.script, self.open.current()),
                (Some(capture), Some(current)) if capture.element.key == current.key()
            );
        if closes_script {
            self.open.pop();
            self.last_text = None;
            let Some(capture) = self.script.take() else {
                return TreeBuilderStepResult::Continue;
            };
            if !self.config.scripting_enabled || self.config.fragment {
                return TreeBuilderStepResult::Continue;
            }
            self.scripts_captured = self.scripts_captured.saturating_add(1);
            self.pending_script = Some(PendingScript {
                element: capture.element,
                line: capture.line,
            });
            self.paused = true;
            log::debug!(
                target: "html5.tree_builder",
                "pause for script started at line {} (closed at line {line})",
                capture.line
            );
            return TreeBuilderStepResult::Suspend(SuspendReason::Script);
        }

        if self.open.pop_until_including(name).is_none() {
            ctx.record_error(ParseErrorCode::UnexpectedEndTag, line);
            return TreeBuilderStepResult::Continue;
        }
        self.last_text = None;
        if let Some(capture) = &self.script
            && !self.open.contains_key(capture.element.key)
        {
            self.script = None;
        }
        TreeBuilderStepResult::Continue
    }

    fn insert_text(&mut self, text: String, sink: &mut dyn PatchSink) {
        if text.is_empty() {
            return;
        }
        if let (Some(capture), Some(current)) = (&mut self.script, self.open.current())
            && capture.element.key == current.key()
        {
            capture.element.text.push_str(&text);
        }

        let parent = self.insertion_parent(sink);
        if self.config.coalesce_text
            && let Some(run) = &mut self.last_text
            && run.parent == parent
        {
            run.text.push_str(&text);
            sink.push(DomPatch::SetText {
                key: run.key,
                text: run.text.clone(),
            });
            return;
        }

        let key = self.alloc_key();
        if self.config.coalesce_text {
            self.last_text = Some(TextRun {
                parent,
                key,
                text: text.clone(),
            });
        }
        self.create_and_append(parent, DomPatch::CreateText { key, text }, key, sink);
    }
}

fn resolve_name(ctx: &DocumentParseContext, id: AtomId) -> Arc<str> {
    ctx.atoms
        .resolve_arc(id)
        .unwrap_or_else(|| panic!("atom {id:?} missing from the document atom table"))
}

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests;
