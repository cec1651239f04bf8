use super::{Html5TreeBuilder, TreeBuilderConfig, TreeBuilderStepResult, VecPatchSink};
use crate::dom_patch::{DomPatch, PatchKey};
use crate::html5::shared::{DocumentParseContext, InputStream, ParseErrorCode, Token};
use crate::html5::tokenizer::{Html5Tokenizer, TokenizeResult, TokenizerConfig};
use std::sync::Arc;

struct Harness {
    ctx: DocumentParseContext,
    input: InputStream,
    tokenizer: Html5Tokenizer,
    builder: Html5TreeBuilder,
    patches: Vec<DomPatch>,
}

impl Harness {
    fn new(config: TreeBuilderConfig) -> Self {
        let mut ctx = DocumentParseContext::new();
        let builder = Html5TreeBuilder::new(config, &mut ctx);
        Self {
            ctx,
            input: InputStream::new(),
            tokenizer: Html5Tokenizer::new(TokenizerConfig::default()),
            builder,
            patches: Vec::new(),
        }
    }

    /// Feed tokens until the builder pauses or input runs dry; true if paused.
    fn pump(&mut self) -> bool {
        while !self.builder.is_paused() {
            let TokenizeResult::Token(token) =
                self.tokenizer.next_token(&mut self.input, &mut self.ctx)
            else {
                return false;
            };
            let line = self.tokenizer.line_number();
            let mut sink = VecPatchSink(&mut self.patches);
            self.builder
                .construct_tree_from_token(token, line, &mut self.ctx, &mut sink);
        }
        true
    }

    fn run(config: TreeBuilderConfig, html: &str) -> Self {
        let mut harness = Self::new(config);
        harness.input.append_to_end(html);
        harness.input.close();
        assert!(!harness.pump(), "document unexpectedly paused");
        harness
    }
}

fn element(key: u32, name: &str) -> DomPatch {
    DomPatch::CreateElement {
        key: PatchKey(key),
        name: Arc::from(name),
        attributes: Vec::new(),
    }
}

fn append(parent: u32, child: u32) -> DomPatch {
    DomPatch::AppendChild {
        parent: PatchKey(parent),
        child: PatchKey(child),
    }
}

#[test]
fn emits_document_elements_and_text_with_sequential_keys() {
    let harness = Harness::run(TreeBuilderConfig::default(), "<div>hi</div><!--c-->");
    assert_eq!(
        harness.patches,
        vec![
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: None
            },
            element(2, "div"),
            append(1, 2),
            DomPatch::CreateText {
                key: PatchKey(3),
                text: "hi".to_string()
            },
            append(2, 3),
            DomPatch::CreateComment {
                key: PatchKey(4),
                text: "c".to_string()
            },
            append(1, 4),
        ]
    );
}

#[test]
fn doctype_names_the_document() {
    let harness = Harness::run(TreeBuilderConfig::default(), "<!DOCTYPE html><p>");
    assert_eq!(
        harness.patches[0],
        DomPatch::CreateDocument {
            key: PatchKey(1),
            doctype: Some("html".to_string())
        }
    );
}

#[test]
fn void_and_self_closing_elements_never_open() {
    let harness = Harness::run(TreeBuilderConfig::default(), "<br>a<x/>b<img src=i>");
    assert_eq!(harness.builder.open_element_count(), 0);
    let appends: Vec<&DomPatch> = harness
        .patches
        .iter()
        .filter(|patch| matches!(patch, DomPatch::AppendChild { .. }))
        .collect();
    assert!(
        appends
            .iter()
            .all(|patch| matches!(patch, DomPatch::AppendChild { parent, .. } if *parent == PatchKey(1))),
        "everything must hang off the document: {appends:?}"
    );
}

#[test]
fn unmatched_end_tag_is_ignored_and_recorded() {
    let harness = Harness::run(TreeBuilderConfig::default(), "<div></span>x</div>");
    assert!(
        harness
            .ctx
            .errors
            .iter()
            .any(|err| err.code == ParseErrorCode::UnexpectedEndTag)
    );
    assert!(harness.patches.contains(&append(2, 3)), "text stays inside div");
}

#[test]
fn adjacent_text_is_coalesced_into_one_node() {
    let harness = Harness::run(TreeBuilderConfig::default(), "a</>b");
    assert_eq!(
        &harness.patches[1..],
        &[
            DomPatch::CreateText {
                key: PatchKey(2),
                text: "a".to_string()
            },
            append(1, 2),
            DomPatch::SetText {
                key: PatchKey(2),
                text: "ab".to_string()
            },
        ]
    );

    let plain = Harness::run(
        TreeBuilderConfig {
            coalesce_text: false,
            ..TreeBuilderConfig::default()
        },
        "a</>b",
    );
    assert_eq!(
        plain
            .patches
            .iter()
            .filter(|patch| matches!(patch, DomPatch::CreateText { .. }))
            .count(),
        2
    );
}

#[test]
fn script_end_tag_pauses_and_captures_script_once() {
    let mut harness = Harness::new(TreeBuilderConfig::default());
    harness
        .input
        .append_to_end("<p>\n<script type=module>go()</script>after");
    assert!(harness.pump(), "closing script must pause");
    assert!(harness.builder.is_paused());
    assert_eq!(harness.input.current(), "after");

    let script = harness.builder.take_script_to_process();
    assert_eq!(script.element.text, "go()");
    assert_eq!(script.element.script_type.as_deref(), Some("module"));
    assert!(!script.element.is_external());
    assert_eq!(script.line, 2);

    harness.builder.set_paused(false);
    assert!(!harness.pump());
    assert_eq!(harness.builder.finished(&mut VecPatchSink(&mut harness.patches)).scripts_captured, 1);
}

#[test]
fn external_script_attributes_are_captured() {
    let mut harness = Harness::new(TreeBuilderConfig::default());
    harness
        .input
        .append_to_end("<script src='a.js' defer></script>");
    assert!(harness.pump());
    let script = harness.builder.take_script_to_process();
    assert_eq!(script.element.src.as_deref(), Some("a.js"));
    assert!(script.element.is_defer);
    assert!(!script.element.is_async);
}

#[test]
fn scripting_disabled_and_fragments_never_pause() {
    for config in [
        TreeBuilderConfig {
            scripting_enabled: false,
            ..TreeBuilderConfig::default()
        },
        TreeBuilderConfig {
            fragment: true,
            ..TreeBuilderConfig::default()
        },
    ] {
        let mut harness = Harness::run(config, "<script>x()</script><b>");
        let summary = harness
            .builder
            .finished(&mut VecPatchSink(&mut harness.patches));
        assert_eq!(summary.scripts_captured, 0);
    }
}

#[test]
fn stylesheet_links_are_recorded() {
    let mut harness = Harness::run(
        TreeBuilderConfig::default(),
        "<link rel=\"alternate StyleSheet\" href=' s.css '><link rel=icon href=i.png><link rel=stylesheet>",
    );
    let requests = harness.builder.take_stylesheet_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].href, "s.css");
    assert!(harness.builder.take_stylesheet_requests().is_empty());
}

#[test]
fn finished_creates_empty_document_and_reports_summary() {
    let mut ctx = DocumentParseContext::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default(), &mut ctx);
    let mut patches = Vec::new();
    let result = builder.construct_tree_from_token(
        Token::Eof,
        1,
        &mut ctx,
        &mut VecPatchSink(&mut patches),
    );
    assert_eq!(result, TreeBuilderStepResult::Continue);
    let summary = builder.finished(&mut VecPatchSink(&mut patches));
    assert_eq!(summary.document, PatchKey(1));
    assert_eq!(summary.nodes_created, 1);
    assert!(builder.is_finished());
    assert_eq!(
        patches,
        vec![DomPatch::CreateDocument {
            key: PatchKey(1),
            doctype: None
        }]
    );
}

#[test]
#[should_panic(expected = "called while paused")]
fn feeding_a_token_while_paused_panics() {
    let mut harness = Harness::new(TreeBuilderConfig::default());
    harness.input.append_to_end("<script></script>");
    assert!(harness.pump());
    let mut sink = VecPatchSink(&mut harness.patches);
    harness
        .builder
        .construct_tree_from_token(Token::Eof, 1, &mut harness.ctx, &mut sink);
}

#[test]
#[should_panic(expected = "called twice for the same pause")]
fn taking_the_script_twice_panics() {
    let mut harness = Harness::new(TreeBuilderConfig::default());
    harness.input.append_to_end("<script></script>");
    assert!(harness.pump());
    let _ = harness.builder.take_script_to_process();
    let _ = harness.builder.take_script_to_process();
}

#[test]
#[should_panic(expected = "never taken")]
fn resuming_without_taking_the_script_panics() {
    let mut harness = Harness::new(TreeBuilderConfig::default());
    harness.input.append_to_end("<script></script>");
    assert!(harness.pump());
    harness.builder.set_paused(false);
}

#[test]
#[should_panic(expected = "finished called twice")]
fn finishing_twice_panics() {
    let mut ctx = DocumentParseContext::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default(), &mut ctx);
    let mut patches = Vec::new();
    let _ = builder.finished(&mut VecPatchSink(&mut patches));
    let _ = builder.finished(&mut VecPatchSink(&mut patches));
}
