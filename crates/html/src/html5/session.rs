//! Document parse session: the pump loop and its state machine.
//!
//! `Html5ParseSession` owns the input stream, tokenizer, tree builder, script
//! runner, preload scanner and yield scheduler of one document and drives them
//! from three directions:
//! - the network (`write(.., true)` / `append` / `push_bytes`, then `finish`),
//! - running scripts (`document.write` through a `DocumentWriter`),
//! - the host loop (load completions and resume tasks).
//!
//! Invariants:
//! - No token is requested while the tree builder is paused.
//! - The write nesting level is decremented on every exit path.
//! - The end of the document is delayed while a write is in progress, a script
//!   is awaited or running, or a resume is scheduled.
//! - A preload scanner only exists while paused and is only created from a
//!   tokenizer in its initial state.
//! - At most one pump is active at any time.
//!
//! Scripts only ever run while the tree builder is paused, so a reentrant
//! write from a script buffers its text and never starts a pump of its own;
//! the interrupted pump (or the resume after a load) consumes it.
//!
//! Completion is an event, not teardown: `end()` records a `ParseCompletion`
//! which the owner collects with `take_completion` before dropping the session.

use crate::dom_patch::DomPatch;
use crate::html5::observer::{NoopObserver, ParserObserver};
use crate::html5::preload::PreloadScanner;
use crate::html5::scheduler::{
    HostScheduler, ParserScheduler, PumpSession, SchedulerConfig, SynchronousMode,
};
use crate::html5::script::{
    AllowAllScripts, DocumentWriteEngine, DocumentWriter, HtmlScriptRunner, Initiator,
    LoadedResource, ResourceLoader, ScriptContext, ScriptEngine, ScriptLoadPolicy, ScriptRunner,
    ScriptRunnerConfig,
};
use crate::html5::shared::{ByteStreamDecoder, Counters, DocumentParseContext, InputStream};
use crate::html5::tokenizer::{Html5Tokenizer, TokenizeResult, TokenizerConfig};
use crate::html5::tree_builder::{
    Html5TreeBuilder, TreeBuilderConfig, TreeBuilderSummary, VecPatchSink,
};
use core_types::{ResourceId, ResourceKind, TaskId};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

/// Per-document parser configuration.
#[derive(Clone, Debug, Default)]
pub struct ParserConfig {
    pub tokenizer: TokenizerConfig,
    pub tree_builder: TreeBuilderConfig,
    pub scheduler: SchedulerConfig,
    pub script: ScriptRunnerConfig,
}

/// Host-side collaborators of a document parser.
pub struct ParserHost {
    pub loader: Box<dyn ResourceLoader>,
    pub scheduler: Box<dyn HostScheduler>,
    pub engine: Box<dyn ScriptEngine>,
    pub policy: Box<dyn ScriptLoadPolicy>,
    pub observer: Box<dyn ParserObserver>,
}

impl ParserHost {
    /// Host with the `document.write` engine, no script policy and no
    /// instrumentation.
    pub fn new(loader: Box<dyn ResourceLoader>, scheduler: Box<dyn HostScheduler>) -> Self {
        Self {
            loader,
            scheduler,
            engine: Box::new(DocumentWriteEngine),
            policy: Box::new(AllowAllScripts),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn ScriptEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn ScriptLoadPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ParserObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// Emitted once when the document is completely parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCompletion {
    pub tree: TreeBuilderSummary,
    pub tokens: u64,
    pub lines: u32,
    pub parse_errors: u64,
    /// The parse was stopped before the input was consumed.
    pub stopped: bool,
}

/// Scoped `write()` nesting level; decremented when dropped.
struct NestingLevelGuard {
    level: Rc<Cell<u32>>,
}

impl NestingLevelGuard {
    fn enter(level: &Rc<Cell<u32>>) -> Self {
        level.set(level.get() + 1);
        Self {
            level: Rc::clone(level),
        }
    }
}

impl Drop for NestingLevelGuard {
    fn drop(&mut self) {
        self.level.set(self.level.get() - 1);
    }
}

/// Loader for fragments, which never fetch.
struct NullLoader;

impl ResourceLoader for NullLoader {
    fn request(&mut self, url: &str, _kind: ResourceKind, _initiator: Initiator) -> ResourceId {
        log::debug!(target: "html5.session", "fragment parser ignores request for {url:?}");
        ResourceId(0)
    }

    fn watch_for_load(&mut self, _id: ResourceId) {}

    fn stop_watching_for_load(&mut self, _id: ResourceId) {}
}

/// Parser state a running script may reach through `DocumentWriter`.
struct ParserCore {
    ctx: DocumentParseContext,
    decoder: ByteStreamDecoder,
    input: InputStream,
    tokenizer: Html5Tokenizer,
    tree_builder: Html5TreeBuilder,
    preload_scanner: Option<PreloadScanner>,
    write_nesting: Rc<Cell<u32>>,
    stopped: bool,
    end_was_delayed: bool,
}

impl ParserCore {
    fn append_network(&mut self, text: &str) {
        self.input.append_to_end(text);
        if let Some(scanner) = &mut self.preload_scanner {
            scanner.append_to_end(text);
        }
    }
}

impl DocumentWriter for ParserCore {
    fn write(&mut self, source: &str) {
        if self.stopped {
            return;
        }
        let _nesting = NestingLevelGuard::enter(&self.write_nesting);
        debug_assert!(
            self.tree_builder.is_paused(),
            "scripts run only while the tree builder is paused"
        );
        self.input.insert_at_current_insertion_point(source);
    }

    fn write_from_network(&mut self, chunk: &str) {
        if self.stopped {
            return;
        }
        let _nesting = NestingLevelGuard::enter(&self.write_nesting);
        self.append_network(chunk);
        log::debug!(
            target: "html5.session",
            "network write nested at level {}; buffered for the outer pump",
            self.write_nesting.get()
        );
    }

    fn finish(&mut self) {
        self.input.close();
        self.end_was_delayed = true;
    }
}

/// Runtime-facing parser for one document.
pub struct Html5ParseSession {
    core: ParserCore,
    loader: Box<dyn ResourceLoader>,
    policy: Box<dyn ScriptLoadPolicy>,
    observer: Box<dyn ParserObserver>,
    script_runner: Option<Box<dyn ScriptRunner>>,
    scheduler: Option<ParserScheduler>,
    pending_stylesheets: HashSet<ResourceId>,
    patches: Vec<DomPatch>,
    active_pumps: u32,
    completion: Option<ParseCompletion>,
    finished: bool,
}

impl Html5ParseSession {
    /// Parser for a whole document.
    pub fn new(config: ParserConfig, host: ParserHost) -> Self {
        let ParserConfig {
            tokenizer,
            mut tree_builder,
            scheduler,
            script,
        } = config;
        tree_builder.scripting_enabled &= script.scripting_enabled;
        let script_runner: Option<Box<dyn ScriptRunner>> = script
            .scripting_enabled
            .then(|| Box::new(HtmlScriptRunner::new(host.engine)) as Box<dyn ScriptRunner>);
        Self::assemble(
            tokenizer,
            tree_builder,
            host.loader,
            host.policy,
            host.observer,
            script_runner,
            Some(ParserScheduler::new(scheduler, host.scheduler)),
        )
    }

    /// Parser for a fragment: no scripts, no loads, every pump synchronous.
    pub fn new_fragment(config: ParserConfig) -> Self {
        let ParserConfig {
            tokenizer,
            mut tree_builder,
            ..
        } = config;
        tree_builder.fragment = true;
        Self::assemble(
            tokenizer,
            tree_builder,
            Box::new(NullLoader),
            Box::new(AllowAllScripts),
            Box::new(NoopObserver),
            None,
            None,
        )
    }

    /// Replace the script runner (custom runners and tests).
    pub fn with_script_runner(mut self, runner: Box<dyn ScriptRunner>) -> Self {
        self.script_runner = Some(runner);
        self
    }

    fn assemble(
        tokenizer_config: TokenizerConfig,
        tree_builder_config: TreeBuilderConfig,
        loader: Box<dyn ResourceLoader>,
        policy: Box<dyn ScriptLoadPolicy>,
        observer: Box<dyn ParserObserver>,
        script_runner: Option<Box<dyn ScriptRunner>>,
        scheduler: Option<ParserScheduler>,
    ) -> Self {
        let mut ctx = DocumentParseContext::new();
        let tree_builder = Html5TreeBuilder::new(tree_builder_config, &mut ctx);
        Self {
            core: ParserCore {
                ctx,
                decoder: ByteStreamDecoder::new(),
                input: InputStream::new(),
                tokenizer: Html5Tokenizer::new(tokenizer_config),
                tree_builder,
                preload_scanner: None,
                write_nesting: Rc::new(Cell::new(0)),
                stopped: false,
                end_was_delayed: false,
            },
            loader,
            policy,
            observer,
            script_runner,
            scheduler,
            pending_stylesheets: HashSet::new(),
            patches: Vec::new(),
            active_pumps: 0,
            completion: None,
            finished: false,
        }
    }

    /// Feed text from the network (`is_from_network`) or from `document.write`.
    ///
    /// Network text always lands at the end of the input; only the outermost
    /// write pumps. `document.write` text lands at the insertion point and is
    /// parsed synchronously.
    pub fn write(&mut self, source: &str, is_from_network: bool) {
        self.assert_not_finished("write");
        if self.core.stopped {
            return;
        }
        let _nesting = NestingLevelGuard::enter(&self.core.write_nesting);

        let mode = if is_from_network {
            self.core.append_network(source);
            if self.core.write_nesting.get() > 1 {
                return;
            }
            SynchronousMode::AllowYield
        } else {
            self.core.input.insert_at_current_insertion_point(source);
            SynchronousMode::ForceSynchronous
        };

        self.pump_tokenizer_if_possible(mode);
        self.end_if_delayed();
    }

    /// Network path.
    pub fn append(&mut self, source: &str) {
        self.write(source, true);
    }

    /// `document.write` path.
    pub fn insert(&mut self, source: &str) {
        self.write(source, false);
    }

    /// Decode a network byte chunk and append it. Sequences split across chunks
    /// are completed by the next call.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.assert_not_finished("push_bytes");
        let text = self.core.decoder.decode(bytes);
        if !text.is_empty() {
            self.append(&text);
        }
    }

    /// End of body: close the input and end the document once nothing blocks.
    pub fn finish(&mut self) {
        self.assert_not_finished("finish");
        assert!(
            !self.core.input.is_closed(),
            "Html5ParseSession::finish called twice"
        );
        let tail = self.core.decoder.finish();
        if !tail.is_empty() && !self.core.stopped {
            self.core.append_network(&tail);
        }
        self.core.input.close();
        self.attempt_to_end();
    }

    /// Halt parsing for good. Cancels a scheduled resume and drops any awaited
    /// script. The completion follows at once if the body already ended,
    /// otherwise from the later `finish`.
    pub fn stop_parsing(&mut self) {
        if self.core.stopped || self.finished {
            return;
        }
        self.core.stopped = true;
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.stop();
        }
        if let Some(runner) = &mut self.script_runner {
            runner.detach(self.loader.as_mut());
        }
        if self.core.tree_builder.is_paused() {
            self.core.tree_builder.set_paused(false);
        }
        self.core.preload_scanner = None;
        self.pending_stylesheets.clear();
        log::debug!(
            target: "html5.session",
            "parsing stopped at line {}",
            self.core.tokenizer.line_number()
        );
        // Nothing can block a stopped parser; a delayed end happens now.
        if self.core.end_was_delayed {
            self.core.end_was_delayed = false;
            self.end();
        }
    }

    /// A resource requested by this parser finished loading.
    ///
    /// Notifications nobody is waiting for (cache hits, preloads, duplicate
    /// deliveries) are ignored.
    pub fn notify_finished(&mut self, resource: LoadedResource) {
        self.assert_not_finished("notify_finished");
        match resource.kind {
            ResourceKind::Stylesheet => {
                if !self.pending_stylesheets.remove(&resource.id) {
                    log::debug!(target: "html5.session", "ignoring stylesheet {:?}", resource.id);
                    return;
                }
                if self.pending_stylesheets.is_empty() {
                    self.execute_scripts_waiting_for_stylesheets();
                }
            }
            ResourceKind::Script => self.notify_script_finished(&resource),
            ResourceKind::Html | ResourceKind::Image => {
                log::debug!(
                    target: "html5.session",
                    "ignoring {} load {:?}",
                    resource.kind.as_str(),
                    resource.id
                );
            }
        }
    }

    fn notify_script_finished(&mut self, resource: &LoadedResource) {
        if self.core.stopped {
            return;
        }
        let Some(runner) = self.script_runner.as_mut() else {
            return;
        };
        if !runner.has_scripts_waiting_for_load() {
            log::debug!(
                target: "html5.session",
                "ignoring script load {:?}; no script is waiting for it",
                resource.id
            );
            return;
        }
        assert!(
            !runner.in_script_execution(),
            "script load delivered during script execution"
        );
        assert!(
            self.core.tree_builder.is_paused(),
            "a script is awaited but the tree builder is not paused"
        );
        let mut cx = ScriptContext {
            loader: self.loader.as_mut(),
            policy: self.policy.as_ref(),
            pending_stylesheets: self.pending_stylesheets.len(),
            writer: &mut self.core,
        };
        let should_continue = runner.execute_scripts_waiting_for_load(resource, &mut cx);
        self.core.tree_builder.set_paused(!should_continue);
        if should_continue {
            self.resume_parsing_after_script_execution();
        }
    }

    /// Run a script that was waiting for stylesheets, if there is one and no
    /// stylesheet is pending any more.
    pub fn execute_scripts_waiting_for_stylesheets(&mut self) {
        self.assert_not_finished("execute_scripts_waiting_for_stylesheets");
        if self.core.stopped || !self.pending_stylesheets.is_empty() {
            return;
        }
        let Some(runner) = self.script_runner.as_mut() else {
            return;
        };
        if !runner.has_scripts_waiting_for_stylesheets() {
            return;
        }
        assert!(
            !runner.in_script_execution(),
            "stylesheet completion delivered during script execution"
        );
        assert!(
            self.core.tree_builder.is_paused(),
            "a script waits for stylesheets but the tree builder is not paused"
        );
        let mut cx = ScriptContext {
            loader: self.loader.as_mut(),
            policy: self.policy.as_ref(),
            pending_stylesheets: 0,
            writer: &mut self.core,
        };
        let should_continue = runner.execute_scripts_waiting_for_stylesheets(&mut cx);
        self.core.tree_builder.set_paused(!should_continue);
        if should_continue {
            self.resume_parsing_after_script_execution();
        }
    }

    /// Continue after the awaited script ran.
    pub fn resume_parsing_after_script_execution(&mut self) {
        assert!(
            !self.is_executing_script(),
            "Html5ParseSession::resume_parsing_after_script_execution called during script execution"
        );
        assert!(
            !self.core.tree_builder.is_paused(),
            "Html5ParseSession::resume_parsing_after_script_execution called while paused"
        );
        self.pump_tokenizer_if_possible(SynchronousMode::AllowYield);
        self.end_if_delayed();
    }

    /// The host ran a task posted by this parser's scheduler.
    pub fn resume_parsing_after_yield(&mut self, task: TaskId) {
        self.assert_not_finished("resume_parsing_after_yield");
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };
        if !scheduler.task_fired(task) || self.core.stopped {
            return;
        }
        log::debug!(target: "html5.session", "resume after yield ({task:?})");
        self.pump_tokenizer(SynchronousMode::AllowYield);
        self.end_if_delayed();
    }

    fn pump_tokenizer_if_possible(&mut self, mode: SynchronousMode) {
        if self.core.stopped || self.core.tree_builder.is_paused() {
            return;
        }
        if self.is_scheduled_for_resume() {
            // The armed task decides when the next pump happens.
            log::trace!(target: "html5.session", "pump skipped; resume already scheduled");
            return;
        }
        self.pump_tokenizer(mode);
    }

    fn pump_tokenizer(&mut self, mode: SynchronousMode) {
        assert!(!self.core.stopped, "pump_tokenizer called after stop_parsing");
        assert!(
            !self.core.tree_builder.is_paused(),
            "pump_tokenizer called while the tree builder is paused"
        );
        assert!(
            !self.is_scheduled_for_resume(),
            "pump_tokenizer called while a resume is scheduled"
        );

        self.active_pumps += 1;
        let counters = &mut self.core.ctx.counters;
        counters.pumps = counters.pumps.saturating_add(1);
        counters.max_active_pumps = counters.max_active_pumps.max(u64::from(self.active_pumps));
        assert_eq!(self.active_pumps, 1, "two pumps active at once");

        self.observer
            .will_pump(self.core.input.len(), self.core.tokenizer.line_number());

        let mut session = PumpSession::new();
        loop {
            if self.core.stopped {
                break;
            }
            if mode == SynchronousMode::AllowYield
                && let Some(scheduler) = &mut self.scheduler
                && !scheduler.should_continue_parsing(&mut session)
            {
                let counters = &mut self.core.ctx.counters;
                counters.yields = counters.yields.saturating_add(1);
                break;
            }
            let TokenizeResult::Token(token) = self
                .core
                .tokenizer
                .next_token(&mut self.core.input, &mut self.core.ctx)
            else {
                break;
            };

            let line = self.core.tokenizer.line_number();
            self.core.tree_builder.construct_tree_from_token(
                token,
                line,
                &mut self.core.ctx,
                &mut VecPatchSink(&mut self.patches),
            );
            self.request_stylesheets();

            // The tree builder pauses itself for a script.
            if !self.core.tree_builder.is_paused() {
                continue;
            }
            let should_continue = self.run_scripts_for_paused_tree_builder();
            self.core.tree_builder.set_paused(!should_continue);
            if !should_continue {
                break;
            }
        }

        if self.core.tree_builder.is_paused() {
            assert!(
                self.core.tokenizer.is_in_initial_state(),
                "preload scanning needs the tokenizer in its initial state"
            );
            let input = &self.core.input;
            let scanner = self.core.preload_scanner.get_or_insert_with(|| {
                let mut scanner = PreloadScanner::new();
                scanner.append_to_end(input.current());
                scanner
            });
            scanner.scan(self.loader.as_mut());
        } else {
            self.core.preload_scanner = None;
        }

        self.observer.did_pump(self.core.tokenizer.line_number());
        self.active_pumps -= 1;
    }

    fn run_scripts_for_paused_tree_builder(&mut self) -> bool {
        let script = self.core.tree_builder.take_script_to_process();
        // Fragments have no runner; their scripts never run.
        let Some(runner) = self.script_runner.as_mut() else {
            return true;
        };
        let mut cx = ScriptContext {
            loader: self.loader.as_mut(),
            policy: self.policy.as_ref(),
            pending_stylesheets: self.pending_stylesheets.len(),
            writer: &mut self.core,
        };
        runner.execute(script, &mut cx)
    }

    fn request_stylesheets(&mut self) {
        for request in self.core.tree_builder.take_stylesheet_requests() {
            let id = self
                .loader
                .request(&request.href, ResourceKind::Stylesheet, Initiator::Parser);
            log::debug!(
                target: "html5.session",
                "blocking stylesheet {:?} as {id:?}",
                request.href
            );
            self.pending_stylesheets.insert(id);
        }
    }

    fn attempt_to_end(&mut self) {
        if self.in_write()
            || self.is_waiting_for_scripts()
            || self.is_executing_script()
            || self.is_scheduled_for_resume()
        {
            log::debug!(target: "html5.session", "end delayed");
            self.core.end_was_delayed = true;
            return;
        }
        self.end();
    }

    /// Nesting is not checked: this runs at the tail of `write` itself.
    fn end_if_delayed(&mut self) {
        if !self.core.end_was_delayed
            || self.is_waiting_for_scripts()
            || self.is_executing_script()
            || self.is_scheduled_for_resume()
        {
            return;
        }
        self.core.end_was_delayed = false;
        self.end();
    }

    fn end(&mut self) {
        assert!(
            !self.is_scheduled_for_resume(),
            "Html5ParseSession::end called with a resume scheduled"
        );
        // Only trailing buffered text should be left at this point.
        self.pump_tokenizer_if_possible(SynchronousMode::ForceSynchronous);
        if self.core.tree_builder.is_paused() {
            log::debug!(target: "html5.session", "final pump paused for a script; end delayed");
            self.core.end_was_delayed = true;
            return;
        }

        let tree = self
            .core
            .tree_builder
            .finished(&mut VecPatchSink(&mut self.patches));
        self.core.preload_scanner = None;
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.stop();
        }
        let completion = ParseCompletion {
            tree,
            tokens: self.core.ctx.counters.tokens_emitted,
            lines: self.core.tokenizer.line_number(),
            parse_errors: self.core.ctx.counters.parse_errors,
            stopped: self.core.stopped,
        };
        log::debug!(target: "html5.session", "parse finished: {completion:?}");
        self.completion = Some(completion);
        self.finished = true;
    }

    fn assert_not_finished(&self, op: &str) {
        assert!(
            !self.finished,
            "Html5ParseSession::{op} called after the parse finished"
        );
    }

    /// Collect the completion event; `None` until the document has ended.
    pub fn take_completion(&mut self) -> Option<ParseCompletion> {
        self.completion.take()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stopped
    }

    /// A scheduled resume or a write is in progress.
    pub fn processing_data(&self) -> bool {
        self.is_scheduled_for_resume() || self.in_write()
    }

    pub fn in_write(&self) -> bool {
        self.core.write_nesting.get() > 0
    }

    pub fn is_scheduled_for_resume(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(ParserScheduler::is_scheduled_for_resume)
    }

    pub fn is_waiting_for_scripts(&self) -> bool {
        self.core.tree_builder.is_paused()
    }

    pub fn is_executing_script(&self) -> bool {
        self.script_runner
            .as_ref()
            .is_some_and(|runner| runner.in_script_execution())
    }

    pub fn finish_was_called(&self) -> bool {
        self.core.input.is_closed()
    }

    pub fn has_preload_scanner(&self) -> bool {
        self.core.preload_scanner.is_some()
    }

    pub fn pending_stylesheet_count(&self) -> usize {
        self.pending_stylesheets.len()
    }

    /// Bytes written but not yet tokenized.
    pub fn buffered_len(&self) -> usize {
        self.core.input.len()
    }

    pub fn line_number(&self) -> u32 {
        self.core.tokenizer.line_number()
    }

    pub fn column_number(&self) -> u32 {
        self.core.tokenizer.column_number()
    }

    pub fn counters(&self) -> &Counters {
        &self.core.ctx.counters
    }

    pub fn context(&self) -> &DocumentParseContext {
        &self.core.ctx
    }

    pub fn take_patches(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.patches)
    }
}
