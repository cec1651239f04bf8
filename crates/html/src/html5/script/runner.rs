//! `ScriptRunner` contract and the HTML implementation.

use crate::html5::script::engine::ScriptEngine;
use crate::html5::script::loader::{Initiator, LoadedResource, ResourceLoader, ScriptLoadPolicy};
use crate::html5::script::DocumentWriter;
use crate::html5::tree_builder::PendingScript;
use core_types::{ResourceId, ResourceKind};

#[derive(Clone, Debug)]
pub struct ScriptRunnerConfig {
    /// When false the document runs no scripts at all; the tree builder never
    /// pauses.
    pub scripting_enabled: bool,
}

impl Default for ScriptRunnerConfig {
    fn default() -> Self {
        Self {
            scripting_enabled: true,
        }
    }
}

/// Everything a runner may touch while deciding about a script.
pub struct ScriptContext<'a> {
    pub loader: &'a mut dyn ResourceLoader,
    pub policy: &'a dyn ScriptLoadPolicy,
    /// Parser-blocking stylesheets still loading.
    pub pending_stylesheets: usize,
    pub writer: &'a mut dyn DocumentWriter,
}

/// Executes or parks scripts handed over by a paused tree builder.
///
/// Every method returning `bool` answers "may parsing continue?". At most one
/// script is awaited at a time.
pub trait ScriptRunner {
    fn execute(&mut self, script: PendingScript, cx: &mut ScriptContext<'_>) -> bool;

    fn has_scripts_waiting_for_load(&self) -> bool;

    fn has_scripts_waiting_for_stylesheets(&self) -> bool;

    /// Run the awaited script if `resource` is its source. Any other resource
    /// leaves the runner waiting.
    fn execute_scripts_waiting_for_load(
        &mut self,
        resource: &LoadedResource,
        cx: &mut ScriptContext<'_>,
    ) -> bool;

    fn execute_scripts_waiting_for_stylesheets(&mut self, cx: &mut ScriptContext<'_>) -> bool;

    fn in_script_execution(&self) -> bool;

    /// Drop the awaited script and any load interest (parser stopped).
    fn detach(&mut self, loader: &mut dyn ResourceLoader);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptRunnerStats {
    pub executed: u64,
    pub script_errors: u64,
    pub failed_loads: u64,
    pub blocked_by_policy: u64,
    pub ignored_notifications: u64,
    /// Data blocks such as `type="text/template"`, never run.
    pub skipped_non_script: u64,
}

const JAVASCRIPT_MIME_TYPES: &[&str] = &[
    "application/ecmascript",
    "application/javascript",
    "application/x-ecmascript",
    "application/x-javascript",
    "text/ecmascript",
    "text/javascript",
    "text/javascript1.0",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/javascript1.4",
    "text/javascript1.5",
    "text/jscript",
    "text/livescript",
    "text/x-ecmascript",
    "text/x-javascript",
];

/// Whether a `type` attribute names something the engine should run.
/// Absent or blank types are classic scripts; `module` runs like one.
pub fn is_runnable_script_type(script_type: Option<&str>) -> bool {
    let Some(ty) = script_type.map(str::trim) else {
        return true;
    };
    ty.is_empty()
        || ty.eq_ignore_ascii_case("module")
        || JAVASCRIPT_MIME_TYPES
            .iter()
            .any(|mime| ty.eq_ignore_ascii_case(mime))
}

#[derive(Debug)]
enum Wait {
    Load(ResourceId),
    /// Source is known; waiting for stylesheets to finish.
    Stylesheets(String),
}

#[derive(Debug)]
struct BlockedScript {
    script: PendingScript,
    wait: Wait,
}

/// Classic-script runner: inline scripts run immediately, external scripts
/// block the parser until loaded, and both wait for pending stylesheets.
///
/// `async` and `defer` are treated as parser-blocking. Scripts whose `type`
/// is not JavaScript are skipped without a fetch.
pub struct HtmlScriptRunner {
    engine: Box<dyn ScriptEngine>,
    blocked: Option<BlockedScript>,
    execution_depth: u32,
    stats: ScriptRunnerStats,
}

impl HtmlScriptRunner {
    pub fn new(engine: Box<dyn ScriptEngine>) -> Self {
        Self {
            engine,
            blocked: None,
            execution_depth: 0,
            stats: ScriptRunnerStats::default(),
        }
    }

    pub fn stats(&self) -> ScriptRunnerStats {
        self.stats
    }

    fn run(&mut self, script: &PendingScript, source: &str, cx: &mut ScriptContext<'_>) {
        log::debug!(
            target: "html5.script",
            "execute script {:?} from line {} ({} bytes)",
            script.element.key,
            script.line,
            source.len()
        );
        self.execution_depth += 1;
        let result = self.engine.evaluate(source, &mut *cx.writer);
        self.execution_depth -= 1;
        self.stats.executed = self.stats.executed.saturating_add(1);
        if let Err(err) = result {
            self.stats.script_errors = self.stats.script_errors.saturating_add(1);
            log::debug!(target: "html5.script", "script at line {} failed: {err}", script.line);
        }
    }

    /// Run now, or park until stylesheets are done. Returns "may continue".
    fn run_or_wait_for_stylesheets(
        &mut self,
        script: PendingScript,
        source: String,
        cx: &mut ScriptContext<'_>,
    ) -> bool {
        if cx.pending_stylesheets > 0 {
            log::debug!(
                target: "html5.script",
                "script from line {} waits for {} stylesheet(s)",
                script.line,
                cx.pending_stylesheets
            );
            self.blocked = Some(BlockedScript {
                script,
                wait: Wait::Stylesheets(source),
            });
            return false;
        }
        self.run(&script, &source, cx);
        true
    }
}

impl ScriptRunner for HtmlScriptRunner {
    fn execute(&mut self, script: PendingScript, cx: &mut ScriptContext<'_>) -> bool {
        assert!(
            self.blocked.is_none(),
            "HtmlScriptRunner::execute called while another script blocks the parser"
        );
        if !is_runnable_script_type(script.element.script_type.as_deref()) {
            self.stats.skipped_non_script = self.stats.skipped_non_script.saturating_add(1);
            log::debug!(
                target: "html5.script",
                "script from line {} has type {:?}; not executed",
                script.line,
                script.element.script_type
            );
            return true;
        }
        let Some(src) = script.element.src.as_deref().map(str::trim) else {
            let source = script.element.text.clone();
            return self.run_or_wait_for_stylesheets(script, source, cx);
        };
        if src.is_empty() || !cx.policy.should_load_external_script_from_src(src) {
            self.stats.blocked_by_policy = self.stats.blocked_by_policy.saturating_add(1);
            log::debug!(target: "html5.script", "external script {src:?} not loaded; treated as absent");
            return true;
        }
        let id = cx.loader.request(src, ResourceKind::Script, Initiator::Parser);
        cx.loader.watch_for_load(id);
        log::debug!(target: "html5.script", "parser blocked on {src:?} ({id:?})");
        self.blocked = Some(BlockedScript {
            script,
            wait: Wait::Load(id),
        });
        false
    }

    fn has_scripts_waiting_for_load(&self) -> bool {
        matches!(
            self.blocked,
            Some(BlockedScript {
                wait: Wait::Load(_),
                ..
            })
        )
    }

    fn has_scripts_waiting_for_stylesheets(&self) -> bool {
        matches!(
            self.blocked,
            Some(BlockedScript {
                wait: Wait::Stylesheets(_),
                ..
            })
        )
    }

    fn execute_scripts_waiting_for_load(
        &mut self,
        resource: &LoadedResource,
        cx: &mut ScriptContext<'_>,
    ) -> bool {
        let awaited = match &self.blocked {
            Some(BlockedScript {
                wait: Wait::Load(id),
                ..
            }) => *id == resource.id,
            _ => false,
        };
        if !awaited {
            self.stats.ignored_notifications = self.stats.ignored_notifications.saturating_add(1);
            log::debug!(
                target: "html5.script",
                "ignoring load notification for {:?} ({})",
                resource.id,
                resource.url
            );
            return !self.has_scripts_waiting_for_load() && !self.has_scripts_waiting_for_stylesheets();
        }
        let Some(blocked) = self.blocked.take() else {
            return true;
        };
        cx.loader.stop_watching_for_load(resource.id);
        match &resource.body {
            Ok(source) => self.run_or_wait_for_stylesheets(blocked.script, source.clone(), cx),
            Err(err) => {
                self.stats.failed_loads = self.stats.failed_loads.saturating_add(1);
                log::debug!(
                    target: "html5.script",
                    "script {} failed to load ({err}); continuing without it",
                    resource.url
                );
                true
            }
        }
    }

    fn execute_scripts_waiting_for_stylesheets(&mut self, cx: &mut ScriptContext<'_>) -> bool {
        if cx.pending_stylesheets > 0 || !self.has_scripts_waiting_for_stylesheets() {
            return !self.has_scripts_waiting_for_load() && !self.has_scripts_waiting_for_stylesheets();
        }
        match self.blocked.take() {
            Some(BlockedScript {
                script,
                wait: Wait::Stylesheets(source),
            }) => {
                self.run(&script, &source, cx);
                true
            }
            other => {
                self.blocked = other;
                false
            }
        }
    }

    fn in_script_execution(&self) -> bool {
        self.execution_depth > 0
    }

    fn detach(&mut self, loader: &mut dyn ResourceLoader) {
        if let Some(BlockedScript {
            wait: Wait::Load(id),
            ..
        }) = self.blocked.take()
        {
            loader.stop_watching_for_load(id);
        }
    }
}
