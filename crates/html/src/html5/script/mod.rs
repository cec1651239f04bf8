//! Script execution for the parser.
//!
//! The tree builder pauses at `</script>`; the session hands the captured
//! script to a `ScriptRunner`, which either runs it at once or parks it until
//! its source (or blocking stylesheets) arrive.

mod engine;
mod loader;
mod runner;

pub use engine::{DocumentWriteEngine, NoopEngine, ScriptEngine, ScriptError};
pub use loader::{
    AllowAllScripts, Initiator, LoadError, LoadedResource, ResourceLoader, ScriptLoadPolicy,
};
pub use runner::{
    HtmlScriptRunner, ScriptContext, ScriptRunner, ScriptRunnerConfig, ScriptRunnerStats,
    is_runnable_script_type,
};

/// Handle through which a running script writes back into its document.
pub trait DocumentWriter {
    /// `document.write`: text lands at the current insertion point.
    fn write(&mut self, source: &str);

    /// Network data delivered while a script is running.
    ///
    /// Buffered only; the outermost write consumes it.
    fn write_from_network(&mut self, chunk: &str);

    /// End-of-body observed while a script is running. The document end is
    /// delayed until the script has returned.
    fn finish(&mut self);
}
