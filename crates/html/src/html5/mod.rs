//! HTML5 parsing path.
//!
//! Bottom-up: `InputStream` (shared) -> `Html5Tokenizer` -> `Html5TreeBuilder`
//! -> `ScriptRunner` -> `PreloadScanner` -> `ParserScheduler`, all driven by
//! `Html5ParseSession`.

mod observer;
pub mod preload;
pub mod scheduler;
pub mod script;
mod session;
pub(crate) mod shared;
#[cfg(any(test, feature = "test-harness"))]
pub mod testing;
pub mod tokenizer;
pub mod tree_builder;

// Public re-exports: consumers should import from `html::html5::*` rather than `shared::*`.
pub use observer::{NoopObserver, ParserObserver};
pub use preload::{PreloadScanner, PreloadStats};
pub use scheduler::{
    HostScheduler, ParserScheduler, PumpSession, SchedulerConfig, SchedulerStats, SynchronousMode,
};
pub use script::{
    AllowAllScripts, DocumentWriteEngine, DocumentWriter, HtmlScriptRunner, Initiator, LoadError,
    LoadedResource, NoopEngine, ResourceLoader, ScriptContext, ScriptEngine, ScriptError,
    ScriptLoadPolicy, ScriptRunner, ScriptRunnerConfig, ScriptRunnerStats,
};
pub use session::{Html5ParseSession, ParseCompletion, ParserConfig, ParserHost};
pub use shared::{
    AtomId, AtomTable, Attribute, ByteStreamDecoder, Counters, DocumentParseContext, InputStream,
    ParseError, ParseErrorCode, Token,
};
pub use tokenizer::{Html5Tokenizer, TokenizeResult, TokenizerConfig};
pub use tree_builder::{
    Html5TreeBuilder, PendingScript, ScriptElement, SuspendReason, TreeBuilderConfig,
    TreeBuilderStepResult, TreeBuilderSummary,
};
