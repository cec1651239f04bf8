//! Resource loading seam between the parser and whatever fetches bytes.
//!
//! The parser never fetches anything itself. It asks a `ResourceLoader` for a
//! resource, optionally registers interest in its completion, and is told about
//! completion through `Html5ParseSession::notify_finished`.

use core_types::{ResourceId, ResourceKind};
use std::fmt;

/// Who asked for a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Initiator {
    /// The parser needs it before it can continue (blocking script or
    /// stylesheet).
    Parser,
    /// Speculative fetch started by the preload scanner.
    PreloadScanner,
}

/// Why a load produced no body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    Network(String),
    Status(u16),
    Canceled,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Network(msg) => write!(f, "network error: {msg}"),
            LoadError::Status(code) => write!(f, "http status {code}"),
            LoadError::Canceled => f.write_str("canceled"),
        }
    }
}

impl std::error::Error for LoadError {}

/// A completed load, successful or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedResource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub url: String,
    pub body: Result<String, LoadError>,
}

pub trait ResourceLoader {
    /// Start (or join) a fetch and return its id.
    fn request(&mut self, url: &str, kind: ResourceKind, initiator: Initiator) -> ResourceId;

    /// The parser is blocked on `id` and wants `notify_finished` for it.
    fn watch_for_load(&mut self, id: ResourceId);

    fn stop_watching_for_load(&mut self, id: ResourceId);
}

/// Gate consulted before an external script is fetched.
///
/// Returning `false` makes the script behave as if it had no `src`.
pub trait ScriptLoadPolicy {
    fn should_load_external_script_from_src(&self, src: &str) -> bool;
}

/// Policy that permits every script.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAllScripts;

impl ScriptLoadPolicy for AllowAllScripts {
    fn should_load_external_script_from_src(&self, _src: &str) -> bool {
        true
    }
}

impl<F> ScriptLoadPolicy for F
where
    F: Fn(&str) -> bool,
{
    fn should_load_external_script_from_src(&self, src: &str) -> bool {
        self(src)
    }
}
