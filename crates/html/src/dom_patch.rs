//! Incremental DOM patch protocol.
//!
//! The tree builder never owns a DOM. It describes every tree mutation as a
//! `DomPatch`, and whoever owns the document applies them in order.
//!
//! A stream is append-only: nodes are created once, attached once, and only
//! text nodes change afterwards (coalesced character data). Keys are unique
//! per document and `PatchKey::INVALID` never appears. Names are
//! ASCII-lowercase.

use std::sync::Arc;

/// Opaque patch-layer key for stable node identity within a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchKey(pub u32);

impl PatchKey {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: PatchKey = PatchKey(0);
}

/// Incremental DOM patch operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomPatch {
    /// Create a document root node.
    CreateDocument {
        key: PatchKey,
        doctype: Option<String>,
    },
    /// Create an element node with initial attributes.
    CreateElement {
        key: PatchKey,
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    CreateText { key: PatchKey, text: String },
    CreateComment { key: PatchKey, text: String },
    /// Append a child to the end of a parent's children list.
    AppendChild { parent: PatchKey, child: PatchKey },
    /// Replace the text of a text node that grew by coalescing.
    SetText { key: PatchKey, text: String },
}
