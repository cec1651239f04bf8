//! Patch emission helpers.

use crate::dom_patch::{DomPatch, PatchKey};
use crate::html5::tree_builder::{Html5TreeBuilder, PatchSink};

impl Html5TreeBuilder {
    pub(super) fn alloc_key(&mut self) -> PatchKey {
        self.next_key = self
            .next_key
            .checked_add(1)
            .unwrap_or_else(|| panic!("Html5TreeBuilder exhausted the u32 patch key space"));
        self.nodes_created = self.nodes_created.saturating_add(1);
        PatchKey(self.next_key)
    }

    /// Key of the document node, creating it on first use.
    pub(super) fn ensure_document(
        &mut self,
        doctype: Option<String>,
        sink: &mut dyn PatchSink,
    ) -> PatchKey {
        if let Some(key) = self.document {
            return key;
        }
        let key = self.alloc_key();
        sink.push(DomPatch::CreateDocument { key, doctype });
        self.document = Some(key);
        key
    }

    /// Parent for the next inserted node: the current open element, else the
    /// document.
    pub(super) fn insertion_parent(&mut self, sink: &mut dyn PatchSink) -> PatchKey {
        match self.open.current() {
            Some(entry) => entry.key(),
            None => self.ensure_document(None, sink),
        }
    }

    pub(super) fn create_and_append(
        &mut self,
        parent: PatchKey,
        create: DomPatch,
        child: PatchKey,
        sink: &mut dyn PatchSink,
    ) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html5.tree_builder", "append {child:?} under {parent:?}: {create:?}");
        sink.push(create);
        sink.push(DomPatch::AppendChild { parent, child });
    }
}
