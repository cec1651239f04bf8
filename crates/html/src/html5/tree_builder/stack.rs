//! Stack of open elements.

use crate::dom_patch::PatchKey;
use crate::html5::shared::AtomId;

/// Entry in the stack of open elements.
///
/// Identity is the patch key; the name is kept so end tags can be matched
/// without resolving atoms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenElement {
    key: PatchKey,
    name: AtomId,
}

impl OpenElement {
    pub(crate) fn new(key: PatchKey, name: AtomId) -> Self {
        Self { key, name }
    }

    pub(crate) fn key(self) -> PatchKey {
        self.key
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct OpenElementsStack {
    items: Vec<OpenElement>,
    max_depth: u32,
}

impl OpenElementsStack {
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn push(&mut self, entry: OpenElement) {
        self.items.push(entry);
        self.max_depth = self.max_depth.max(self.items.len() as u32);
    }

    pub(crate) fn pop(&mut self) -> Option<OpenElement> {
        self.items.pop()
    }

    pub(crate) fn current(&self) -> Option<OpenElement> {
        self.items.last().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub(crate) fn contains_key(&self, key: PatchKey) -> bool {
        self.items.iter().any(|entry| entry.key == key)
    }

    /// Pop down to and including the nearest element named `name`.
    ///
    /// Returns `None` and leaves the stack untouched when no such element is
    /// open.
    pub(crate) fn pop_until_including(&mut self, name: AtomId) -> Option<OpenElement> {
        let index = self.items.iter().rposition(|entry| entry.name == name)?;
        let matched = self.items[index];
        self.items.truncate(index);
        Some(matched)
    }

    #[cfg(test)]
    pub(crate) fn iter_keys(&self) -> impl Iterator<Item = PatchKey> + '_ {
        self.items.iter().map(|entry| entry.key)
    }
}
