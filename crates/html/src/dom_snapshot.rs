use crate::dom_patch::{DomPatch, PatchKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Materialized view of a `DomPatch` stream, for tests and tools.
///
/// Not a public stable format. Patches are applied strictly in order and
/// every protocol violation (unknown key, second parent, create over an
/// existing key) is reported instead of being repaired.
#[derive(Debug, Default)]
pub struct PatchDom {
    nodes: HashMap<PatchKey, PatchNode>,
    root: Option<PatchKey>,
    applied: usize,
}

#[derive(Debug)]
struct PatchNode {
    kind: NodeKind,
    parent: Option<PatchKey>,
    children: Vec<PatchKey>,
}

#[derive(Debug)]
enum NodeKind {
    Document {
        doctype: Option<String>,
    },
    Element {
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchApplyError {
    /// Index of the offending patch in the applied stream.
    pub index: usize,
    pub detail: String,
}

impl fmt::Display for PatchApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch #{}: {}", self.index, self.detail)
    }
}

impl std::error::Error for PatchApplyError {}

impl PatchDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a complete stream, panicking on a protocol violation.
    pub fn from_patches(patches: &[DomPatch]) -> Self {
        let mut dom = Self::new();
        if let Err(err) = dom.apply_all(patches) {
            panic!("invalid patch stream: {err}");
        }
        dom
    }

    pub fn apply_all(&mut self, patches: &[DomPatch]) -> Result<(), PatchApplyError> {
        patches.iter().try_for_each(|patch| self.apply(patch))
    }

    pub fn apply(&mut self, patch: &DomPatch) -> Result<(), PatchApplyError> {
        let index = self.applied;
        self.applied += 1;
        let fail = |detail: String| PatchApplyError { index, detail };
        match patch {
            DomPatch::CreateDocument { key, doctype } => {
                self.create(*key, NodeKind::Document {
                    doctype: doctype.clone(),
                })
                .map_err(fail)?;
                self.root.get_or_insert(*key);
            }
            DomPatch::CreateElement {
                key,
                name,
                attributes,
            } => self
                .create(*key, NodeKind::Element {
                    name: Arc::clone(name),
                    attributes: attributes.clone(),
                })
                .map_err(fail)?,
            DomPatch::CreateText { key, text } => {
                self.create(*key, NodeKind::Text(text.clone())).map_err(fail)?
            }
            DomPatch::CreateComment { key, text } => self
                .create(*key, NodeKind::Comment(text.clone()))
                .map_err(fail)?,
            DomPatch::AppendChild { parent, child } => {
                self.append(*parent, *child).map_err(fail)?
            }
            DomPatch::SetText { key, text } => match self.nodes.get_mut(key) {
                Some(PatchNode {
                    kind: NodeKind::Text(slot),
                    ..
                }) => *slot = text.clone(),
                _ => return Err(fail(format!("SetText on non-text {key:?}"))),
            },
        }
        Ok(())
    }

    fn create(&mut self, key: PatchKey, kind: NodeKind) -> Result<(), String> {
        if key == PatchKey::INVALID {
            return Err("create with PatchKey::INVALID".to_string());
        }
        if self.nodes.contains_key(&key) {
            return Err(format!("{key:?} created twice"));
        }
        self.nodes.insert(key, PatchNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        Ok(())
    }

    fn append(&mut self, parent: PatchKey, child: PatchKey) -> Result<(), String> {
        if parent == child {
            return Err(format!("{child:?} appended to itself"));
        }
        match self.nodes.get(&child) {
            None => return Err(format!("unknown child {child:?}")),
            Some(node) if node.parent.is_some() => {
                return Err(format!("{child:?} already has a parent"));
            }
            Some(_) => {}
        }
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return Err(format!("unknown parent {parent:?}"));
        };
        parent_node.children.push(child);
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    /// Concatenated text of all text nodes in tree order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.collect_text(root, &mut out);
        }
        out
    }

    fn collect_text(&self, key: PatchKey, out: &mut String) {
        let Some(node) = self.nodes.get(&key) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    /// Element names in document order.
    pub fn element_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<PatchKey> = self.root.into_iter().collect();
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(&key) else {
                continue;
            };
            if let NodeKind::Element { name, .. } = &node.kind {
                out.push(name.to_string());
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub fn snapshot(&self) -> DomSnapshot {
        let mut lines = Vec::new();
        if let Some(root) = self.root {
            self.walk(root, 0, &mut lines);
        }
        DomSnapshot { lines }
    }

    fn walk(&self, key: PatchKey, depth: usize, lines: &mut Vec<String>) {
        let Some(node) = self.nodes.get(&key) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let label = match &node.kind {
            NodeKind::Document { doctype: None } => "#document".to_string(),
            NodeKind::Document {
                doctype: Some(name),
            } => format!("#document doctype={name}"),
            NodeKind::Element { name, attributes } => {
                let mut label = format!("<{name}");
                for (attr, value) in attributes {
                    match value {
                        Some(value) => label.push_str(&format!(" {attr}=\"{value}\"")),
                        None => label.push_str(&format!(" {attr}")),
                    }
                }
                label.push('>');
                label
            }
            NodeKind::Text(text) => format!("\"{}\"", escape_text(text)),
            NodeKind::Comment(text) => format!("<!-- {} -->", escape_text(text)),
        };
        lines.push(format!("{indent}{label}"));
        for child in &node.children {
            self.walk(*child, depth + 1, lines);
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n").replace('"', "\\\"")
}

/// Deterministic indented outline of a patch-built tree.
#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PatchDom, PatchKey};
    use crate::dom_patch::DomPatch;
    use std::sync::Arc;

    fn element(key: u32, name: &str) -> DomPatch {
        DomPatch::CreateElement {
            key: PatchKey(key),
            name: Arc::from(name),
            attributes: vec![(Arc::from("id"), Some("x".to_string()))],
        }
    }

    #[test]
    fn renders_nested_outline() {
        let dom = PatchDom::from_patches(&[
            DomPatch::CreateDocument {
                key: PatchKey(1),
                doctype: Some("html".to_string()),
            },
            element(2, "p"),
            DomPatch::AppendChild {
                parent: PatchKey(1),
                child: PatchKey(2),
            },
            DomPatch::CreateText {
                key: PatchKey(3),
                text: "hi".to_string(),
            },
            DomPatch::AppendChild {
                parent: PatchKey(2),
                child: PatchKey(3),
            },
            DomPatch::SetText {
                key: PatchKey(3),
                text: "hi there".to_string(),
            },
        ]);
        assert_eq!(
            dom.snapshot().render(),
            "#document doctype=html\n  <p id=\"x\">\n    \"hi there\""
        );
        assert_eq!(dom.text_content(), "hi there");
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut dom = PatchDom::new();
        let err = dom
            .apply_all(&[
                DomPatch::CreateDocument {
                    key: PatchKey(1),
                    doctype: None,
                },
                element(2, "a"),
                DomPatch::AppendChild {
                    parent: PatchKey(9),
                    child: PatchKey(2),
                },
            ])
            .expect_err("parent was never created");
        assert_eq!(err.index, 2);
        assert!(err.detail.contains("unknown parent"));
    }

    #[test]
    fn second_parent_is_rejected() {
        let mut dom = PatchDom::new();
        let err = dom
            .apply_all(&[
                DomPatch::CreateDocument {
                    key: PatchKey(1),
                    doctype: None,
                },
                element(2, "a"),
                element(3, "b"),
                DomPatch::AppendChild {
                    parent: PatchKey(1),
                    child: PatchKey(3),
                },
                DomPatch::AppendChild {
                    parent: PatchKey(2),
                    child: PatchKey(3),
                },
            ])
            .expect_err("node attached twice");
        assert_eq!(err.index, 4);
    }
}
