//! Hierarchical attribute namespace.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracestate_types::Quark;

#[derive(Debug)]
struct Node {
    name: Arc<str>,
    parent: Option<Quark>,
    children: Vec<Quark>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
    roots: Vec<Quark>,
    /// Lookup of a child by parent and name; `None` is the (virtual) root.
    index: HashMap<(Option<Quark>, Arc<str>), Quark>,
}

/// Tree of attribute names, mapping each path to a dense [`Quark`].
///
/// Quarks are handed out in creation order starting at 0, so they double as
/// indexes into per-attribute tables. Attributes are never removed.
#[derive(Debug, Default)]
pub struct AttributeTree {
    inner: RwLock<Inner>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes in the tree.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, quark: Quark) -> bool {
        quark.index() < self.len()
    }

    /// Resolve `path` below `start` (`None` for the root) without creating
    /// anything.
    pub fn get_quark(&self, start: Option<Quark>, path: &[&str]) -> Option<Quark> {
        let inner = self.inner.read();
        let mut current = start;
        for name in path {
            let key = (current, Arc::<str>::from(*name));
            current = Some(*inner.index.get(&key)?);
        }
        current
    }

    /// Resolve `path` below `start`, creating missing attributes along the way.
    ///
    /// An empty path resolves to `start` itself; with no start either, there
    /// is nothing to resolve and `None` is returned.
    pub fn get_or_add(&self, start: Option<Quark>, path: &[&str]) -> Option<Quark> {
        if let Some(quark) = self.get_quark(start, path) {
            return Some(quark);
        }

        let mut inner = self.inner.write();
        let mut current = start;
        for name in path {
            let name: Arc<str> = Arc::from(*name);
            let key = (current, name.clone());
            let quark = match inner.index.get(&key) {
                Some(quark) => *quark,
                None => {
                    let quark = Quark::from_index(inner.nodes.len());
                    inner.nodes.push(Node {
                        name,
                        parent: current,
                        children: Vec::new(),
                    });
                    match current {
                        Some(parent) => inner.nodes[parent.index()].children.push(quark),
                        None => inner.roots.push(quark),
                    }
                    inner.index.insert(key, quark);
                    quark
                }
            };
            current = Some(quark);
        }
        current
    }

    pub fn name(&self, quark: Quark) -> Option<Arc<str>> {
        self.inner
            .read()
            .nodes
            .get(quark.index())
            .map(|node| node.name.clone())
    }

    pub fn parent(&self, quark: Quark) -> Option<Quark> {
        self.inner
            .read()
            .nodes
            .get(quark.index())
            .and_then(|node| node.parent)
    }

    /// Slash-separated path from the root, e.g. `Threads/42/Status`.
    pub fn full_path(&self, quark: Quark) -> Option<String> {
        let inner = self.inner.read();
        let mut names = Vec::new();
        let mut current = Some(quark);
        while let Some(quark) = current {
            let node = inner.nodes.get(quark.index())?;
            names.push(node.name.as_ref());
            current = node.parent;
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Children of `quark` in creation order, descendants too if `recursive`.
    /// `None` lists the top-level attributes.
    pub fn sub_attributes(&self, quark: Option<Quark>, recursive: bool) -> Vec<Quark> {
        let inner = self.inner.read();
        let direct = match quark {
            Some(quark) => match inner.nodes.get(quark.index()) {
                Some(node) => &node.children,
                None => return Vec::new(),
            },
            None => &inner.roots,
        };

        let mut result = Vec::new();
        let mut pending: Vec<Quark> = direct.iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            result.push(next);
            if recursive {
                pending.extend(inner.nodes[next.index()].children.iter().rev());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarks_are_dense_and_stable() {
        let tree = AttributeTree::new();
        let status = tree.get_or_add(None, &["Threads", "1", "Status"]).unwrap();
        assert_eq!(status, Quark(2));
        assert_eq!(tree.len(), 3);

        // Resolving again creates nothing.
        assert_eq!(tree.get_or_add(None, &["Threads", "1", "Status"]), Some(status));
        assert_eq!(tree.len(), 3);

        let other = tree.get_or_add(None, &["Threads", "2"]).unwrap();
        assert_eq!(other, Quark(3));
    }

    #[test]
    fn test_relative_lookup() {
        let tree = AttributeTree::new();
        let thread = tree.get_or_add(None, &["Threads", "7"]).unwrap();
        let status = tree.get_or_add(Some(thread), &["Status"]).unwrap();
        assert_eq!(tree.get_quark(None, &["Threads", "7", "Status"]), Some(status));
        assert_eq!(tree.get_quark(Some(thread), &["Status"]), Some(status));
        assert_eq!(tree.get_quark(Some(thread), &["Missing"]), None);
        assert_eq!(tree.get_quark(Some(thread), &[]), Some(thread));
        assert_eq!(tree.parent(status), Some(thread));
    }

    #[test]
    fn test_full_path() {
        let tree = AttributeTree::new();
        let quark = tree.get_or_add(None, &["CPUs", "0", "Current"]).unwrap();
        assert_eq!(tree.full_path(quark).as_deref(), Some("CPUs/0/Current"));
        assert_eq!(tree.name(quark).as_deref(), Some("Current"));
        assert_eq!(tree.full_path(Quark(99)), None);
    }

    #[test]
    fn test_sub_attributes_depth_first() {
        let tree = AttributeTree::new();
        let root = tree.get_or_add(None, &["A"]).unwrap();
        let b = tree.get_or_add(Some(root), &["B"]).unwrap();
        let c = tree.get_or_add(Some(b), &["C"]).unwrap();
        let d = tree.get_or_add(Some(root), &["D"]).unwrap();

        assert_eq!(tree.sub_attributes(Some(root), false), vec![b, d]);
        assert_eq!(tree.sub_attributes(Some(root), true), vec![b, c, d]);
        assert_eq!(tree.sub_attributes(None, false), vec![root]);
    }
}
