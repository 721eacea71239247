//! The scaffold: an arena of mount-point nodes.
//!
//! Nodes are addressed by [`NodeId`]. Each stores its parent, the segment it
//! hangs under, a segment-to-child map and the bindings mounted exactly at
//! its path, most recent first. A node exists only while it or something
//! below it holds a binding; [`Scaffold::prune`] frees the nodes that no
//! longer do, and their ids go on a free list for reuse.

use std::collections::BTreeMap;

use treeconf_core::Key;

/// Index of a node in a [`Scaffold`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug)]
struct Node<T> {
    parent: Option<NodeId>,
    segment: Key,
    children: BTreeMap<Key, NodeId>,
    bindings: Vec<T>,
}

impl<T> Node<T> {
    fn new(parent: Option<NodeId>, segment: Key) -> Self {
        Self {
            parent,
            segment,
            children: BTreeMap::new(),
            bindings: Vec::new(),
        }
    }

    fn is_vacant(&self) -> bool {
        self.children.is_empty() && self.bindings.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct Scaffold<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
}

impl<T> Default for Scaffold<T> {
    fn default() -> Self {
        Self {
            nodes: vec![Some(Node::new(None, Key::root()))],
            free: Vec::new(),
        }
    }
}

impl<T> Scaffold<T> {
    /// Create a scaffold holding only the root.
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// The immediate child of `id` named `segment`.
    pub fn child(&self, id: NodeId, segment: &Key) -> Option<NodeId> {
        self.node(id)?.children.get(segment).copied()
    }

    /// Navigate to the node at `key` if it exists.
    pub fn find(&self, key: &Key) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for segment in key.segments() {
            current = self.child(current, &Key::new(segment))?;
        }
        Some(current)
    }

    /// Navigate to the node at `key`, creating intermediate nodes as needed.
    pub fn ensure(&mut self, key: &Key) -> NodeId {
        let mut current = NodeId::ROOT;
        for segment in key.segments() {
            let segment = Key::new(segment);
            current = match self.child(current, &segment) {
                Some(child) => child,
                None => self.allocate(current, segment),
            };
        }
        current
    }

    fn allocate(&mut self, parent: NodeId, segment: Key) -> NodeId {
        let node = Node::new(Some(parent), segment.clone());
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.insert(segment, id);
        }
        id
    }

    /// Bindings at `id`, most recent first.
    pub fn bindings(&self, id: NodeId) -> &[T] {
        match self.node(id) {
            Some(node) => &node.bindings,
            None => &[],
        }
    }

    /// Children of `id` in key order.
    pub fn children(&self, id: NodeId) -> Vec<(Key, NodeId)> {
        self.node(id)
            .map(|node| {
                node.children
                    .iter()
                    .map(|(name, child)| (name.clone(), *child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|node| !node.children.is_empty())
    }

    /// Bind `value` at `id` ahead of any existing bindings there.
    pub fn push(&mut self, id: NodeId, value: T) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.bindings.insert(0, value);
                true
            }
            None => false,
        }
    }

    /// Remove the first binding at `id` matching `pred`, then prune.
    pub fn remove_where<F>(&mut self, id: NodeId, pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let node = self.node_mut(id)?;
        let index = node.bindings.iter().position(pred)?;
        let removed = node.bindings.remove(index);
        self.prune(id);
        Some(removed)
    }

    /// Free `id` and each ancestor left without bindings or children,
    /// stopping at the first one still in use. The root is never freed.
    pub fn prune(&mut self, id: NodeId) {
        let mut current = id;
        while current != NodeId::ROOT {
            let Some(node) = self.node(current) else {
                return;
            };
            if !node.is_vacant() {
                return;
            }
            let (parent, segment) = (node.parent, node.segment.clone());
            self.nodes[current.0] = None;
            self.free.push(current.0);
            let Some(parent) = parent else {
                return;
            };
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.remove(&segment);
            }
            current = parent;
        }
    }

    /// The absolute path of `id`.
    pub fn path_of(&self, id: NodeId) -> Key {
        let mut segments = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            if node.parent.is_some() {
                segments.push(node.segment.to_string());
            }
            current = node.parent.and_then(|parent| self.node(parent));
        }
        segments.reverse();
        Key::from_segments(segments)
    }

    /// Every node on the path to `key` that exists, deepest first, with the
    /// number of segments of `key` it consumes.
    pub fn ancestors(&self, key: &Key) -> Vec<(usize, NodeId)> {
        let mut found = vec![(0, NodeId::ROOT)];
        let mut current = NodeId::ROOT;
        for (depth, segment) in key.segments().enumerate() {
            match self.child(current, &Key::new(segment)) {
                Some(child) => {
                    current = child;
                    found.push((depth + 1, child));
                }
                None => break,
            }
        }
        found.reverse();
        found
    }

    /// All nodes strictly below `id`, preorder, with their paths relative to
    /// `id`.
    pub fn below(&self, id: NodeId) -> Vec<(Key, NodeId)> {
        let mut out = Vec::new();
        let mut stack: Vec<(Key, NodeId)> = self.children(id).into_iter().rev().collect();
        while let Some((path, node)) = stack.pop() {
            stack.extend(
                self.children(node)
                    .into_iter()
                    .rev()
                    .map(|(name, child)| (path.join(&name), child)),
            );
            out.push((path, node));
        }
        out
    }

    /// Every binding with the absolute path it is mounted at, preorder.
    pub fn iter(&self) -> Vec<(Key, &T)> {
        let mut nodes = vec![(Key::root(), NodeId::ROOT)];
        nodes.extend(self.below(NodeId::ROOT));
        nodes
            .into_iter()
            .flat_map(|(path, id)| {
                self.bindings(id)
                    .iter()
                    .map(move |binding| (path.clone(), binding))
            })
            .collect()
    }
}

#[cfg(test)]
impl<T> Scaffold<T> {
    fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Count of bindings (not nodes).
    fn len(&self) -> usize {
        self.nodes.iter().flatten().map(|node| node.bindings.len()).sum()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of live nodes, root included.
    fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeconf_core::key;

    fn bound_at(scaffold: &Scaffold<i32>, key: &Key) -> Option<Vec<i32>> {
        scaffold.find(key).map(|id| scaffold.bindings(id).to_vec())
    }

    #[test]
    fn new_scaffold_has_only_root() {
        let scaffold: Scaffold<i32> = Scaffold::new();
        assert!(scaffold.is_empty());
        assert_eq!(scaffold.node_count(), 1);
        assert_eq!(scaffold.find(&Key::root()), Some(NodeId::ROOT));
    }

    #[test]
    fn ensure_creates_intermediate_nodes() {
        let mut scaffold = Scaffold::new();
        let id = scaffold.ensure(&key!("a/b"));
        scaffold.push(id, 1);

        assert_eq!(bound_at(&scaffold, &key!("a")), Some(vec![]));
        assert_eq!(bound_at(&scaffold, &key!("A/B")), Some(vec![1]));
        assert_eq!(bound_at(&scaffold, &key!("a/b/c")), None);
        assert_eq!(scaffold.ensure(&key!("a/b")), id);
        assert_eq!(scaffold.path_of(id).to_string(), "a/b");
    }

    #[test]
    fn push_puts_most_recent_first() {
        let mut scaffold = Scaffold::new();
        let id = scaffold.ensure(&key!("a"));
        scaffold.push(id, 1);
        scaffold.push(id, 2);
        assert_eq!(scaffold.bindings(id), &[2, 1]);
        assert_eq!(scaffold.len(), 2);
    }

    #[test]
    fn remove_prunes_vacant_ancestors() {
        let mut scaffold = Scaffold::new();
        let deep = scaffold.ensure(&key!("a/b/c"));
        scaffold.push(deep, 1);
        let side = scaffold.ensure(&key!("a/x"));
        scaffold.push(side, 2);

        assert_eq!(scaffold.remove_where(deep, |v| *v == 1), Some(1));
        assert!(scaffold.find(&key!("a/b")).is_none());
        assert!(scaffold.find(&key!("a")).is_some());
        assert!(!scaffold.contains(deep));

        assert_eq!(scaffold.remove_where(side, |v| *v == 2), Some(2));
        assert!(scaffold.find(&key!("a")).is_none());
        assert_eq!(scaffold.node_count(), 1);
    }

    #[test]
    fn remove_keeps_nodes_with_bindings_below() {
        let mut scaffold = Scaffold::new();
        let a = scaffold.ensure(&key!("a"));
        scaffold.push(a, 1);
        let b = scaffold.ensure(&key!("a/b"));
        scaffold.push(b, 2);

        scaffold.remove_where(a, |v| *v == 1);
        assert_eq!(bound_at(&scaffold, &key!("a")), Some(vec![]));
        assert_eq!(bound_at(&scaffold, &key!("a/b")), Some(vec![2]));
    }

    #[test]
    fn remove_nonexistent() {
        let mut scaffold = Scaffold::new();
        let a = scaffold.ensure(&key!("a"));
        scaffold.push(a, 1);
        assert_eq!(scaffold.remove_where(a, |v| *v == 9), None);
        assert_eq!(scaffold.len(), 1);
    }

    #[test]
    fn root_is_never_freed() {
        let mut scaffold = Scaffold::new();
        scaffold.push(NodeId::ROOT, 1);
        assert_eq!(scaffold.remove_where(NodeId::ROOT, |_| true), Some(1));
        assert!(scaffold.contains(NodeId::ROOT));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut scaffold = Scaffold::new();
        let a = scaffold.ensure(&key!("a"));
        scaffold.push(a, 1);
        scaffold.remove_where(a, |_| true);
        let b = scaffold.ensure(&key!("b"));
        assert_eq!(a, b);
        assert_eq!(scaffold.path_of(b).to_string(), "b");
    }

    #[test]
    fn ancestors_are_deepest_first() {
        let mut scaffold: Scaffold<i32> = Scaffold::new();
        let data = scaffold.ensure(&key!("data"));
        let users = scaffold.ensure(&key!("data/users"));

        let found = scaffold.ancestors(&key!("data/users/1/name"));
        assert_eq!(found, vec![(2, users), (1, data), (0, NodeId::ROOT)]);
    }

    #[test]
    fn below_is_strict_and_relative() {
        let mut scaffold: Scaffold<i32> = Scaffold::new();
        let a = scaffold.ensure(&key!("a"));
        scaffold.ensure(&key!("a/b/c"));
        scaffold.ensure(&key!("z"));

        let paths: Vec<String> = scaffold
            .below(a)
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(paths, vec!["b", "b/c"]);
    }

    #[test]
    fn iter_lists_every_binding() {
        let mut scaffold = Scaffold::new();
        let b = scaffold.ensure(&key!("b"));
        scaffold.push(b, 2);
        scaffold.push(NodeId::ROOT, 0);
        let a = scaffold.ensure(&key!("a"));
        scaffold.push(a, 1);

        let found: Vec<(String, i32)> = scaffold
            .iter()
            .into_iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        assert_eq!(
            found,
            vec![("".to_string(), 0), ("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }
}
