//! An owned tree of string values keyed by segment.

use std::collections::btree_map::{self, BTreeMap};

use crate::{Entry, Generator, Key};

/// A node value plus its children, keyed by single-segment [`Key`]s.
///
/// Child lookup is case-insensitive because [`Key`] is. The case a child was
/// first inserted with is the one reported back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueTree {
    value: String,
    children: BTreeMap<Key, ValueTree>,
}

impl ValueTree {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            children: BTreeMap::new(),
        }
    }

    /// Snapshot the subtree of `generator` rooted at `key`.
    ///
    /// Returns `None` if the key does not exist.
    pub fn capture<G: Generator + ?Sized>(generator: &G, key: &Key) -> Option<ValueTree> {
        let mut tree = ValueTree::new(generator.get(key)?);
        for entry in generator.children(key) {
            if let Some(child) = Self::capture(generator, &key.join(&entry.key)) {
                tree.children.insert(entry.key, child);
            }
        }
        Some(tree)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Immediate child named by a one-segment key.
    pub fn child(&self, name: &Key) -> Option<&ValueTree> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&Key, &ValueTree)> {
        self.children.iter()
    }

    /// Navigate to the node at `key`.
    pub fn find(&self, key: &Key) -> Option<&ValueTree> {
        let mut current = self;
        for segment in key.segments() {
            current = current.children.get(&Key::new(segment))?;
        }
        Some(current)
    }

    fn find_mut(&mut self, key: &Key) -> Option<&mut ValueTree> {
        let mut current = self;
        for segment in key.segments() {
            current = current.children.get_mut(&Key::new(segment))?;
        }
        Some(current)
    }

    pub fn get(&self, key: &Key) -> Option<&str> {
        self.find(key).map(ValueTree::value)
    }

    /// Set the value at `key`, creating missing ancestors with `""`.
    ///
    /// Returns every key whose value changed: each created node, then `key`
    /// itself if its value differs from before.
    pub fn set(&mut self, key: &Key, value: &str) -> Vec<Key> {
        let mut changed = Vec::new();
        let mut created_leaf = false;
        let mut current = self;
        for (i, segment) in key.segments().enumerate() {
            current = match current.children.entry(Key::new(segment)) {
                btree_map::Entry::Occupied(occupied) => occupied.into_mut(),
                btree_map::Entry::Vacant(vacant) => {
                    changed.push(key.first(i + 1));
                    created_leaf = i + 1 == key.len();
                    vacant.insert(ValueTree::default())
                }
            };
        }
        if current.value != value {
            current.value = value.to_owned();
            if !created_leaf {
                changed.push(key.clone());
            }
        }
        changed
    }

    /// Detach and return the subtree at `key`.
    ///
    /// Removing the root empties this tree and returns its old contents.
    pub fn remove(&mut self, key: &Key) -> Option<ValueTree> {
        if key.is_root() {
            return Some(std::mem::take(self));
        }
        let parent = self.find_mut(&key.remove_last(1))?;
        parent.children.remove(&key.last_segment())
    }

    /// Immediate children of the node at `key` as entries.
    pub fn entries(&self, key: &Key) -> Vec<Entry> {
        self.find(key)
            .map(|node| {
                node.children
                    .iter()
                    .map(|(name, child)| Entry::new(name.clone(), child.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every node below this one, depth first, keyed relative to it.
    pub fn walk(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        self.walk_into(&Key::root(), &mut out);
        out
    }

    fn walk_into(&self, base: &Key, out: &mut Vec<Entry>) {
        for (name, child) in &self.children {
            let key = base.join(name);
            out.push(Entry::new(key.clone(), child.value.clone()));
            child.walk_into(&key, out);
        }
    }
}
