//! The change tree: pending edits, keyed by path.
//!
//! Each node carries one [`Change`] and children keyed by single-segment
//! keys. A `Replace` node owns a full snapshot of its subtree and never has
//! children; edits below it go into the snapshot instead.

use std::collections::BTreeMap;

use treeconf_core::{Entry, Key, ValueTree};

/// What a transaction will do to one key on commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Change {
    /// No edit at this key; only a path to edits below it.
    #[default]
    Unchanged,
    /// Set this key to a value.
    Literal(String),
    /// Replace the whole subtree. `None` deletes it.
    Replace(Option<ValueTree>),
    /// Create this key with an empty value unless it already exists.
    EnsureExists {
        /// Whether the inner generator's value here was absent or empty when
        /// last observed.
        inner_was_empty: bool,
    },
}

/// How a read resolves against the change tree.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The change tree fully determines the value.
    Pinned(Option<String>),
    /// The key exists; read its value from the inner generator, `""` if absent.
    Placeholder,
    /// Read straight from the inner generator.
    Inner,
}

/// How a listing resolves against the change tree.
#[derive(Debug, PartialEq, Eq)]
pub enum Listing {
    /// Children come from a snapshot only.
    Snapshot(Vec<Entry>),
    /// Merge these names with the inner generator's children.
    Overlay(Vec<Key>),
    /// List the inner generator's children.
    Inner,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeNode {
    pub change: Change,
    pub children: BTreeMap<Key, ChangeNode>,
}

enum Walk<'a> {
    /// Reached the node for the key.
    Exact(&'a ChangeNode),
    /// Hit a `Replace` node; the rest of the key is relative to it.
    Replaced(&'a Option<ValueTree>, Key),
    /// The tree holds nothing at or above the key's deepest part.
    Missing,
}

fn edit_snapshot(snapshot: &mut Option<ValueTree>, rel: &Key, value: Option<&str>, is_root: bool) {
    match value {
        Some(value) => {
            snapshot.get_or_insert_with(ValueTree::default).set(rel, value);
        }
        None if rel.is_root() => {
            *snapshot = is_root.then(ValueTree::default);
        }
        None => {
            if let Some(tree) = snapshot {
                tree.remove(rel);
            }
        }
    }
}

impl ChangeNode {
    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.change == Change::Unchanged && self.children.is_empty()
    }

    fn walk(&self, key: &Key) -> Walk<'_> {
        let mut node = self;
        for (i, segment) in key.segments().enumerate() {
            if let Change::Replace(snapshot) = &node.change {
                return Walk::Replaced(snapshot, key.remove_first(i));
            }
            match node.children.get(&Key::new(segment)) {
                Some(child) => node = child,
                None => return Walk::Missing,
            }
        }
        match &node.change {
            Change::Replace(snapshot) => Walk::Replaced(snapshot, Key::root()),
            _ => Walk::Exact(node),
        }
    }

    pub fn lookup(&self, key: &Key) -> Lookup {
        match self.walk(key) {
            Walk::Replaced(snapshot, rel) => Lookup::Pinned(
                snapshot
                    .as_ref()
                    .and_then(|tree| tree.get(&rel))
                    .map(str::to_owned),
            ),
            Walk::Exact(node) => match &node.change {
                Change::Literal(value) => Lookup::Pinned(Some(value.clone())),
                Change::EnsureExists { .. } => Lookup::Placeholder,
                _ => Lookup::Inner,
            },
            Walk::Missing => Lookup::Inner,
        }
    }

    pub fn listing(&self, key: &Key) -> Listing {
        match self.walk(key) {
            Walk::Replaced(snapshot, rel) => Listing::Snapshot(
                snapshot
                    .as_ref()
                    .map(|tree| tree.entries(&rel))
                    .unwrap_or_default(),
            ),
            Walk::Exact(node) if node.children.is_empty() => Listing::Inner,
            Walk::Exact(node) => Listing::Overlay(node.children.keys().cloned().collect()),
            Walk::Missing => Listing::Inner,
        }
    }

    /// Record `value` at `key`.
    ///
    /// `inner_empty[i]` tells whether the inner generator's value at the
    /// `i + 1` segment prefix of `key` is absent or empty; it seeds the
    /// ensure-exists nodes created for ancestors.
    pub fn apply(&mut self, key: &Key, value: Option<&str>, inner_empty: &[bool]) {
        let len = key.len();
        let mut node = self;
        for (i, segment) in key.segments().enumerate() {
            if let Change::Replace(snapshot) = &mut node.change {
                edit_snapshot(snapshot, &key.remove_first(i), value, i == 0);
                return;
            }
            let is_last = i + 1 == len;
            node = node
                .children
                .entry(Key::new(segment))
                .or_insert_with(|| ChangeNode {
                    change: if is_last {
                        Change::Unchanged
                    } else {
                        Change::EnsureExists {
                            inner_was_empty: inner_empty.get(i).copied().unwrap_or(true),
                        }
                    },
                    children: BTreeMap::new(),
                });
        }

        if let Change::Replace(snapshot) = &mut node.change {
            edit_snapshot(snapshot, &Key::root(), value, len == 0);
            return;
        }
        match value {
            Some(value) => node.change = Change::Literal(value.to_owned()),
            None => {
                node.change = Change::Replace(key.is_root().then(ValueTree::default));
                node.children.clear();
            }
        }
    }

    /// Decide whether an inner delta at `key` changes what this transaction
    /// shows, updating ensure-exists bookkeeping on the way.
    pub fn admits(&mut self, key: &Key, value: Option<&str>) -> bool {
        let mut node = self;
        for segment in key.segments() {
            if matches!(node.change, Change::Replace(_)) {
                return false;
            }
            match node.children.get_mut(&Key::new(segment)) {
                Some(child) => node = child,
                None => return true,
            }
        }
        match &mut node.change {
            Change::Replace(_) => false,
            Change::Literal(_) => value.is_none(),
            Change::EnsureExists { inner_was_empty } => match value {
                // The subtree may have changed under a re-fetch.
                None => {
                    *inner_was_empty = true;
                    true
                }
                Some(value) => {
                    let now_empty = value.is_empty();
                    let suppress = now_empty && *inner_was_empty;
                    *inner_was_empty = now_empty;
                    !suppress
                }
            },
            Change::Unchanged => true,
        }
    }
}
