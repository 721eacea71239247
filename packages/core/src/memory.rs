//! In-memory generator.

use std::cell::RefCell;

use tracing::trace;

use crate::{DeltaSink, Entry, Generator, Key, ValueTree};

/// A generator keeping its whole tree in memory.
///
/// Setting a key creates any missing ancestors with an empty value and
/// announces each of them. Deleting a key drops its subtree and announces the
/// key once. The root always exists.
///
/// # Example
///
/// ```rust
/// use treeconf_core::{key, Generator, MemoryGen};
///
/// let gen = MemoryGen::new();
/// gen.set(&key!("net/eth0/addr"), Some("10.0.0.1"));
///
/// assert_eq!(gen.get(&key!("net")), Some(String::new()));
/// assert_eq!(gen.get(&key!("NET/ETH0/ADDR")), Some("10.0.0.1".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryGen {
    root: RefCell<ValueTree>,
    deltas: DeltaSink,
}

impl MemoryGen {
    /// Create an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator holding `tree`.
    pub fn with_tree(tree: ValueTree) -> Self {
        Self {
            root: RefCell::new(tree),
            deltas: DeltaSink::new(),
        }
    }

    /// Create a generator from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: AsRef<str>,
    {
        let mut tree = ValueTree::default();
        for (key, value) in pairs {
            tree.set(&key.into(), value.as_ref());
        }
        Self::with_tree(tree)
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> ValueTree {
        self.root.borrow().clone()
    }
}

impl Generator for MemoryGen {
    fn deltas(&self) -> &DeltaSink {
        &self.deltas
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.root.borrow().get(key).map(str::to_owned)
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        let _hold = self.deltas.hold();
        let changed: Vec<(Key, Option<String>)> = {
            let mut root = self.root.borrow_mut();
            match value {
                Some(value) => {
                    let keys = root.set(key, value);
                    keys.into_iter()
                        .map(|k| {
                            let v = root.get(&k).map(str::to_owned);
                            (k, v)
                        })
                        .collect()
                }
                None if key.is_root() => {
                    let old = root.remove(key);
                    match old {
                        Some(old) if old != ValueTree::default() => vec![(Key::root(), None)],
                        _ => Vec::new(),
                    }
                }
                None => match root.remove(key) {
                    Some(_) => vec![(key.clone(), None)],
                    None => Vec::new(),
                },
            }
        };
        trace!(key = %key, changed = changed.len(), "memory set");
        for (k, v) in changed {
            self.deltas.delta(&k, v.as_deref());
        }
    }

    fn exists(&self, key: &Key) -> bool {
        self.root.borrow().find(key).is_some()
    }

    fn has_children(&self, key: &Key) -> bool {
        self.root
            .borrow()
            .find(key)
            .is_some_and(ValueTree::has_children)
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.root.borrow().entries(key)
    }
}
