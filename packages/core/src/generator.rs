//! The generator contract: Generator, Depth, Entry.

use std::rc::Rc;

use crate::{DeltaSink, Key};

/// How far a bulk commit or refresh reaches below its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Depth {
    /// The key only.
    Zero,
    /// The key and its immediate children.
    One,
    /// The immediate children only.
    Children,
    /// Every descendant, but not the key.
    Descendants,
    /// The key and every descendant.
    Infinite,
}

impl Depth {
    /// The depth to apply at each child when recursing one level down.
    pub fn below(self) -> Depth {
        match self {
            Depth::Zero | Depth::One | Depth::Children => Depth::Zero,
            Depth::Descendants | Depth::Infinite => Depth::Infinite,
        }
    }

    /// True if this depth covers the key's children.
    pub fn recurses(self) -> bool {
        !matches!(self, Depth::Zero)
    }

    /// True if this depth covers the key itself.
    pub fn includes_key(self) -> bool {
        matches!(self, Depth::Zero | Depth::One | Depth::Infinite)
    }
}

/// One key/value pair produced by iterating a generator.
///
/// `key` is relative to the key that was iterated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: String,
}

impl Entry {
    pub fn new(key: Key, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// A source of configuration data for one subtree.
///
/// Backends, filters and composites (the mount tree, the transaction
/// generator) all implement this trait, so any of them can be nested in any
/// other.
///
/// Every method takes `&self`. Implementations keep mutable state behind
/// `Cell`/`RefCell` and must not hold a borrow while a delta is dispatched,
/// because subscribers may call straight back in.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Generator>` and
/// `Rc<dyn Generator>`.
pub trait Generator {
    /// The sink this generator announces its changes through.
    fn deltas(&self) -> &DeltaSink;

    /// Read the value at `key`. `None` means the key does not exist.
    fn get(&self, key: &Key) -> Option<String>;

    /// Write `value` at `key`. `None` deletes the key and its whole subtree.
    fn set(&self, key: &Key, value: Option<&str>);

    fn exists(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    fn has_children(&self, key: &Key) -> bool {
        !self.children(key).is_empty()
    }

    /// The immediate children of `key`, each keyed by its own segment.
    fn children(&self, key: &Key) -> Vec<Entry>;

    /// Every descendant of `key`, depth first, keyed relative to `key`.
    fn descendants(&self, key: &Key) -> Vec<Entry> {
        let mut out = Vec::new();
        let mut stack: Vec<Entry> = self.children(key).into_iter().rev().collect();
        while let Some(entry) = stack.pop() {
            let below = self.children(&key.join(&entry.key));
            stack.extend(
                below
                    .into_iter()
                    .rev()
                    .map(|child| Entry::new(entry.key.join(&child.key), child.value)),
            );
            out.push(entry);
        }
        out
    }

    /// Flush buffered state for `key` down to `depth`.
    fn commit(&self, _key: &Key, _depth: Depth) -> bool {
        true
    }

    /// Discard buffered state for `key` down to `depth` and reload.
    fn refresh(&self, _key: &Key, _depth: Depth) -> bool {
        true
    }

    /// False when the backing resource is unavailable.
    fn is_ok(&self) -> bool {
        true
    }
}

// Blanket implementations for boxes and shared handles

impl<T: Generator + ?Sized> Generator for Box<T> {
    fn deltas(&self) -> &DeltaSink {
        self.as_ref().deltas()
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        self.as_ref().set(key, value)
    }

    fn exists(&self, key: &Key) -> bool {
        self.as_ref().exists(key)
    }

    fn has_children(&self, key: &Key) -> bool {
        self.as_ref().has_children(key)
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.as_ref().children(key)
    }

    fn descendants(&self, key: &Key) -> Vec<Entry> {
        self.as_ref().descendants(key)
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        self.as_ref().commit(key, depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        self.as_ref().refresh(key, depth)
    }

    fn is_ok(&self) -> bool {
        self.as_ref().is_ok()
    }
}

impl<T: Generator + ?Sized> Generator for Rc<T> {
    fn deltas(&self) -> &DeltaSink {
        self.as_ref().deltas()
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        self.as_ref().set(key, value)
    }

    fn exists(&self, key: &Key) -> bool {
        self.as_ref().exists(key)
    }

    fn has_children(&self, key: &Key) -> bool {
        self.as_ref().has_children(key)
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.as_ref().children(key)
    }

    fn descendants(&self, key: &Key) -> Vec<Entry> {
        self.as_ref().descendants(key)
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        self.as_ref().commit(key, depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        self.as_ref().refresh(key, depth)
    }

    fn is_ok(&self) -> bool {
        self.as_ref().is_ok()
    }
}
