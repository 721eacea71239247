//! Small generators that wrap or stand in for other generators.

use std::rc::Rc;

use tracing::warn;

use crate::{DeltaSink, Depth, Entry, Generator, Key, SubscriptionId};

/// A generator that is always empty and ignores writes.
#[derive(Debug, Default)]
pub struct NullGen {
    deltas: DeltaSink,
}

impl NullGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for NullGen {
    fn deltas(&self) -> &DeltaSink {
        &self.deltas
    }

    fn get(&self, _key: &Key) -> Option<String> {
        None
    }

    fn set(&self, _key: &Key, _value: Option<&str>) {}

    fn children(&self, _key: &Key) -> Vec<Entry> {
        Vec::new()
    }
}

/// Wraps a generator to drop all writes.
///
/// Reads, commits and refreshes pass through, and so do the inner
/// generator's deltas: this wrapper shares the inner sink.
pub struct ReadOnlyGen<G> {
    inner: G,
}

impl<G> ReadOnlyGen<G> {
    /// Create a new read-only wrapper.
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    /// Get a reference to the inner generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: Generator> Generator for ReadOnlyGen<G> {
    fn deltas(&self) -> &DeltaSink {
        self.inner.deltas()
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &Key, _value: Option<&str>) {
        warn!(key = %key, "dropping write to read-only generator");
    }

    fn exists(&self, key: &Key) -> bool {
        self.inner.exists(key)
    }

    fn has_children(&self, key: &Key) -> bool {
        self.inner.has_children(key)
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.inner.children(key)
    }

    fn descendants(&self, key: &Key) -> Vec<Entry> {
        self.inner.descendants(key)
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        self.inner.commit(key, depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        self.inner.refresh(key, depth)
    }

    fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }
}

/// Views the subtree of a generator at `prefix` as a generator of its own.
///
/// Deltas from the inner generator are rebased: changes below the prefix
/// arrive with the prefix stripped, a re-fetch of the prefix or any of its
/// ancestors arrives as a re-fetch of the root, and everything else is
/// dropped.
pub struct SubtreeGen<G: Generator> {
    inner: G,
    prefix: Key,
    deltas: Rc<DeltaSink>,
    subscription: SubscriptionId,
}

impl<G: Generator> SubtreeGen<G> {
    /// Create a new subtree view.
    pub fn new(inner: G, prefix: Key) -> Self {
        let deltas = Rc::new(DeltaSink::new());
        let sink = Rc::downgrade(&deltas);
        let watched = prefix.clone();
        let subscription = inner.deltas().subscribe(move |key, value| {
            let Some(sink) = sink.upgrade() else {
                return;
            };
            if let Some(relative) = key.strip_prefix(&watched) {
                sink.delta(&relative, value);
            } else if value.is_none() && watched.has_prefix(key) {
                sink.delta(&Key::root(), None);
            }
        });
        Self {
            inner,
            prefix,
            deltas,
            subscription,
        }
    }

    pub fn prefix(&self) -> &Key {
        &self.prefix
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    fn outer(&self, key: &Key) -> Key {
        self.prefix.join(key)
    }
}

impl<G: Generator> Drop for SubtreeGen<G> {
    fn drop(&mut self) {
        self.inner.deltas().unsubscribe(self.subscription);
    }
}

impl<G: Generator> Generator for SubtreeGen<G> {
    fn deltas(&self) -> &DeltaSink {
        &self.deltas
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.inner.get(&self.outer(key))
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        self.inner.set(&self.outer(key), value)
    }

    fn exists(&self, key: &Key) -> bool {
        self.inner.exists(&self.outer(key))
    }

    fn has_children(&self, key: &Key) -> bool {
        self.inner.has_children(&self.outer(key))
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.inner.children(&self.outer(key))
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        self.inner.commit(&self.outer(key), depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        self.inner.refresh(&self.outer(key), depth)
    }

    fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }
}
