//! [`TransactionGen`]: a generator that buffers writes until commit.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};
use treeconf_core::{DeltaSink, Depth, Entry, Generator, Key, SubscriptionId, ValueTree};

use crate::change::{Change, ChangeNode, Listing, Lookup};

struct TxState {
    changes: RefCell<ChangeNode>,
    deltas: DeltaSink,
}

/// Makes writes to an inner generator provisional.
///
/// Writes land in a change tree. Reads answer as if the changes were already
/// committed, without touching the inner generator. [`Generator::commit`]
/// replays the changes into the inner generator; [`Generator::refresh`]
/// drops them and announces whatever observers must re-read.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use treeconf_core::{key, Depth, Generator, Key, MemoryGen};
/// use treeconf_transaction::TransactionGen;
///
/// let inner = Rc::new(MemoryGen::new());
/// let tx = TransactionGen::new(Rc::clone(&inner));
///
/// tx.set(&key!("x/y"), Some("1"));
/// assert_eq!(tx.get(&key!("x/y")), Some("1".to_string()));
/// assert_eq!(inner.get(&key!("x/y")), None);
///
/// assert!(tx.commit(&Key::root(), Depth::Infinite));
/// assert_eq!(inner.get(&key!("x")), Some(String::new()));
/// assert_eq!(inner.get(&key!("x/y")), Some("1".to_string()));
/// ```
pub struct TransactionGen<G: Generator> {
    inner: G,
    state: Rc<TxState>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl<G: Generator> TransactionGen<G> {
    pub fn new(inner: G) -> Self {
        let state = Rc::new(TxState {
            changes: RefCell::new(ChangeNode::default()),
            deltas: DeltaSink::new(),
        });
        let subscription = Self::watch(&inner, &state);
        Self {
            inner,
            state,
            subscription: Cell::new(Some(subscription)),
        }
    }

    /// Forward inner deltas the pending changes do not mask.
    fn watch(inner: &G, state: &Rc<TxState>) -> SubscriptionId {
        let state = Rc::downgrade(state);
        inner.deltas().subscribe(move |key, value| {
            let Some(state) = state.upgrade() else {
                return;
            };
            let admit = match state.changes.try_borrow_mut() {
                Ok(mut changes) => changes.admits(key, value),
                Err(_) => true,
            };
            if admit {
                state.deltas.delta(key, value);
            } else {
                trace!(key = %key, "masked inner delta");
            }
        })
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// True while uncommitted changes are buffered.
    pub fn has_pending(&self) -> bool {
        !self.state.changes.borrow().is_empty()
    }

    fn emit(&self, key: &Key, value: Option<&str>) {
        self.state.deltas.delta(key, value);
    }

    fn replay(&self, key: &Key, node: &ChangeNode) {
        match &node.change {
            Change::Unchanged => {}
            Change::Literal(value) => self.inner.set(key, Some(value.as_str())),
            Change::EnsureExists { .. } => {
                if !self.inner.exists(key) {
                    self.inner.set(key, Some(""));
                }
            }
            Change::Replace(snapshot) => {
                self.inner.set(key, None);
                if let Some(tree) = snapshot {
                    self.write_tree(key, tree);
                }
            }
        }
        for (name, child) in &node.children {
            self.replay(&key.join(name), child);
        }
    }

    fn write_tree(&self, key: &Key, tree: &ValueTree) {
        self.inner.set(key, Some(tree.value()));
        for (name, child) in tree.children() {
            self.write_tree(&key.join(name), child);
        }
    }

    /// Announce every difference between what the dropped changes showed at
    /// `key` and what the inner generator holds.
    fn unwind(&self, key: &Key, node: &ChangeNode) {
        match &node.change {
            Change::Unchanged => {}
            Change::Literal(value) => {
                let actual = self.inner.get(key);
                if actual.as_deref() != Some(value.as_str()) {
                    self.emit(key, actual.as_deref());
                }
            }
            Change::EnsureExists { .. } => {
                if !self.inner.exists(key) {
                    self.emit(key, None);
                }
            }
            Change::Replace(snapshot) => {
                self.unwind_tree(key, snapshot.as_ref());
                return;
            }
        }
        for (name, child) in &node.children {
            self.unwind(&key.join(name), child);
        }
    }

    fn unwind_tree(&self, key: &Key, shown: Option<&ValueTree>) {
        let actual = self.inner.get(key);
        if actual.as_deref() != shown.map(ValueTree::value) {
            self.emit(key, actual.as_deref());
        }

        // Descendants get their own deltas even when `key` itself is gone.
        let mut names: BTreeSet<Key> = BTreeSet::new();
        if let Some(tree) = shown {
            names.extend(tree.children().map(|(name, _)| name.clone()));
        }
        names.extend(self.inner.children(key).into_iter().map(|entry| entry.key));
        for name in names {
            let child = shown.and_then(|tree| tree.child(&name));
            self.unwind_tree(&key.join(&name), child);
        }
    }
}

impl<G: Generator> Drop for TransactionGen<G> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.inner.deltas().unsubscribe(id);
        }
    }
}

impl<G: Generator + fmt::Debug> fmt::Debug for TransactionGen<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionGen")
            .field("inner", &self.inner)
            .field("changes", &self.state.changes.borrow())
            .finish()
    }
}

impl<G: Generator> Generator for TransactionGen<G> {
    fn deltas(&self) -> &DeltaSink {
        &self.state.deltas
    }

    fn get(&self, key: &Key) -> Option<String> {
        let lookup = self.state.changes.borrow().lookup(key);
        match lookup {
            Lookup::Pinned(value) => value,
            Lookup::Placeholder => Some(self.inner.get(key).unwrap_or_default()),
            Lookup::Inner => self.inner.get(key),
        }
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        if value.is_none() && !self.exists(key) {
            return;
        }
        let _hold = self.state.deltas.hold();

        let ancestors: Vec<Key> = (1..key.len()).map(|n| key.first(n)).collect();
        let before: Vec<Option<String>> = ancestors.iter().map(|k| self.get(k)).collect();
        let before_key = self.get(key);
        let doomed = match value {
            Some(_) => Vec::new(),
            None => self.descendants(key),
        };
        let inner_empty: Vec<bool> = ancestors
            .iter()
            .map(|k| self.inner.get(k).map_or(true, |v| v.is_empty()))
            .collect();

        self.state
            .changes
            .borrow_mut()
            .apply(key, value, &inner_empty);

        for (ancestor, before) in ancestors.iter().zip(before) {
            let after = self.get(ancestor);
            if after != before {
                self.emit(ancestor, after.as_deref());
            }
        }
        let after_key = self.get(key);
        if after_key != before_key {
            self.emit(key, after_key.as_deref());
        }
        for entry in doomed {
            self.emit(&key.join(&entry.key), None);
        }
    }

    fn exists(&self, key: &Key) -> bool {
        let lookup = self.state.changes.borrow().lookup(key);
        match lookup {
            Lookup::Pinned(value) => value.is_some(),
            Lookup::Placeholder => true,
            Lookup::Inner => self.inner.exists(key),
        }
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        let listing = self.state.changes.borrow().listing(key);
        match listing {
            Listing::Snapshot(entries) => entries,
            Listing::Inner => self.inner.children(key),
            Listing::Overlay(pending) => {
                let mut names: BTreeSet<Key> = pending.into_iter().collect();
                names.extend(self.inner.children(key).into_iter().map(|entry| entry.key));
                names
                    .into_iter()
                    .filter_map(|name| {
                        let value = self.get(&key.join(&name))?;
                        Some(Entry::new(name, value))
                    })
                    .collect()
            }
        }
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        let pending = std::mem::take(&mut *self.state.changes.borrow_mut());
        if !pending.is_empty() {
            if let Some(id) = self.subscription.take() {
                self.inner.deltas().unsubscribe(id);
            }
            {
                let _hold = self.inner.deltas().hold();
                self.replay(&Key::root(), &pending);
            }
            self.subscription
                .set(Some(Self::watch(&self.inner, &self.state)));
            debug!(key = %key, ?depth, "transaction replayed into inner generator");
        }
        self.inner.commit(key, depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        let _hold = self.state.deltas.hold();
        let pending = std::mem::take(&mut *self.state.changes.borrow_mut());
        if !pending.is_empty() {
            self.unwind(&Key::root(), &pending);
            debug!(key = %key, ?depth, "transaction discarded");
        }
        self.inner.refresh(key, depth)
    }

    fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }
}
