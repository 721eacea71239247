//! Change notification: subscribers, holds and coalescing.
//!
//! Every generator owns one [`DeltaSink`]. A generator announces that the
//! value at a key changed by calling [`DeltaSink::delta`]; a value of `None`
//! tells subscribers to re-fetch that key and its whole subtree.
//!
//! Delivery is synchronous. Callbacks run on the caller's stack and may call
//! back into any generator, so the sink never holds a borrow while a callback
//! runs.
//!
//! Bulk operations wrap themselves in [`DeltaSink::hold`]. While at least one
//! hold is live, deltas are coalesced per key (the last value wins, first-touch
//! order is kept) and the outermost release flushes one delta per touched key.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::Key;

/// A registered delta callback.
pub type DeltaCallback = Rc<dyn Fn(&Key, Option<&str>)>;

/// Handle returned by [`DeltaSink::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct PendingDeltas {
    order: Vec<(Key, Option<String>)>,
    index: HashMap<Key, usize>,
}

impl PendingDeltas {
    fn record(&mut self, key: &Key, value: Option<&str>) {
        let value = value.map(str::to_owned);
        match self.index.get(key) {
            Some(&slot) => self.order[slot].1 = value,
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key.clone(), value));
            }
        }
    }
}

/// Per-generator notification hub.
pub struct DeltaSink {
    subscribers: RefCell<Vec<(SubscriptionId, DeltaCallback)>>,
    next_id: Cell<u64>,
    holds: Cell<usize>,
    pending: RefCell<PendingDeltas>,
}

impl Default for DeltaSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaSink {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            holds: Cell::new(0),
            pending: RefCell::new(PendingDeltas::default()),
        }
    }

    /// Register a callback for every delta this sink dispatches.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Key, Option<&str>) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers
            .borrow_mut()
            .push((id, Rc::new(callback) as DeltaCallback));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Announce a change at `key`.
    pub fn delta(&self, key: &Key, value: Option<&str>) {
        if self.holds.get() > 0 {
            self.pending.borrow_mut().record(key, value);
        } else {
            self.dispatch(key, value);
        }
    }

    fn dispatch(&self, key: &Key, value: Option<&str>) {
        let callbacks: Vec<DeltaCallback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(key, value);
        }
    }

    /// Suppress dispatch until the returned guard is dropped.
    pub fn hold(&self) -> DeltaHold<'_> {
        self.hold_delta();
        DeltaHold { sink: self }
    }

    /// Raw counterpart of [`DeltaSink::hold`]. Must be paired with
    /// [`DeltaSink::unhold_delta`].
    pub fn hold_delta(&self) {
        self.holds.set(self.holds.get() + 1);
    }

    /// Release one hold, flushing coalesced deltas when the last one goes.
    pub fn unhold_delta(&self) {
        let holds = self.holds.get();
        debug_assert!(holds > 0, "unhold_delta without matching hold_delta");
        let holds = holds.saturating_sub(1);
        self.holds.set(holds);
        if holds == 0 {
            self.flush();
        }
    }

    pub fn is_held(&self) -> bool {
        self.holds.get() > 0
    }

    fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if pending.order.is_empty() {
            return;
        }
        trace!(count = pending.order.len(), "flushing held deltas");
        for (key, value) in pending.order {
            self.dispatch(&key, value.as_deref());
        }
    }
}

impl fmt::Debug for DeltaSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaSink")
            .field("subscribers", &self.subscriber_count())
            .field("holds", &self.holds.get())
            .field("pending", &self.pending.borrow().order.len())
            .finish()
    }
}

/// Scoped hold on a [`DeltaSink`]; releases on drop.
#[must_use = "dropping the guard releases the hold immediately"]
pub struct DeltaHold<'a> {
    sink: &'a DeltaSink,
}

impl Drop for DeltaHold<'_> {
    fn drop(&mut self) {
        self.sink.unhold_delta();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;

    type Log = Rc<RefCell<Vec<(String, Option<String>)>>>;

    fn record(sink: &DeltaSink) -> (Log, SubscriptionId) {
        let log: Log = Rc::default();
        let sink_log = Rc::clone(&log);
        let id = sink.subscribe(move |key, value| {
            sink_log
                .borrow_mut()
                .push((key.to_string(), value.map(str::to_owned)));
        });
        (log, id)
    }

    #[test]
    fn dispatches_immediately_when_not_held() {
        let sink = DeltaSink::new();
        let (log, _) = record(&sink);
        sink.delta(&key!("a"), Some("1"));
        sink.delta(&key!("b"), None);
        assert_eq!(
            *log.borrow(),
            vec![("a".to_string(), Some("1".to_string())), ("b".to_string(), None)]
        );
    }

    #[test]
    fn hold_coalesces_per_key() {
        let sink = DeltaSink::new();
        let (log, _) = record(&sink);
        {
            let _hold = sink.hold();
            sink.delta(&key!("a"), Some("1"));
            sink.delta(&key!("b"), Some("2"));
            sink.delta(&key!("A"), Some("3"));
            assert!(log.borrow().is_empty());
        }
        assert_eq!(
            *log.borrow(),
            vec![
                ("a".to_string(), Some("3".to_string())),
                ("b".to_string(), Some("2".to_string()))
            ]
        );
    }

    #[test]
    fn nested_holds_flush_once_at_outermost_release() {
        let sink = DeltaSink::new();
        let (log, _) = record(&sink);
        sink.hold_delta();
        sink.hold_delta();
        sink.delta(&key!("x"), Some("1"));
        sink.unhold_delta();
        assert!(log.borrow().is_empty());
        assert!(sink.is_held());
        sink.unhold_delta();
        assert_eq!(log.borrow().len(), 1);
        assert!(!sink.is_held());
    }

    #[test]
    fn hold_guard_releases_on_early_return() {
        fn bail(sink: &DeltaSink, fail: bool) -> Result<(), String> {
            let _hold = sink.hold();
            sink.delta(&key!("k"), Some("v"));
            if fail {
                return Err("bailed".to_string());
            }
            Ok(())
        }

        let sink = DeltaSink::new();
        let (log, _) = record(&sink);
        assert!(bail(&sink, true).is_err());
        assert!(!sink.is_held());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let sink = DeltaSink::new();
        let (log, id) = record(&sink);
        assert_eq!(sink.subscriber_count(), 1);
        assert!(sink.unsubscribe(id));
        assert!(!sink.unsubscribe(id));
        sink.delta(&key!("a"), Some("1"));
        assert!(log.borrow().is_empty());
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_reenter_the_sink() {
        let sink = Rc::new(DeltaSink::new());
        let (log, _) = record(&sink);
        let weak = Rc::downgrade(&sink);
        sink.subscribe(move |key, _| {
            if *key == key!("first") {
                if let Some(sink) = weak.upgrade() {
                    sink.delta(&key!("second"), Some("echo"));
                }
            }
        });
        sink.delta(&key!("first"), Some("1"));
        let seen: Vec<String> = log.borrow().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[test]
    fn callbacks_may_subscribe_during_dispatch() {
        let sink = Rc::new(DeltaSink::new());
        let weak = Rc::downgrade(&sink);
        sink.subscribe(move |_, _| {
            if let Some(sink) = weak.upgrade() {
                sink.subscribe(|_, _| {});
            }
        });
        sink.delta(&key!("a"), None);
        assert_eq!(sink.subscriber_count(), 2);
    }
}
