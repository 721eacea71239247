//! Reusable checks for [`Generator`] implementations.
//!
//! Each check takes a factory returning a fresh, empty generator. Run them
//! all with [`run_all`], or call the ones that apply one at a time.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{key, DeltaSink, Depth, Entry, Generator, Key, MemoryGen, SubscriptionId};

/// Records every delta a generator dispatches, as display strings.
#[derive(Clone, Default)]
pub struct DeltaLog {
    entries: Rc<RefCell<Vec<(String, Option<String>)>>>,
}

impl DeltaLog {
    /// Subscribe a new log to `generator`.
    pub fn attach<G: Generator + ?Sized>(generator: &G) -> Self {
        let (log, _) = Self::attach_sink(generator.deltas());
        log
    }

    /// Subscribe a new log directly to a sink.
    pub fn attach_sink(sink: &DeltaSink) -> (Self, SubscriptionId) {
        let log = Self::default();
        let entries = Rc::clone(&log.entries);
        let id = sink.subscribe(move |key, value| {
            entries
                .borrow_mut()
                .push((key.to_string(), value.map(str::to_owned)));
        });
        (log, id)
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<(String, Option<String>)> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// True if a delta for `key` with `value` was recorded.
    pub fn contains(&self, key: &str, value: Option<&str>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|(k, v)| k == key && v.as_deref() == value)
    }
}

/// An in-memory generator that reports itself unavailable and fails every
/// commit and refresh. Writes still land.
#[derive(Debug, Default)]
pub struct BrokenGen {
    inner: MemoryGen,
}

impl BrokenGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing store, readable regardless of availability.
    pub fn inner(&self) -> &MemoryGen {
        &self.inner
    }
}

impl Generator for BrokenGen {
    fn deltas(&self) -> &DeltaSink {
        self.inner.deltas()
    }

    fn get(&self, key: &Key) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        self.inner.set(key, value)
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        self.inner.children(key)
    }

    fn commit(&self, _key: &Key, _depth: Depth) -> bool {
        false
    }

    fn refresh(&self, _key: &Key, _depth: Depth) -> bool {
        false
    }

    fn is_ok(&self) -> bool {
        false
    }
}

fn names(entries: Vec<Entry>) -> Vec<String> {
    let mut names: Vec<String> = entries.into_iter().map(|e| e.key.to_string()).collect();
    names.sort();
    names
}

pub fn set_then_get_works<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    assert_eq!(gen.get(&key!("a")), None);
    gen.set(&key!("a"), Some("1"));
    assert_eq!(gen.get(&key!("a")), Some("1".to_string()));
    gen.set(&key!("a"), Some("2"));
    assert_eq!(gen.get(&key!("a")), Some("2".to_string()));
    assert!(gen.exists(&key!("a")));
}

pub fn set_creates_ancestors<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("x/y/z"), Some("v"));
    assert_eq!(gen.get(&key!("x")), Some(String::new()));
    assert_eq!(gen.get(&key!("x/y")), Some(String::new()));
    assert!(gen.has_children(&key!("x")));
    assert!(!gen.has_children(&key!("x/y/z")));
}

pub fn delete_removes_subtree<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("x/y/z"), Some("v"));
    gen.set(&key!("x/w"), Some("w"));
    gen.set(&key!("x/y"), None);
    assert_eq!(gen.get(&key!("x/y")), None);
    assert_eq!(gen.get(&key!("x/y/z")), None);
    assert!(!gen.exists(&key!("x/y/z")));
    assert_eq!(gen.get(&key!("x/w")), Some("w".to_string()));

    gen.set(&key!("never/was"), None);
    assert_eq!(gen.get(&key!("never/was")), None);
}

pub fn keys_are_case_insensitive<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("Net/Eth0"), Some("up"));
    assert_eq!(gen.get(&key!("net/ETH0")), Some("up".to_string()));
    gen.set(&key!("NET/eth0"), Some("down"));
    assert_eq!(gen.get(&key!("Net/Eth0")), Some("down".to_string()));
    assert_eq!(names(gen.children(&key!("net"))), vec!["Eth0"]);
}

pub fn children_are_immediate<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("a/b"), Some("1"));
    gen.set(&key!("a/c/d"), Some("2"));
    assert_eq!(names(gen.children(&key!("a"))), vec!["b", "c"]);
    assert!(gen.children(&key!("a/b")).is_empty());
    assert!(gen.children(&key!("missing")).is_empty());

    let c = gen
        .children(&key!("a"))
        .into_iter()
        .find(|e| e.key == key!("c"));
    assert_eq!(c.map(|e| e.value), Some(String::new()));
}

pub fn descendants_are_relative<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("a/b"), Some("1"));
    gen.set(&key!("a/c/d"), Some("2"));
    assert_eq!(names(gen.descendants(&key!("a"))), vec!["b", "c", "c/d"]);
}

pub fn set_announces_value<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    let log = DeltaLog::attach(&gen);
    gen.set(&key!("k"), Some("v"));
    assert!(log.contains("k", Some("v")));
    log.take();

    gen.set(&key!("k"), None);
    assert!(log.contains("k", None));
}

pub fn bulk_operations_succeed<G: Generator>(factory: fn() -> G) {
    let gen = factory();
    gen.set(&key!("k"), Some("v"));
    assert!(gen.commit(&Key::root(), Depth::Infinite));
    assert!(gen.refresh(&Key::root(), Depth::Infinite));
    assert!(gen.is_ok());
}

/// Run every check against `factory`.
pub fn run_all<G: Generator>(factory: fn() -> G) {
    set_then_get_works(factory);
    set_creates_ancestors(factory);
    delete_removes_subtree(factory);
    keys_are_case_insensitive(factory);
    children_are_immediate(factory);
    descendants_are_relative(factory);
    set_announces_value(factory);
    bulk_operations_succeed(factory);
}
