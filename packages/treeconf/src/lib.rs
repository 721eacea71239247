//! treeconf: a hierarchical configuration registry.
//!
//! Configuration lives in a tree of string values addressed by
//! case-insensitive, slash-separated keys. Every source of values is a
//! generator, and generators compose: a [`MountTree`] stitches many of them
//! into one namespace, and a [`TransactionGen`] makes writes to any of them
//! provisional until committed.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use treeconf::{key, Depth, Generator, Key, MemoryGen, MountTree, TransactionGen};
//!
//! let registry = Rc::new(MountTree::new());
//! registry.mount(&Key::root(), MemoryGen::new());
//!
//! let tx = TransactionGen::new(Rc::clone(&registry));
//! tx.set(&key!("net/eth0/addr"), Some("10.0.0.1"));
//! assert_eq!(registry.get(&key!("net/eth0/addr")), None);
//!
//! tx.commit(&Key::root(), Depth::Infinite);
//! assert_eq!(registry.get(&key!("net/eth0/addr")), Some("10.0.0.1".to_string()));
//! ```

pub use treeconf_core::{
    key, DeltaCallback, DeltaHold, DeltaSink, Depth, Entry, Generator, Key, MemoryGen, NullGen,
    ReadOnlyGen, SubscriptionId, SubtreeGen, ValueTree,
};
pub use treeconf_mount::{
    BuiltinFactory, Error, GeneratorConfig, GeneratorFactory, MountConfig, MountId, MountInfo,
    MountRef, MountTree, RegistryConfig,
};
pub use treeconf_transaction::TransactionGen;
