//! Core treeconf: keys, generators and change notification.
//!
//! A configuration registry is a tree of string values addressed by
//! slash-separated, case-insensitive [`Key`]s. Every source of values is a
//! [`Generator`]: backends hold data, filters reshape another generator, and
//! composites (the mount tree, the transaction generator) are generators made
//! of generators.
//!
//! - `Key`: canonical path with case-insensitive comparison
//! - `Generator`: the read/write/iterate/commit/refresh contract
//! - `DeltaSink`: per-generator change notification with coalescing holds
//! - `ValueTree`: owned snapshot of a subtree
//!
//! # Example
//!
//! ```rust
//! use treeconf_core::{key, Generator, MemoryGen, SubtreeGen};
//!
//! let gen = MemoryGen::new();
//! gen.set(&key!("sys/net/addr"), Some("10.0.0.1"));
//!
//! let net = SubtreeGen::new(gen, key!("sys/net"));
//! assert_eq!(net.get(&key!("addr")), Some("10.0.0.1".to_string()));
//! ```

mod delta;
mod filters;
mod generator;
mod key;
mod memory;
mod tree;

pub use delta::{DeltaCallback, DeltaHold, DeltaSink, SubscriptionId};
pub use filters::{NullGen, ReadOnlyGen, SubtreeGen};
pub use generator::{Depth, Entry, Generator};
pub use key::Key;
pub use memory::MemoryGen;
pub use tree::ValueTree;

#[cfg(any(test, feature = "test-utils"))]
pub mod trait_test_suite;
