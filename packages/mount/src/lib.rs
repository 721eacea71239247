//! Mount tree: compose generators under a single namespace.
//!
//! A [`MountTree`] is itself a [`treeconf_core::Generator`]. Generators
//! mounted in it are consulted deepest mount point first and newest first
//! within a mount point; scaffold nodes on the way to a mount point read as
//! empty values so the namespace is always navigable.
//!
//! # Example
//!
//! ```rust
//! use treeconf_core::{key, Generator, MemoryGen};
//! use treeconf_mount::{BuiltinFactory, MountTree, RegistryConfig};
//!
//! let config = RegistryConfig::from_json(
//!     r#"{"mounts": [{"path": "etc", "generator": {"type": "memory"}}]}"#,
//! )?;
//! let tree = MountTree::from_config(&config, &BuiltinFactory)?;
//! tree.mount(&key!("run"), MemoryGen::new());
//!
//! tree.set(&key!("etc/hostname"), Some("box"));
//! assert_eq!(tree.get(&key!("etc/hostname")), Some("box".to_string()));
//! # Ok::<(), treeconf_mount::Error>(())
//! ```

mod config;
mod error;
mod scaffold;
mod tree;

pub use config::{BuiltinFactory, GeneratorConfig, GeneratorFactory, MountConfig, RegistryConfig};
pub use error::Error;
pub use tree::{MountId, MountInfo, MountRef, MountTree};
