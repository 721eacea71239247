//! Build mount trees from configuration.
//!
//! Generator configurations are JSON objects tagged by `type`:
//! ```json
//! {"type": "memory", "values": {"net/addr": "10.0.0.1"}}
//! {"type": "null"}
//! {"type": "readonly", "inner": {"type": "memory"}}
//! {"type": "subtree", "prefix": "sys/net", "inner": {"type": "memory"}}
//! ```
//!
//! The same configurations can be written as monikers: `memory:`, `null:`,
//! `readonly:<moniker>` and `subtree:<prefix>:<moniker>`.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use treeconf_core::{Generator, Key, MemoryGen, NullGen, ReadOnlyGen, SubtreeGen};

use crate::{Error, MountId, MountTree};

/// Configuration for one generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// In-memory tree, optionally pre-populated
    Memory {
        #[serde(default)]
        values: BTreeMap<String, String>,
    },
    /// Always empty, ignores writes
    Null,
    /// Drops writes to the inner generator
    ReadOnly { inner: Box<GeneratorConfig> },
    /// Exposes the inner generator's subtree at `prefix`
    Subtree {
        prefix: String,
        inner: Box<GeneratorConfig>,
    },
}

impl FromStr for GeneratorConfig {
    type Err = Error;

    fn from_str(moniker: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownMoniker {
            moniker: moniker.to_string(),
        };
        let (kind, rest) = moniker.split_once(':').ok_or_else(unknown)?;
        match kind {
            "memory" => Ok(GeneratorConfig::Memory {
                values: BTreeMap::new(),
            }),
            "null" => Ok(GeneratorConfig::Null),
            "readonly" => Ok(GeneratorConfig::ReadOnly {
                inner: Box::new(rest.parse()?),
            }),
            "subtree" => {
                let (prefix, inner) = rest.split_once(':').ok_or_else(unknown)?;
                Ok(GeneratorConfig::Subtree {
                    prefix: prefix.to_string(),
                    inner: Box::new(inner.parse()?),
                })
            }
            _ => Err(unknown()),
        }
    }
}

/// A generator to mount and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountConfig {
    pub path: Key,
    pub generator: GeneratorConfig,
}

/// A whole registry: mounts applied in order, so later entries at the same
/// path take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

impl RegistryConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A factory for creating generators from configurations
pub trait GeneratorFactory {
    fn create(&self, config: &GeneratorConfig) -> Result<Box<dyn Generator>, Error>;
}

/// Creates the generators that ship with treeconf.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFactory;

impl GeneratorFactory for BuiltinFactory {
    fn create(&self, config: &GeneratorConfig) -> Result<Box<dyn Generator>, Error> {
        Ok(match config {
            GeneratorConfig::Memory { values } => Box::new(MemoryGen::from_pairs(
                values.iter().map(|(key, value)| (key.as_str(), value)),
            )),
            GeneratorConfig::Null => Box::new(NullGen::new()),
            GeneratorConfig::ReadOnly { inner } => Box::new(ReadOnlyGen::new(self.create(inner)?)),
            GeneratorConfig::Subtree { prefix, inner } => {
                Box::new(SubtreeGen::new(self.create(inner)?, Key::new(prefix)))
            }
        })
    }
}

impl MountTree {
    /// Build a tree with every mount in `config`, in order.
    pub fn from_config(
        config: &RegistryConfig,
        factory: &dyn GeneratorFactory,
    ) -> Result<MountTree, Error> {
        let tree = MountTree::new();
        for mount in &config.mounts {
            tree.mount_config(mount, factory)?;
        }
        debug!(mounts = config.mounts.len(), "built mount tree from config");
        Ok(tree)
    }

    /// Create the generator `config` describes and mount it.
    pub fn mount_config(
        &self,
        config: &MountConfig,
        factory: &dyn GeneratorFactory,
    ) -> Result<MountId, Error> {
        let generator = factory.create(&config.generator)?;
        Ok(self.mount_boxed(&config.path, generator))
    }
}
