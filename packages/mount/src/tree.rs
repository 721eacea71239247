//! MountTree: compose generators under one namespace.
//!
//! Generators are mounted at paths. Reads resolve from the deepest mount
//! point on the key's path upward, newest binding first, so the most
//! specific and most recent generator answers. Each mounted generator sees
//! keys relative to its mount point, and its deltas are re-announced by the
//! tree with the mount point prefixed.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};
use treeconf_core::{DeltaSink, Depth, Entry, Generator, Key, SubscriptionId};

use crate::scaffold::{NodeId, Scaffold};

/// Identifies one mounted generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountId(u64);

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Binding {
    id: MountId,
    generator: Rc<dyn Generator>,
    subscription: SubscriptionId,
}

/// A generator that covers some key, with the key rebased onto it.
#[derive(Clone)]
pub struct MountRef {
    pub id: MountId,
    /// Where the generator is mounted.
    pub mount_point: Key,
    /// The key as the generator sees it.
    pub relative: Key,
    pub generator: Rc<dyn Generator>,
}

impl fmt::Debug for MountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountRef")
            .field("id", &self.id)
            .field("mount_point", &self.mount_point)
            .field("relative", &self.relative)
            .finish_non_exhaustive()
    }
}

/// Information about a mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub id: MountId,
    pub path: Key,
}

#[derive(Clone, Copy, Debug)]
enum SyncOp {
    Commit,
    Refresh,
}

impl SyncOp {
    fn apply(self, generator: &dyn Generator, key: &Key, depth: Depth) -> bool {
        match self {
            SyncOp::Commit => generator.commit(key, depth),
            SyncOp::Refresh => generator.refresh(key, depth),
        }
    }
}

/// Depth applied `levels` nodes below the key, if the depth reaches that far.
fn depth_at(depth: Depth, levels: usize) -> Option<Depth> {
    let mut current = depth;
    for _ in 0..levels {
        if !current.recurses() {
            return None;
        }
        current = current.below();
    }
    Some(current)
}

/// A generator made of generators mounted at paths.
///
/// # Example
///
/// ```rust
/// use treeconf_core::{key, Generator, MemoryGen};
/// use treeconf_mount::MountTree;
///
/// let tree = MountTree::new();
/// tree.mount(&key!("a/b"), MemoryGen::from_pairs([("c", "x")]));
///
/// assert_eq!(tree.get(&key!("a/b/c")), Some("x".to_string()));
/// assert_eq!(tree.get(&key!("a")), Some(String::new()));
/// assert!(tree.has_children(&key!("a")));
/// ```
pub struct MountTree {
    scaffold: RefCell<Scaffold<Binding>>,
    deltas: Rc<DeltaSink>,
    next_id: Cell<u64>,
}

impl Default for MountTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTree {
    pub fn new() -> Self {
        Self {
            scaffold: RefCell::new(Scaffold::new()),
            deltas: Rc::new(DeltaSink::new()),
            next_id: Cell::new(0),
        }
    }

    /// Mount `generator` at `path`, ahead of anything already mounted there.
    pub fn mount<G: Generator + 'static>(&self, path: &Key, generator: G) -> MountId {
        self.mount_shared(path, Rc::new(generator))
    }

    /// Mount a boxed generator, as produced by a [`crate::GeneratorFactory`].
    pub fn mount_boxed(&self, path: &Key, generator: Box<dyn Generator>) -> MountId {
        self.mount_shared(path, Rc::from(generator))
    }

    /// Mount a generator that is also held elsewhere.
    pub fn mount_shared(&self, path: &Key, generator: Rc<dyn Generator>) -> MountId {
        let id = MountId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let mount_point = path.with_trailing_slash(false);
        let sink = Rc::downgrade(&self.deltas);
        let prefix = mount_point.clone();
        let subscription = generator.deltas().subscribe(move |key, value| {
            if let Some(sink) = sink.upgrade() {
                sink.delta(&prefix.join(key), value);
            }
        });

        {
            let mut scaffold = self.scaffold.borrow_mut();
            let node = scaffold.ensure(&mount_point);
            scaffold.push(
                node,
                Binding {
                    id,
                    generator,
                    subscription,
                },
            );
        }

        debug!(mount = %id, path = %mount_point, "mounted generator");
        self.deltas.delta(&mount_point, None);
        id
    }

    /// Remove a mounted generator and hand it back.
    ///
    /// With `commit` set, the generator commits everything first. Scaffold
    /// nodes left empty are pruned.
    pub fn unmount(&self, id: MountId, commit: bool) -> Option<Rc<dyn Generator>> {
        if commit {
            let (_, path, generator) = self.locate(id)?;
            if !generator.commit(&Key::root(), Depth::Infinite) {
                warn!(mount = %id, path = %path, "commit before unmount failed");
            }
        }

        // Re-resolve: the commit may have reshaped the scaffold.
        let (node, path, _) = self.locate(id)?;
        let binding = self
            .scaffold
            .borrow_mut()
            .remove_where(node, |binding| binding.id == id)?;
        binding.generator.deltas().unsubscribe(binding.subscription);

        debug!(mount = %id, path = %path, "unmounted generator");
        self.deltas.delta(&path, None);
        Some(binding.generator)
    }

    fn locate(&self, id: MountId) -> Option<(NodeId, Key, Rc<dyn Generator>)> {
        let scaffold = self.scaffold.borrow();
        let mut nodes = vec![(Key::root(), NodeId::ROOT)];
        nodes.extend(scaffold.below(NodeId::ROOT));
        nodes.into_iter().find_map(|(path, node)| {
            scaffold
                .bindings(node)
                .iter()
                .find(|binding| binding.id == id)
                .map(|binding| (node, path, Rc::clone(&binding.generator)))
        })
    }

    /// Every mount, in path order and newest first within a path.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.scaffold
            .borrow()
            .iter()
            .into_iter()
            .map(|(path, binding)| MountInfo { id: binding.id, path })
            .collect()
    }

    /// The generator mounted under `id`.
    pub fn generator(&self, id: MountId) -> Option<Rc<dyn Generator>> {
        self.locate(id).map(|(_, _, generator)| generator)
    }

    /// Every generator whose mount point is `key` or one of its ancestors, in
    /// read order: deepest mount point first, newest binding first.
    pub fn covering(&self, key: &Key) -> Vec<MountRef> {
        let scaffold = self.scaffold.borrow();
        let mut found = Vec::new();
        for (depth, node) in scaffold.ancestors(key) {
            let bindings = scaffold.bindings(node);
            if bindings.is_empty() {
                continue;
            }
            let mount_point = scaffold.path_of(node);
            let relative = key.remove_first(depth);
            for binding in bindings {
                found.push(MountRef {
                    id: binding.id,
                    mount_point: mount_point.clone(),
                    relative: relative.clone(),
                    generator: Rc::clone(&binding.generator),
                });
            }
        }
        found
    }

    /// The generator a write to `key` goes to.
    ///
    /// That is the first covering generator, in read order, that already has
    /// the key. If none has it, the newest generator at the deepest covering
    /// mount point.
    pub fn which_mount(&self, key: &Key) -> Option<MountRef> {
        let mut covering = self.covering(key);
        if covering.is_empty() {
            return None;
        }
        let owner = covering
            .iter()
            .position(|mount| mount.generator.exists(&mount.relative))
            .unwrap_or(0);
        Some(covering.swap_remove(owner))
    }

    /// Generators mounted strictly below `key`, with their paths relative
    /// to it.
    fn nested(&self, key: &Key) -> Vec<(Key, Rc<dyn Generator>)> {
        let scaffold = self.scaffold.borrow();
        let Some(node) = scaffold.find(key) else {
            return Vec::new();
        };
        scaffold
            .below(node)
            .into_iter()
            .flat_map(|(path, id)| {
                scaffold
                    .bindings(id)
                    .iter()
                    .map(|binding| (path.clone(), Rc::clone(&binding.generator)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn sync(&self, op: SyncOp, key: &Key, depth: Depth) -> bool {
        let _hold = self.deltas.hold();
        let mut ok = true;

        for mount in self.covering(key) {
            if !op.apply(mount.generator.as_ref(), &mount.relative, depth) {
                warn!(?op, mount = %mount.id, key = %key, "generator failed");
                ok = false;
            }
        }

        for (path, generator) in self.nested(key) {
            let Some(below) = depth_at(depth, path.len()) else {
                continue;
            };
            if !op.apply(generator.as_ref(), &Key::root(), below) {
                warn!(?op, path = %key.join(&path), "nested generator failed");
                ok = false;
            }
        }

        debug!(?op, key = %key, ?depth, ok, "mount tree sync");
        ok
    }
}

impl Drop for MountTree {
    fn drop(&mut self) {
        for (_, binding) in self.scaffold.get_mut().iter() {
            binding.generator.deltas().unsubscribe(binding.subscription);
        }
    }
}

impl fmt::Debug for MountTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountTree")
            .field("mounts", &self.mounts())
            .field("deltas", &self.deltas)
            .finish()
    }
}

impl Generator for MountTree {
    fn deltas(&self) -> &DeltaSink {
        &self.deltas
    }

    fn get(&self, key: &Key) -> Option<String> {
        for mount in self.covering(key) {
            if !mount.generator.is_ok() {
                trace!(mount = %mount.id, key = %key, "skipping unavailable generator");
                continue;
            }
            if let Some(value) = mount.generator.get(&mount.relative) {
                return Some(value);
            }
        }
        let node = self.scaffold.borrow().find(key);
        node.map(|_| String::new())
    }

    fn set(&self, key: &Key, value: Option<&str>) {
        let _hold = self.deltas.hold();
        match value {
            Some(value) => match self.which_mount(key) {
                Some(mount) => {
                    trace!(mount = %mount.id, key = %key, "routing write");
                    mount.generator.set(&mount.relative, Some(value));
                }
                None => warn!(key = %key, "no generator covers key; dropping write"),
            },
            None => {
                for mount in self.covering(key) {
                    if mount.generator.exists(&mount.relative) {
                        mount.generator.set(&mount.relative, None);
                    }
                }
                for (_, generator) in self.nested(key) {
                    generator.set(&Key::root(), None);
                }
            }
        }
    }

    fn exists(&self, key: &Key) -> bool {
        let node = self.scaffold.borrow().find(key);
        node.is_some()
            || self
                .covering(key)
                .iter()
                .any(|mount| mount.generator.is_ok() && mount.generator.exists(&mount.relative))
    }

    fn has_children(&self, key: &Key) -> bool {
        let scaffolded = {
            let scaffold = self.scaffold.borrow();
            scaffold
                .find(key)
                .is_some_and(|node| scaffold.has_children(node))
        };
        scaffolded
            || self.covering(key).iter().any(|mount| {
                mount.generator.is_ok() && mount.generator.has_children(&mount.relative)
            })
    }

    fn children(&self, key: &Key) -> Vec<Entry> {
        let mut names = BTreeSet::new();
        {
            let scaffold = self.scaffold.borrow();
            if let Some(node) = scaffold.find(key) {
                names.extend(scaffold.children(node).into_iter().map(|(name, _)| name));
            }
        }
        for mount in self.covering(key) {
            if mount.generator.is_ok() {
                names.extend(
                    mount
                        .generator
                        .children(&mount.relative)
                        .into_iter()
                        .map(|entry| entry.key),
                );
            }
        }
        names
            .into_iter()
            .filter_map(|name| {
                let value = self.get(&key.join(&name))?;
                Some(Entry::new(name, value))
            })
            .collect()
    }

    fn commit(&self, key: &Key, depth: Depth) -> bool {
        self.sync(SyncOp::Commit, key, depth)
    }

    fn refresh(&self, key: &Key, depth: Depth) -> bool {
        self.sync(SyncOp::Refresh, key, depth)
    }
}
