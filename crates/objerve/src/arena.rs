//! Node storage.
//!
//! Every observed container lives in one generational arena. Node identity
//! is the arena handle, and the tree topology (who owns a node, who refers
//! to it) is kept in side tables next to the container rather than inside
//! stored values. A node's root and absolute path are derived by walking
//! owning links, so moving or dropping an ancestor never requires touching
//! its descendants.

use indexmap::IndexMap;
use objerve_path::{parse_index, Key, Path};

use crate::value::{NodeId, Value};

/// Synthetic key exposing a sequence's length.
pub const LENGTH: &str = "length";

/// Sequences hold at most `u32::MAX` slots, so the highest index is one less.
pub const MAX_SEQ_LEN: usize = u32::MAX as usize;

#[derive(Debug, Clone)]
pub(crate) enum Container {
    Map(IndexMap<Key, Value>),
    /// `None` is a hole: inside the length but not a key.
    Seq(Vec<Option<Value>>),
}

impl Container {
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Container::Map(map) => map.get(key).cloned(),
            Container::Seq(items) => {
                if key == LENGTH {
                    return Some(Value::from_len(items.len()));
                }
                items.get(parse_index(key)?).cloned().flatten()
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        match self {
            Container::Map(map) => map.contains_key(key),
            Container::Seq(items) => {
                key == LENGTH
                    || parse_index(key)
                        .and_then(|i| items.get(i))
                        .is_some_and(Option::is_some)
            }
        }
    }

    /// Own enumerable keys: map keys in insertion order, present sequence
    /// indices in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Container::Map(map) => map.keys().cloned().collect(),
            Container::Seq(items) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.is_some())
                .map(|(i, _)| i.to_string())
                .collect(),
        }
    }

    /// Keys visited by tree traversals: own keys, plus `length` last for
    /// sequences.
    pub fn child_keys(&self) -> Vec<Key> {
        let mut keys = self.keys();
        if self.is_seq() {
            keys.push(LENGTH.to_string());
        }
        keys
    }

    /// The value of a length-like property, if the container exposes one.
    pub fn length_like(&self) -> Option<Value> {
        match self {
            Container::Map(map) => map.get(LENGTH).cloned(),
            Container::Seq(items) => Some(Value::from_len(items.len())),
        }
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Container::Seq(_))
    }

    /// Child nodes with the key they sit under.
    pub fn node_children(&self) -> Vec<(Key, NodeId)> {
        match self {
            Container::Map(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_node().map(|id| (k.clone(), id)))
                .collect(),
            Container::Seq(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_ref()?.as_node().map(|id| (i.to_string(), id)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub container: Container,
    /// The slot this node is reported under. `None` for roots and for
    /// detached nodes.
    pub owner: Option<(NodeId, Key)>,
    /// Every slot holding this node, owner included. May repeat.
    pub referrers: Vec<(NodeId, Key)>,
    pub is_root: bool,
}

impl NodeData {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            owner: None,
            referrers: Vec::new(),
            is_root: false,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Arena {
    pub fn alloc(&mut self, data: NodeData) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(data);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            data: Some(data),
        });
        NodeId::new(index, 0)
    }

    pub fn free(&mut self, id: NodeId) -> Option<NodeData> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let data = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.live -= 1;
        Some(data)
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.data.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.data.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn container(&self, id: NodeId) -> Option<&Container> {
        self.get(id).map(|data| &data.container)
    }

    pub fn child(&self, id: NodeId, key: &str) -> Option<Value> {
        self.container(id)?.get(key)
    }

    /// Walks owning links up from `id`. Returns the root and the keys from
    /// the root down to `id`, or `None` when the chain does not end at a root.
    pub fn path_of(&self, id: NodeId) -> Option<(NodeId, Path)> {
        let mut keys = Vec::new();
        let mut current = id;
        // Owning chains are acyclic; the bound only protects against a
        // corrupted table.
        for _ in 0..=self.live {
            let data = self.get(current)?;
            match &data.owner {
                Some((parent, key)) => {
                    keys.push(key.clone());
                    current = *parent;
                }
                None if data.is_root => {
                    keys.reverse();
                    return Some((current, keys));
                }
                None => return None,
            }
        }
        None
    }

    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.path_of(id).map(|(root, _)| root)
    }

    /// Returns `true` when walking owning links up from `start` reaches
    /// `needle` (including `start == needle`).
    fn chain_contains(&self, start: NodeId, needle: NodeId) -> bool {
        let mut current = start;
        for _ in 0..=self.live {
            if current == needle {
                return true;
            }
            match self.get(current).and_then(|data| data.owner.as_ref()) {
                Some((parent, _)) => current = *parent,
                None => return false,
            }
        }
        false
    }

    /// Resolves `path` below `base`. The empty path resolves to `base`.
    pub fn value_in(&self, base: Option<&Value>, path: &[Key]) -> Option<Value> {
        let mut current = base?.clone();
        for key in path {
            current = self.child(current.as_node()?, key)?;
        }
        Some(current)
    }

    /// Containers on the way from `root` along `path`, `root` first. Stops
    /// at the first non-container.
    pub fn ancestors(&self, root: NodeId, path: &[Key]) -> Vec<NodeId> {
        let mut out = vec![root];
        let mut current = root;
        for key in path {
            match self.child(current, key).and_then(|v| v.as_node()) {
                Some(next) => {
                    out.push(next);
                    current = next;
                }
                None => break,
            }
        }
        out
    }

    /// Marks `id` as a root and adopts its ownerless contents.
    pub fn pin_root(&mut self, id: NodeId) {
        let Some(data) = self.get_mut(id) else {
            return;
        };
        data.is_root = true;
        data.owner = None;
        for (key, child) in data.container.node_children() {
            self.adopt(child, id, &key);
        }
    }

    pub fn unpin_root(&mut self, id: NodeId) {
        if let Some(data) = self.get_mut(id) {
            data.is_root = false;
        }
    }

    /// Records that slot `(parent, key)` now holds `child`. An ownerless,
    /// non-root child is adopted by the slot when the slot is attached.
    pub fn add_referrer(&mut self, child: NodeId, parent: NodeId, key: &str) {
        let Some(data) = self.get_mut(child) else {
            return;
        };
        data.referrers.push((parent, key.to_string()));
        let needs_owner = data.owner.is_none() && !data.is_root;
        if needs_owner && self.path_of(parent).is_some() && !self.chain_contains(parent, child) {
            self.adopt(child, parent, key);
        }
    }

    fn adopt(&mut self, child: NodeId, parent: NodeId, key: &str) {
        let mut pending = vec![(child, parent, key.to_string())];
        while let Some((node, owner, slot)) = pending.pop() {
            let Some(data) = self.get_mut(node) else {
                continue;
            };
            if data.owner.is_some() || data.is_root {
                continue;
            }
            data.owner = Some((owner, slot));
            // Ownerless descendants come along.
            let children = data.container.node_children();
            for (k, grandchild) in children {
                let adoptable = self.get(grandchild).is_some_and(|g| {
                    g.owner.is_none()
                        && !g.is_root
                        && g.referrers.iter().any(|(p, rk)| *p == node && *rk == k)
                });
                if adoptable {
                    pending.push((grandchild, node, k));
                }
            }
        }
    }

    /// Forgets one occurrence of slot `(parent, key)` holding `child`.
    /// Re-homes the child when that slot was its owner. Returns `true` when
    /// nothing refers to the child any more.
    pub fn remove_referrer(&mut self, child: NodeId, parent: NodeId, key: &str) -> bool {
        let Some(data) = self.get_mut(child) else {
            return false;
        };
        if let Some(pos) = data
            .referrers
            .iter()
            .position(|(p, k)| *p == parent && k == key)
        {
            data.referrers.remove(pos);
        }
        let owned_here = data
            .owner
            .as_ref()
            .is_some_and(|(p, k)| *p == parent && k == key);
        let still_held = data
            .referrers
            .iter()
            .any(|(p, k)| *p == parent && k == key);
        if owned_here && !still_held {
            self.rehome(child);
        }
        self.get(child)
            .is_some_and(|data| data.referrers.is_empty() && !data.is_root)
    }

    /// Picks a new owner among the remaining attached referrers.
    pub fn rehome(&mut self, child: NodeId) {
        let Some(data) = self.get(child) else {
            return;
        };
        let candidates = data.referrers.clone();
        if let Some(data) = self.get_mut(child) {
            data.owner = None;
        }
        let pick = candidates.into_iter().find(|(parent, _)| {
            *parent != child && self.path_of(*parent).is_some() && !self.chain_contains(*parent, child)
        });
        if let (Some(pick), Some(data)) = (pick, self.get_mut(child)) {
            data.owner = Some(pick);
        }
    }
}
