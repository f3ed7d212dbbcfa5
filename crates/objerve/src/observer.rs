use std::collections::HashMap;

use objerve_path::{format_pattern, literal_pattern, validate_pattern, Key, Path, Pattern, Segment};
use serde_json::Map;
use tracing::debug;

use crate::arena::{Arena, Container, NodeData};
use crate::config::ObserverConfig;
use crate::cross_ref::CrossRefs;
use crate::error::ObserveError;
use crate::notifier::{PendingWrite, TxState};
use crate::registry::{Handler, Listener, ListenerRegistry, Scope};
use crate::value::{Input, IntoKey, NodeId, Value};

/// Owns every observed tree, their listeners and the transaction state.
///
/// Trees are addressed by [`NodeId`] handles. Listeners receive
/// `&mut Observer` and may mutate any tree; nested mutations join the
/// transaction of the mutation that triggered them.
#[derive(Debug)]
pub struct Observer {
    pub(crate) arena: Arena,
    pub(crate) registries: HashMap<NodeId, ListenerRegistry>,
    pub(crate) links: CrossRefs,
    pub(crate) tx: TxState,
    pub(crate) in_flight: Vec<PendingWrite>,
    /// Root and path of every update being dispatched, innermost last.
    pub(crate) updating: Vec<(NodeId, Path)>,
    /// Nodes that may have lost their last attachment.
    pub(crate) released: Vec<NodeId>,
    pub(crate) config: ObserverConfig,
}

impl Default for Observer {
    fn default() -> Self {
        Self::with_config(ObserverConfig::default())
    }
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ObserverConfig) -> Self {
        Self {
            arena: Arena::default(),
            registries: HashMap::new(),
            links: CrossRefs::default(),
            tx: TxState {
                next: config.first_transaction_id,
                active: None,
                depth: 0,
            },
            in_flight: Vec::new(),
            updating: Vec::new(),
            released: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Starts observing a container, making it the root of a new tree.
    ///
    /// Nested arrays and objects are wrapped as well. Passing a node that
    /// is already observed returns it unchanged.
    pub fn observe(&mut self, value: impl Into<Input>) -> Result<NodeId, ObserveError> {
        match value.into() {
            Input::Node(id) if self.arena.contains(id) => Ok(id),
            Input::Node(_) => Err(ObserveError::InvalidTarget),
            Input::Json(json) => {
                if !json.is_array() && !json.is_object() {
                    return Err(ObserveError::NotContainer);
                }
                let Value::Node(id) = self.wrap_json(json) else {
                    return Err(ObserveError::NotContainer);
                };
                self.arena.pin_root(id);
                self.registries.insert(id, ListenerRegistry::default());
                debug!(root = %id, "observing new root");
                Ok(id)
            }
        }
    }

    /// Observes a fresh empty mapping.
    pub fn observe_empty(&mut self) -> NodeId {
        let id = self.arena.alloc(NodeData::new(Container::Map(Default::default())));
        self.arena.pin_root(id);
        self.registries.insert(id, ListenerRegistry::default());
        debug!(root = %id, "observing new root");
        id
    }

    /// Registers `listener` for changes matching `path` below `target`.
    ///
    /// `path` may contain [`EACH`](crate::EACH) for any sequence index and
    /// may end with [`TREE`](crate::TREE) for everything below a prefix.
    /// When `target` is not a root, the listener sees paths relative to
    /// `target` and `target` as the changed node.
    pub fn add_listener<P>(&mut self, target: NodeId, path: P, listener: Listener) -> Result<(), ObserveError>
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        let pattern: Pattern = path.into_iter().map(Into::into).collect();
        let (root, full, scope) = self.resolve_target(target, pattern)?;
        debug!(root = %root, pattern = %format_pattern(&full), "listener added");
        self.registries
            .entry(root)
            .or_default()
            .add(&full, Handler::User { listener, scope });
        Ok(())
    }

    /// Removes one registration of `listener` made with the same target and
    /// path. Removing a listener that is not registered does nothing.
    pub fn remove_listener<P>(&mut self, target: NodeId, path: P, listener: &Listener) -> Result<(), ObserveError>
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        let pattern: Pattern = path.into_iter().map(Into::into).collect();
        let (root, full, scope) = self.resolve_target(target, pattern)?;
        if let Some(registry) = self.registries.get_mut(&root) {
            registry.remove_listener(&full, listener, scope.map(|s| s.target));
        }
        Ok(())
    }

    /// [`add_listener`](Self::add_listener) with [`TREE`](crate::TREE)
    /// appended to `path`.
    pub fn add_prefix_listener<P>(&mut self, target: NodeId, path: P, listener: Listener) -> Result<(), ObserveError>
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        let pattern = path.into_iter().map(Into::into).chain([Segment::Tree]);
        self.add_listener(target, pattern, listener)
    }

    pub fn remove_prefix_listener<P>(
        &mut self,
        target: NodeId,
        path: P,
        listener: &Listener,
    ) -> Result<(), ObserveError>
    where
        P: IntoIterator,
        P::Item: Into<Segment>,
    {
        let pattern = path.into_iter().map(Into::into).chain([Segment::Tree]);
        self.remove_listener(target, pattern, listener)
    }

    /// Maps a registration on `target` to its root and absolute pattern.
    fn resolve_target(
        &self,
        target: NodeId,
        pattern: Pattern,
    ) -> Result<(NodeId, Pattern, Option<Scope>), ObserveError> {
        validate_pattern(&pattern)?;
        let (root, base) = self.arena.path_of(target).ok_or(ObserveError::InvalidTarget)?;
        let scope = (target != root).then_some(Scope {
            target,
            depth: base.len(),
        });
        let mut full = literal_pattern(&base);
        full.extend(pattern);
        validate_pattern(&full)?;
        Ok((root, full, scope))
    }

    pub fn get(&self, node: NodeId, key: impl IntoKey) -> Result<Option<Value>, ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        Ok(container.get(&key.into_key()))
    }

    /// Resolves `path` below `node`. The empty path yields `node` itself.
    pub fn get_path<P>(&self, node: NodeId, path: P) -> Result<Option<Value>, ObserveError>
    where
        P: IntoIterator,
        P::Item: IntoKey,
    {
        if !self.arena.contains(node) {
            return Err(ObserveError::InvalidTarget);
        }
        let path: Path = path.into_iter().map(IntoKey::into_key).collect();
        Ok(self.arena.value_in(Some(&Value::Node(node)), &path))
    }

    /// Own keys: mapping keys in insertion order, present indices of a
    /// sequence in ascending order.
    pub fn keys(&self, node: NodeId) -> Result<Vec<Key>, ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        Ok(container.keys())
    }

    /// Number of entries of a mapping, or the length of a sequence.
    pub fn len(&self, node: NodeId) -> Result<usize, ObserveError> {
        match self.arena.container(node) {
            Some(Container::Map(map)) => Ok(map.len()),
            Some(Container::Seq(items)) => Ok(items.len()),
            None => Err(ObserveError::InvalidTarget),
        }
    }

    pub fn is_sequence(&self, node: NodeId) -> Result<bool, ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        Ok(container.is_seq())
    }

    pub fn contains(&self, node: NodeId, key: impl IntoKey) -> Result<bool, ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        Ok(container.contains(&key.into_key()))
    }

    /// The root `node` is attached to, `None` for detached or stale handles.
    pub fn root_of(&self, node: NodeId) -> Option<NodeId> {
        self.arena.root_of(node)
    }

    /// The absolute path of `node` from its root.
    pub fn path_of(&self, node: NodeId) -> Option<Path> {
        self.arena.path_of(node).map(|(_, path)| path)
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.arena.get(node).is_some_and(|data| data.is_root)
    }

    /// Number of live nodes across all trees.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of cross-tree links currently forwarding changes.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Materializes a value as plain JSON. Sequence holes become `null`.
    pub fn to_json(&self, value: &Value) -> Result<serde_json::Value, ObserveError> {
        let mut stack = Vec::new();
        self.json_of(value, &mut stack)
    }

    fn json_of(&self, value: &Value, stack: &mut Vec<NodeId>) -> Result<serde_json::Value, ObserveError> {
        let id = match value {
            Value::Null => return Ok(serde_json::Value::Null),
            Value::Bool(b) => return Ok((*b).into()),
            Value::Number(n) => return Ok(serde_json::Value::Number(n.clone())),
            Value::String(s) => return Ok(s.clone().into()),
            Value::Node(id) => *id,
        };
        if stack.contains(&id) {
            return Err(ObserveError::Cycle);
        }
        let container = self.arena.container(id).ok_or(ObserveError::InvalidTarget)?;
        stack.push(id);
        let json = match container {
            Container::Map(map) => {
                let mut out = Map::new();
                for (key, v) in map {
                    out.insert(key.clone(), self.json_of(v, stack)?);
                }
                serde_json::Value::Object(out)
            }
            Container::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(match item {
                        Some(v) => self.json_of(v, stack)?,
                        None => serde_json::Value::Null,
                    });
                }
                serde_json::Value::Array(out)
            }
        };
        stack.pop();
        Ok(json)
    }

    /// Stops observing `root`.
    ///
    /// Its listeners and every cross-tree link touching it are dropped.
    /// Nodes of the tree that are still referenced from another live tree
    /// move to that tree; everything else is reclaimed.
    pub fn dispose(&mut self, root: NodeId) -> Result<(), ObserveError> {
        if !self.is_root(root) {
            return Err(ObserveError::InvalidTarget);
        }
        self.teardown_links_for_root(root);
        self.registries.remove(&root);
        self.arena.unpin_root(root);
        self.arena.rehome(root);
        self.released.push(root);
        debug!(root = %root, "disposed root");
        if self.tx.depth == 0 {
            self.reclaim();
        }
        Ok(())
    }
}
