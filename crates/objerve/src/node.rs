//! Mutating observed nodes.
//!
//! Every write goes through the same steps: validate the key, wrap the
//! incoming value, announce the change while the tree still holds the old
//! value, then apply the raw write unless a listener already rewrote the
//! same slot in the meantime.

use indexmap::IndexMap;
use objerve_path::{join, parse_index, Key};
use tracing::trace;

use crate::arena::{Container, NodeData, LENGTH, MAX_SEQ_LEN};
use crate::error::ObserveError;
use crate::notifier::{Mutation, PendingWrite};
use crate::observer::Observer;
use crate::value::{Input, IntoKey, NodeId, Value};

impl Observer {
    /// Stores `value` under `key` in `node`, notifying listeners.
    ///
    /// On a sequence, `key` must be a canonical index or `length`. Writing
    /// an index at or past the end grows the sequence; writing `length`
    /// truncates or extends it.
    ///
    /// ```
    /// use objerve::{Action, Listener, Observer};
    /// use serde_json::json;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let mut observer = Observer::new();
    /// let root = observer.observe(json!({})).unwrap();
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let sink = seen.clone();
    /// observer
    ///     .add_listener(root, ["a"], Listener::new(move |_, c| sink.borrow_mut().push(c.action)))
    ///     .unwrap();
    /// observer.set(root, "a", 3).unwrap();
    /// observer.set(root, "a", 4).unwrap();
    /// assert_eq!(*seen.borrow(), vec![Action::Create, Action::Change]);
    /// ```
    pub fn set(&mut self, node: NodeId, key: impl IntoKey, value: impl Into<Input>) -> Result<(), ObserveError> {
        let key = key.into_key();
        let input = value.into();
        self.transaction(|obs| obs.write(node, key, input))
    }

    /// Removes `key` from `node`. Removing an absent key does nothing.
    ///
    /// Deleting a sequence index leaves a hole; the length is unchanged.
    pub fn delete(&mut self, node: NodeId, key: impl IntoKey) -> Result<(), ObserveError> {
        let key = key.into_key();
        self.transaction(|obs| obs.remove(node, key))
    }

    /// Appends to a sequence.
    pub fn push(&mut self, node: NodeId, value: impl Into<Input>) -> Result<(), ObserveError> {
        let len = self.seq_len(node)?;
        let input = value.into();
        self.transaction(|obs| obs.write(node, len.to_string(), input))
    }

    /// Removes the last element of a sequence and returns it.
    ///
    /// A popped container that nothing else references is reclaimed when
    /// the call returns, so the returned handle is only useful for reading
    /// inside listeners or when reclamation is disabled.
    pub fn pop(&mut self, node: NodeId) -> Result<Option<Value>, ObserveError> {
        let len = self.seq_len(node)?;
        if len == 0 {
            return Ok(None);
        }
        let last = len - 1;
        self.transaction(|obs| {
            let value = obs.arena.child(node, &last.to_string());
            obs.remove(node, last.to_string())?;
            obs.write_length(node, last)?;
            Ok(value)
        })
    }

    /// Walks `path` from `node` and sets its last key.
    pub fn set_path<P>(&mut self, node: NodeId, path: P, value: impl Into<Input>) -> Result<(), ObserveError>
    where
        P: IntoIterator,
        P::Item: IntoKey,
    {
        let mut keys: Vec<Key> = path.into_iter().map(IntoKey::into_key).collect();
        let last = keys.pop().ok_or(ObserveError::NotFound)?;
        let mut current = node;
        for key in &keys {
            current = self
                .get(current, key.as_str())?
                .and_then(|v| v.as_node())
                .ok_or(ObserveError::NotFound)?;
        }
        self.set(current, last, value)
    }

    fn seq_len(&self, node: NodeId) -> Result<usize, ObserveError> {
        match self.arena.container(node) {
            Some(Container::Seq(items)) => Ok(items.len()),
            Some(Container::Map(_)) => Err(ObserveError::NotSequence),
            None => Err(ObserveError::InvalidTarget),
        }
    }

    pub(crate) fn write(&mut self, node: NodeId, key: Key, input: Input) -> Result<(), ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        let seq_len = match container {
            Container::Seq(items) => {
                if key == LENGTH {
                    let len = length_from(&input)?;
                    return self.write_length(node, len);
                }
                match parse_index(&key) {
                    Some(index) if index < MAX_SEQ_LEN => {}
                    _ => return Err(ObserveError::InvalidKey(key)),
                }
                Some(items.len())
            }
            Container::Map(_) => None,
        };

        self.mark_touched(node, &key);
        let old = self.arena.child(node, &key);
        let new = self.wrap(input)?;
        let location = self.arena.path_of(node);

        if let Some((root, base)) = &location {
            let unchanged = old.as_ref() == Some(&new);
            if !unchanged || self.config.notify_unchanged_writes {
                let path = join(base, &key);
                if self.announce(node, &key, *root, Mutation::Set, &path, old, Some(new.clone())) {
                    self.release(&new);
                    return Ok(());
                }
            }
        }

        self.raw_set(node, &key, new.clone());

        if let (Some(old_len), Ok(new_len)) = (seq_len, self.seq_len(node)) {
            if new_len != old_len {
                if let Some((root, base)) = &location {
                    let path = join(base, LENGTH);
                    self.update(
                        *root,
                        Mutation::Set,
                        &path,
                        Some(Value::from_len(old_len)),
                        Some(Value::from_len(new_len)),
                    );
                }
            }
        }

        if let (Some((root, base)), Some(target)) = (location, new.as_node()) {
            self.link_if_foreign(root, join(&base, &key), target);
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, node: NodeId, key: Key) -> Result<(), ObserveError> {
        let container = self.arena.container(node).ok_or(ObserveError::InvalidTarget)?;
        if container.is_seq() && (key == LENGTH || parse_index(&key).is_none()) {
            return Err(ObserveError::InvalidKey(key));
        }
        self.mark_touched(node, &key);
        let Some(old) = self.arena.child(node, &key) else {
            return Ok(());
        };
        if let Some((root, base)) = self.arena.path_of(node) {
            let path = join(&base, &key);
            if self.announce(node, &key, root, Mutation::Delete, &path, Some(old), None) {
                return Ok(());
            }
        }
        self.raw_delete(node, &key);
        Ok(())
    }

    /// Sets a sequence's length. Truncated elements are announced as
    /// deletions, lowest index first, before the length itself.
    pub(crate) fn write_length(&mut self, node: NodeId, new_len: usize) -> Result<(), ObserveError> {
        let old_len = self.seq_len(node)?;
        self.mark_touched(node, LENGTH);
        if let Some((root, base)) = self.arena.path_of(node) {
            for index in new_len..old_len {
                let key = index.to_string();
                if let Some(old) = self.arena.child(node, &key) {
                    self.update(root, Mutation::Delete, &join(&base, &key), Some(old), None);
                }
            }
            if new_len != old_len || self.config.notify_unchanged_writes {
                let path = join(&base, LENGTH);
                let old = Some(Value::from_len(old_len));
                let new = Some(Value::from_len(new_len));
                if self.announce(node, LENGTH, root, Mutation::Set, &path, old, new) {
                    return Ok(());
                }
            }
        }
        self.raw_set_len(node, new_len);
        Ok(())
    }

    /// Runs the notifications for a pending write to `(node, key)`.
    /// Returns `true` when a listener rewrote that slot meanwhile, in which
    /// case the pending write must be dropped.
    fn announce(
        &mut self,
        node: NodeId,
        key: &str,
        root: NodeId,
        mutation: Mutation,
        path: &[Key],
        old: Option<Value>,
        new: Option<Value>,
    ) -> bool {
        self.in_flight.push(PendingWrite {
            node,
            key: key.to_string(),
            touched: false,
        });
        self.update(root, mutation, path, old, new);
        let touched = self.in_flight.pop().is_some_and(|write| write.touched);
        if touched {
            trace!(node = %node, key, "write overridden by a listener");
        }
        touched
    }

    /// Turns an input into a storable value, wrapping plain containers into
    /// fresh nodes.
    pub(crate) fn wrap(&mut self, input: Input) -> Result<Value, ObserveError> {
        match input {
            Input::Node(id) if self.arena.contains(id) => Ok(Value::Node(id)),
            Input::Node(_) => Err(ObserveError::InvalidTarget),
            Input::Json(json) => Ok(self.wrap_json(json)),
        }
    }

    pub(crate) fn wrap_json(&mut self, json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Array(items) => {
                let items: Vec<Option<Value>> = items.into_iter().map(|v| Some(self.wrap_json(v))).collect();
                let children: Vec<(usize, NodeId)> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.as_ref()?.as_node().map(|id| (i, id)))
                    .collect();
                let id = self.arena.alloc(NodeData::new(Container::Seq(items)));
                for (index, child) in children {
                    self.arena.add_referrer(child, id, &index.to_string());
                }
                Value::Node(id)
            }
            serde_json::Value::Object(map) => {
                let map: IndexMap<Key, Value> = map.into_iter().map(|(k, v)| (k, self.wrap_json(v))).collect();
                let children: Vec<(Key, NodeId)> = map
                    .iter()
                    .filter_map(|(k, v)| v.as_node().map(|id| (k.clone(), id)))
                    .collect();
                let id = self.arena.alloc(NodeData::new(Container::Map(map)));
                for (key, child) in children {
                    self.arena.add_referrer(child, id, &key);
                }
                Value::Node(id)
            }
            primitive => Value::from_primitive(&primitive).unwrap_or(Value::Null),
        }
    }

    fn raw_set(&mut self, node: NodeId, key: &str, value: Value) {
        let Some(data) = self.arena.get_mut(node) else {
            return;
        };
        let old = match &mut data.container {
            Container::Map(map) => map.insert(key.to_string(), value.clone()),
            Container::Seq(items) => {
                let Some(index) = parse_index(key) else {
                    return;
                };
                if index >= items.len() {
                    items.resize(index + 1, None);
                }
                items[index].replace(value.clone())
            }
        };
        if let Some(child) = value.as_node() {
            self.arena.add_referrer(child, node, key);
        }
        if let Some(old) = old {
            self.release_slot(&old, node, key);
        }
    }

    fn raw_delete(&mut self, node: NodeId, key: &str) {
        let Some(data) = self.arena.get_mut(node) else {
            return;
        };
        let old = match &mut data.container {
            Container::Map(map) => map.shift_remove(key),
            Container::Seq(items) => parse_index(key)
                .and_then(|index| items.get_mut(index))
                .and_then(Option::take),
        };
        if let Some(old) = old {
            self.release_slot(&old, node, key);
        }
    }

    fn raw_set_len(&mut self, node: NodeId, len: usize) {
        let Some(Container::Seq(items)) = self.arena.get_mut(node).map(|d| &mut d.container) else {
            return;
        };
        let dropped: Vec<(usize, Value)> = if len < items.len() {
            items
                .drain(len..)
                .enumerate()
                .filter_map(|(offset, v)| v.map(|v| (len + offset, v)))
                .collect()
        } else {
            items.resize(len, None);
            Vec::new()
        };
        for (index, old) in dropped {
            self.release_slot(&old, node, &index.to_string());
        }
    }

    fn release_slot(&mut self, old: &Value, parent: NodeId, key: &str) {
        if let Some(child) = old.as_node() {
            self.arena.remove_referrer(child, parent, key);
            self.released.push(child);
        }
    }

    /// Queues a value that was wrapped but never stored.
    fn release(&mut self, value: &Value) {
        if let Some(id) = value.as_node() {
            self.released.push(id);
        }
    }

    /// Frees every released node that is no longer attached to a live root,
    /// along with whatever only it kept alive. Returns how many nodes were
    /// freed.
    ///
    /// Runs automatically at the end of each mutation unless
    /// [`ObserverConfig::reclaim_detached`](crate::ObserverConfig) is off.
    pub fn reclaim(&mut self) -> usize {
        let mut freed = 0;
        while let Some(id) = self.released.pop() {
            let keep = match self.arena.get(id) {
                Some(data) => data.is_root || self.arena.path_of(id).is_some(),
                None => true,
            };
            if keep {
                continue;
            }
            let Some(data) = self.arena.free(id) else {
                continue;
            };
            freed += 1;
            for (key, child) in data.container.node_children() {
                self.arena.remove_referrer(child, id, &key);
                self.released.push(child);
            }
        }
        if freed > 0 {
            trace!(freed, live = self.arena.len(), "reclaimed detached nodes");
        }
        freed
    }
}

/// A `length` write must carry an integer in `0..=MAX_SEQ_LEN`.
fn length_from(input: &Input) -> Result<usize, ObserveError> {
    let Input::Json(serde_json::Value::Number(n)) = input else {
        return Err(ObserveError::InvalidLength);
    };
    if let Some(len) = n.as_u64() {
        return usize::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_SEQ_LEN)
            .ok_or(ObserveError::InvalidLength);
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= MAX_SEQ_LEN as f64 => Ok(f as usize),
        _ => Err(ObserveError::InvalidLength),
    }
}
