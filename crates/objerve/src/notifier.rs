//! Turning one slot mutation into an ordered run of listener calls.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use objerve_path::{format_path, Key, Path, Pattern};
use tracing::{debug, trace};

use crate::differ::{classify, structural_diff, Transition};
use crate::matcher::{find_matching_paths, patterns_for_path, Match, SortOrder};
use crate::observer::Observer;
use crate::registry::{Action, Change, Handler};
use crate::value::{NodeId, TxId, Value};

/// Unresolved kind of a slot mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Set,
    Delete,
}

impl Mutation {
    fn resolve(self, old: Option<&Value>) -> Action {
        match self {
            Mutation::Set if old.is_some() => Action::Change,
            Mutation::Set => Action::Create,
            Mutation::Delete => Action::Delete,
        }
    }
}

/// Transaction bookkeeping shared by every mutation entry point.
#[derive(Debug)]
pub(crate) struct TxState {
    pub next: u64,
    pub active: Option<TxId>,
    pub depth: usize,
}

/// A write waiting for its notifications to finish.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    pub node: NodeId,
    pub key: Key,
    pub touched: bool,
}

struct Delivery {
    pattern: Pattern,
    path: Path,
    action: Action,
    old: Option<Value>,
    new: Option<Value>,
}

impl Delivery {
    fn new(m: Match, action: Action, old: Option<Value>, new: Option<Value>) -> Self {
        Self {
            pattern: m.pattern,
            path: m.path,
            action,
            old,
            new,
        }
    }
}

impl Observer {
    /// Runs `f` as part of a transaction.
    ///
    /// The outermost call owns the transaction: when it returns (or a
    /// listener panics) the transaction id is released, pending writes are
    /// forgotten and detached nodes are reclaimed. A panic then resumes in
    /// the caller.
    pub(crate) fn transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.tx.depth > 0 {
            self.tx.depth += 1;
            let out = f(self);
            self.tx.depth -= 1;
            return out;
        }
        self.tx.depth = 1;
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.tx.depth = 0;
        self.tx.active = None;
        self.in_flight.clear();
        self.updating.clear();
        if self.config.reclaim_detached {
            self.reclaim();
        }
        match result {
            Ok(out) => out,
            Err(payload) => {
                debug!("listener panicked, transaction aborted");
                resume_unwind(payload)
            }
        }
    }

    /// The slot whose update is being dispatched right now.
    pub(crate) fn current_update(&self) -> Option<(NodeId, &[Key])> {
        self.updating.last().map(|(root, path)| (*root, path.as_slice()))
    }

    /// The id of the running transaction, allocated on first use.
    pub(crate) fn transaction_id(&mut self) -> TxId {
        if let Some(tx) = self.tx.active {
            return tx;
        }
        let tx = TxId(self.tx.next);
        self.tx.next = self.tx.next.saturating_add(1);
        self.tx.active = Some(tx);
        tx
    }

    /// Flags every in-flight write to `(node, key)` as overridden.
    pub(crate) fn mark_touched(&mut self, node: NodeId, key: &str) {
        for write in &mut self.in_flight {
            if write.node == node && write.key == key {
                write.touched = true;
            }
        }
    }

    /// Announces that the value at `path` in `root` goes from `old` to `new`.
    ///
    /// Called before the raw write lands, so the tree still holds `old`.
    pub(crate) fn update(
        &mut self,
        root: NodeId,
        mutation: Mutation,
        path: &[Key],
        old: Option<Value>,
        new: Option<Value>,
    ) {
        if !self.registries.get(&root).is_some_and(|r| !r.is_empty()) {
            return;
        }
        let action = mutation.resolve(old.as_ref());
        debug!(
            root = %root,
            path = %format_path(path),
            action = %action,
            transition = ?classify(old.as_ref(), new.as_ref()),
            "update"
        );
        let parent = &path[..path.len().saturating_sub(1)];
        let seed = self.arena.ancestors(root, parent);
        self.updating.push((root, path.to_vec()));
        self.propagate(root, action, path, old, new, &seed, &[]);
        self.updating.pop();
    }

    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &mut self,
        root: NodeId,
        action: Action,
        path: &[Key],
        old: Option<Value>,
        new: Option<Value>,
        seed: &[NodeId],
        diffing: &[(NodeId, NodeId)],
    ) {
        match classify(old.as_ref(), new.as_ref()) {
            Transition::PrimToPrim => {
                let batch = self.exact(root, path, action, old, new);
                self.deliver(root, batch);
            }
            Transition::PrimToObj => {
                let matches = self.matches(root, new.as_ref(), path, SortOrder::TrunkFirst, seed);
                let batch = matches
                    .into_iter()
                    .map(|m| {
                        if m.path.len() == path.len() {
                            Delivery::new(m, action, old.clone(), new.clone())
                        } else {
                            let value = self.arena.value_in(new.as_ref(), &m.path[path.len()..]);
                            Delivery::new(m, Action::Create, None, value)
                        }
                    })
                    .collect();
                self.deliver(root, batch);
            }
            Transition::ObjToPrim => {
                let matches = self.matches(root, old.as_ref(), path, SortOrder::LeafFirst, seed);
                let batch = matches
                    .into_iter()
                    .map(|m| {
                        if m.path.len() == path.len() {
                            Delivery::new(m, action, old.clone(), new.clone())
                        } else {
                            let value = self.arena.value_in(old.as_ref(), &m.path[path.len()..]);
                            Delivery::new(m, Action::Delete, value, None)
                        }
                    })
                    .collect();
                self.deliver(root, batch);
            }
            Transition::ObjToObj => {
                let (Some(from), Some(to)) = (
                    old.as_ref().and_then(Value::as_node),
                    new.as_ref().and_then(Value::as_node),
                ) else {
                    return;
                };
                let batch = self.exact(root, path, action, old, new);
                self.deliver(root, batch);
                // a pair already being diffed further up only recurs through a cycle
                if from == to || diffing.contains(&(from, to)) {
                    return;
                }
                self.propagate_diff(root, path, from, to, seed, diffing);
            }
        }
    }

    /// Children of two containers sitting at the same `path`: additions,
    /// then changes (recursively), then removals.
    ///
    /// Walks below the added and removed children stop at nodes already on
    /// `seed`; `diffing` holds the container pairs being compared above.
    fn propagate_diff(
        &mut self,
        root: NodeId,
        path: &[Key],
        from: NodeId,
        to: NodeId,
        seed: &[NodeId],
        diffing: &[(NodeId, NodeId)],
    ) {
        let diff = structural_diff(&self.arena, from, to);
        if diff.is_empty() {
            return;
        }
        let mut seed = seed.to_vec();
        seed.extend([from, to]);
        let mut diffing = diffing.to_vec();
        diffing.push((from, to));

        for key in diff.added {
            let child_path = objerve_path::join(path, &key);
            let value = self.arena.child(to, &key);
            let matches = self.matches(root, value.as_ref(), &child_path, SortOrder::TrunkFirst, &seed);
            let batch = matches
                .into_iter()
                .map(|m| {
                    let v = self.arena.value_in(value.as_ref(), &m.path[child_path.len()..]);
                    Delivery::new(m, Action::Create, None, v)
                })
                .collect();
            self.deliver(root, batch);
        }

        for key in diff.changed {
            let child_path = objerve_path::join(path, &key);
            let old = self.arena.child(from, &key);
            let new = self.arena.child(to, &key);
            self.propagate(root, Action::Change, &child_path, old, new, &seed, &diffing);
        }

        for key in diff.removed {
            let child_path = objerve_path::join(path, &key);
            let value = self.arena.child(from, &key);
            let matches = self.matches(root, value.as_ref(), &child_path, SortOrder::LeafFirst, &seed);
            let batch = matches
                .into_iter()
                .map(|m| {
                    let v = self.arena.value_in(value.as_ref(), &m.path[child_path.len()..]);
                    Delivery::new(m, Action::Delete, v, None)
                })
                .collect();
            self.deliver(root, batch);
        }
    }

    /// Notifies the listeners matching exactly `path`, without looking at
    /// anything below it.
    pub(crate) fn notify_exact(
        &mut self,
        root: NodeId,
        action: Action,
        path: &[Key],
        old: Option<Value>,
        new: Option<Value>,
    ) {
        let batch = self.exact(root, path, action, old, new);
        self.deliver(root, batch);
    }

    fn exact(
        &self,
        root: NodeId,
        path: &[Key],
        action: Action,
        old: Option<Value>,
        new: Option<Value>,
    ) -> Vec<Delivery> {
        let Some(registry) = self.registries.get(&root) else {
            return Vec::new();
        };
        patterns_for_path(registry.index(), path)
            .into_iter()
            .map(|pattern| Delivery {
                pattern,
                path: path.to_vec(),
                action,
                old: old.clone(),
                new: new.clone(),
            })
            .collect()
    }

    fn matches(
        &self,
        root: NodeId,
        value: Option<&Value>,
        path: &[Key],
        order: SortOrder,
        seed: &[NodeId],
    ) -> Vec<Match> {
        match self.registries.get(&root) {
            Some(registry) => find_matching_paths(&self.arena, registry.index(), value, path, order, seed),
            None => Vec::new(),
        }
    }

    fn deliver(&mut self, root: NodeId, batch: Vec<Delivery>) {
        for delivery in batch {
            self.dispatch(root, &delivery);
        }
    }

    /// Runs every entry registered under one pattern.
    ///
    /// The entry list is re-read after each call, so entries removed by a
    /// listener are skipped and entries added behind the cursor still run.
    fn dispatch(&mut self, root: NodeId, delivery: &Delivery) {
        let mut cursor = 0;
        loop {
            let Some(entry) = self
                .registries
                .get(&root)
                .and_then(|r| r.next_after(&delivery.pattern, cursor))
            else {
                break;
            };
            cursor = entry.id;
            match entry.handler {
                Handler::User { listener, scope } => {
                    let (path, target) = match scope {
                        Some(scope) if delivery.path.len() >= scope.depth => {
                            (delivery.path[scope.depth..].to_vec(), scope.target)
                        }
                        Some(_) => continue,
                        None => (delivery.path.clone(), root),
                    };
                    let change = Change {
                        new_value: delivery.new.clone(),
                        old_value: delivery.old.clone(),
                        action: delivery.action,
                        path,
                        target,
                        transaction: self.transaction_id(),
                    };
                    trace!(
                        root = %root,
                        path = %format_path(&change.path),
                        action = %change.action,
                        tx = %change.transaction,
                        "invoking listener"
                    );
                    listener.call(self, &change);
                }
                Handler::Forward(link) => self.forward(
                    link,
                    &delivery.path,
                    delivery.action,
                    delivery.old.clone(),
                    delivery.new.clone(),
                ),
                Handler::Guard(link) => self.guard(link, delivery.new.as_ref()),
            }
        }
    }
}
