//! Forwarding changes between trees that reference each other.
//!
//! Storing a node of tree `S` inside tree `R` creates a link. The link owns
//! two registry entries: a prefix entry on `S` that re-announces every
//! change below the referenced node at the referencing path in `R`, and an
//! exact entry on `R` that drops the link once the referencing slot stops
//! holding that node.

use std::collections::{BTreeMap, BTreeSet};

use objerve_path::{format_path, is_child, is_prefix, literal_pattern, Key, Path, Pattern, Segment};
use tracing::debug;

use crate::observer::Observer;
use crate::registry::{Action, Handler, LinkId};
use crate::value::{NodeId, Value};

#[derive(Debug)]
pub(crate) struct Link {
    pub local_root: NodeId,
    pub local_path: Path,
    pub target: NodeId,
    pub foreign_root: NodeId,
    pub foreign_path: Path,
    /// Paths below `target` (relative to it) that hold references back into
    /// the local tree. Nothing strictly below them is forwarded.
    pub ignored: BTreeSet<Path>,
    forward_entry: u64,
    guard_entry: u64,
}

impl Link {
    fn forward_pattern(&self) -> Pattern {
        let mut pattern = literal_pattern(&self.foreign_path);
        pattern.push(Segment::Tree);
        pattern
    }

    fn guard_pattern(&self) -> Pattern {
        literal_pattern(&self.local_path)
    }
}

#[derive(Debug, Default)]
pub(crate) struct CrossRefs {
    links: BTreeMap<LinkId, Link>,
    next_id: LinkId,
}

impl CrossRefs {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    fn find(&self, local_root: NodeId, local_path: &[Key], target: NodeId) -> Option<LinkId> {
        self.links
            .iter()
            .find(|(_, l)| l.local_root == local_root && l.local_path == local_path && l.target == target)
            .map(|(id, _)| *id)
    }
}

impl Observer {
    /// Installs a link when `target`, now stored at `local_path` in
    /// `local_root`, belongs to another tree.
    pub(crate) fn link_if_foreign(&mut self, local_root: NodeId, local_path: Path, target: NodeId) {
        let Some((foreign_root, foreign_path)) = self.arena.path_of(target) else {
            return;
        };
        if foreign_root == local_root || self.links.find(local_root, &local_path, target).is_some() {
            return;
        }

        let mut ignored = BTreeSet::new();
        if let Some(container) = self.arena.container(target) {
            for (key, child) in container.node_children() {
                if self.arena.root_of(child) == Some(local_root) {
                    ignored.insert(vec![key]);
                }
            }
        }

        let id = self.links.next_id;
        self.links.next_id = self.links.next_id.saturating_add(1);
        let mut link = Link {
            local_root,
            local_path,
            target,
            foreign_root,
            foreign_path,
            ignored,
            forward_entry: 0,
            guard_entry: 0,
        };
        link.forward_entry = self
            .registries
            .entry(foreign_root)
            .or_default()
            .add(&link.forward_pattern(), Handler::Forward(id));
        link.guard_entry = self
            .registries
            .entry(local_root)
            .or_default()
            .add(&link.guard_pattern(), Handler::Guard(id));
        debug!(
            link = id,
            local_root = %link.local_root,
            local_path = %format_path(&link.local_path),
            foreign_root = %link.foreign_root,
            foreign_path = %format_path(&link.foreign_path),
            "cross reference linked"
        );
        self.links.links.insert(id, link);
    }

    /// Re-announces a change at `path` of the foreign tree in the local one.
    pub(crate) fn forward(
        &mut self,
        id: LinkId,
        path: &[Key],
        action: Action,
        old: Option<Value>,
        new: Option<Value>,
    ) {
        let Some(link) = self.links.links.get(&id) else {
            return;
        };
        let Some(rel) = path.get(link.foreign_path.len()..) else {
            return;
        };
        let target = link.target;
        let local_root = link.local_root;
        if rel.is_empty() {
            if new.as_ref().and_then(Value::as_node) != Some(target) {
                self.teardown(id);
            }
            return;
        }
        // The referenced node itself is being replaced or removed in the
        // foreign tree; what happens below it there says nothing about the
        // node as seen from the local tree.
        let leaving = self
            .current_update()
            .is_some_and(|(root, at)| root == link.foreign_root && is_prefix(at, &link.foreign_path));
        if leaving || link.ignored.iter().any(|p| is_child(p, rel)) {
            return;
        }
        let back_ref = new
            .as_ref()
            .and_then(Value::as_node)
            .is_some_and(|n| self.arena.root_of(n) == Some(local_root));
        let rel = rel.to_vec();
        let mut local_path = link.local_path.clone();
        local_path.extend(rel.iter().cloned());
        if let Some(link) = self.links.links.get_mut(&id) {
            if back_ref {
                link.ignored.insert(rel);
            } else {
                link.ignored.remove(&rel);
            }
        }
        self.notify_exact(local_root, action, &local_path, old, new);
    }

    pub(crate) fn guard(&mut self, id: LinkId, new: Option<&Value>) {
        let Some(link) = self.links.links.get(&id) else {
            return;
        };
        if new.and_then(Value::as_node) != Some(link.target) {
            self.teardown(id);
        }
    }

    pub(crate) fn teardown(&mut self, id: LinkId) {
        let Some(link) = self.links.links.remove(&id) else {
            return;
        };
        if let Some(registry) = self.registries.get_mut(&link.foreign_root) {
            registry.remove_entry(&link.forward_pattern(), link.forward_entry);
        }
        if let Some(registry) = self.registries.get_mut(&link.local_root) {
            registry.remove_entry(&link.guard_pattern(), link.guard_entry);
        }
        debug!(link = id, local_path = %format_path(&link.local_path), "cross reference unlinked");
    }

    /// Drops every link with an end in `root`.
    pub(crate) fn teardown_links_for_root(&mut self, root: NodeId) {
        let ids: Vec<LinkId> = self
            .links
            .links
            .iter()
            .filter(|(_, l)| l.local_root == root || l.foreign_root == root)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.teardown(id);
        }
    }
}
