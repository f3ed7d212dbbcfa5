//! Per-root listener storage.

use std::fmt;
use std::rc::Rc;

use objerve_path::{Path, Pattern, PatternMap, Segment};

use crate::observer::Observer;
use crate::value::{NodeId, TxId, Value};

/// Resolved kind of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Change,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Change => "change",
            Action::Delete => "delete",
        })
    }
}

/// One listener invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Value now at `path`; `None` once deleted.
    pub new_value: Option<Value>,
    /// Value previously at `path`; `None` when it did not exist.
    pub old_value: Option<Value>,
    pub action: Action,
    /// Concrete path, relative to `target`.
    pub path: Path,
    /// The node the listener was registered on.
    pub target: NodeId,
    pub transaction: TxId,
}

type Callback = dyn Fn(&mut Observer, &Change);

/// A listener callback.
///
/// Listeners are compared by identity: removing one requires the same
/// handle (or a clone of it) that was registered.
///
/// ```
/// use objerve::{Listener, Observer};
/// use serde_json::json;
///
/// let mut observer = Observer::new();
/// let root = observer.observe(json!({})).unwrap();
/// let listener = Listener::new(|_, change| println!("{} {:?}", change.action, change.path));
/// observer.add_listener(root, ["a"], listener.clone()).unwrap();
/// observer.remove_listener(root, ["a"], &listener).unwrap();
/// ```
#[derive(Clone)]
pub struct Listener(Rc<Callback>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Observer, &Change) + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }

    pub(crate) fn call(&self, observer: &mut Observer, change: &Change) {
        (self.0)(observer, change)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Registration made on an interior node. Paths handed to the listener
/// drop the first `depth` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scope {
    pub target: NodeId,
    pub depth: usize,
}

pub(crate) type LinkId = u64;

#[derive(Debug, Clone)]
pub(crate) enum Handler {
    User {
        listener: Listener,
        scope: Option<Scope>,
    },
    /// Re-announces changes of a referenced subtree in the referencing tree.
    Forward(LinkId),
    /// Watches the referencing slot and drops the link once it changes.
    Guard(LinkId),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub id: u64,
    pub handler: Handler,
}

/// Listener entries of one root, keyed by pattern.
///
/// Entry ids only grow, so each pattern's list is sorted by id and a
/// dispatch can resume after the last id it ran.
#[derive(Debug)]
pub(crate) struct ListenerRegistry {
    patterns: PatternMap<Vec<Entry>>,
    next_id: u64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            patterns: PatternMap::new(),
            next_id: 1,
        }
    }
}

impl ListenerRegistry {
    pub fn index(&self) -> &PatternMap<Vec<Entry>> {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn add(&mut self, pattern: &[Segment], handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.patterns
            .get_or_insert_with(pattern, Vec::new)
            .push(Entry { id, handler });
        id
    }

    /// Removes the first user entry registered with `listener`. `scope` is
    /// the interior node it was registered on, `None` for the root.
    pub fn remove_listener(
        &mut self,
        pattern: &[Segment],
        listener: &Listener,
        scope: Option<NodeId>,
    ) -> bool {
        let Some(entries) = self.patterns.get_mut(pattern) else {
            return false;
        };
        let pos = entries.iter().position(|entry| match &entry.handler {
            Handler::User {
                listener: l,
                scope: s,
            } => l.ptr_eq(listener) && s.map(|s| s.target) == scope,
            _ => false,
        });
        let removed = pos.map(|pos| entries.remove(pos)).is_some();
        self.prune(pattern);
        removed
    }

    pub fn remove_entry(&mut self, pattern: &[Segment], id: u64) -> bool {
        let Some(entries) = self.patterns.get_mut(pattern) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        self.prune(pattern);
        removed
    }

    /// The first entry of `pattern` registered after `cursor`.
    pub fn next_after(&self, pattern: &Pattern, cursor: u64) -> Option<Entry> {
        self.patterns
            .get(pattern)?
            .iter()
            .find(|entry| entry.id > cursor)
            .cloned()
    }

    fn prune(&mut self, pattern: &[Segment]) {
        if self.patterns.get(pattern).is_some_and(Vec::is_empty) {
            self.patterns.remove(pattern);
        }
    }
}
