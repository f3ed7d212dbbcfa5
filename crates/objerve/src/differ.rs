//! Classification of value transitions and the top-level structural diff.

use std::collections::HashSet;

use objerve_path::Key;

use crate::arena::{Arena, Container, LENGTH};
use crate::value::{NodeId, Value};

/// How a slot's value changes shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    PrimToPrim,
    PrimToObj,
    ObjToPrim,
    ObjToObj,
}

/// Classifies a transition. An absent value counts as a primitive.
pub fn classify(old: Option<&Value>, new: Option<&Value>) -> Transition {
    let old_obj = old.is_some_and(Value::is_container);
    let new_obj = new.is_some_and(Value::is_container);
    match (old_obj, new_obj) {
        (false, false) => Transition::PrimToPrim,
        (false, true) => Transition::PrimToObj,
        (true, false) => Transition::ObjToPrim,
        (true, true) => Transition::ObjToObj,
    }
}

/// Top-level keys that differ between two containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: Vec<Key>,
    pub changed: Vec<Key>,
    pub removed: Vec<Key>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Diffs the own keys of two containers.
///
/// `added` and `changed` follow the new container's key order, `removed`
/// the old one's. A length-like property (a sequence's length, or a
/// mapping's `length` key) is diffed as one property appended last: changed
/// when both sides expose it with different values, added or removed when
/// only one side does.
pub(crate) fn structural_diff(arena: &Arena, old: NodeId, new: NodeId) -> Diff {
    let mut diff = Diff::default();
    let (Some(old_c), Some(new_c)) = (arena.container(old), arena.container(new)) else {
        return diff;
    };
    for key in new_c.keys() {
        if key == LENGTH {
            continue;
        }
        match old_c.get(&key) {
            None => diff.added.push(key),
            Some(old_v) => {
                let new_v = new_c.get(&key);
                if !new_v.is_some_and(|new_v| deep_equal(arena, &old_v, &new_v)) {
                    diff.changed.push(key);
                }
            }
        }
    }
    for key in old_c.keys() {
        if key != LENGTH && !new_c.contains(&key) {
            diff.removed.push(key);
        }
    }
    match (old_c.length_like(), new_c.length_like()) {
        (Some(a), Some(b)) => {
            if !deep_equal(arena, &a, &b) {
                diff.changed.push(LENGTH.to_string());
            }
        }
        (None, Some(_)) => diff.added.push(LENGTH.to_string()),
        (Some(_), None) => diff.removed.push(LENGTH.to_string()),
        (None, None) => {}
    }
    diff
}

/// Structural equality over the arena.
///
/// A pair of nodes already under comparison further up is assumed equal,
/// which keeps the comparison finite on cyclic graphs.
pub(crate) fn deep_equal(arena: &Arena, a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    equal_values(arena, a, b, &mut visiting)
}

fn equal_values(
    arena: &Arena,
    a: &Value,
    b: &Value,
    visiting: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Value::Node(x), Value::Node(y)) => {
            if x == y || !visiting.insert((*x, *y)) {
                return true;
            }
            let equal = match (arena.container(*x), arena.container(*y)) {
                (Some(cx), Some(cy)) => equal_containers(arena, cx, cy, visiting),
                _ => false,
            };
            visiting.remove(&(*x, *y));
            equal
        }
        (Value::Node(_), _) | (_, Value::Node(_)) => false,
        _ => a == b,
    }
}

fn equal_containers(
    arena: &Arena,
    a: &Container,
    b: &Container,
    visiting: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Container::Map(ma), Container::Map(mb)) => {
            if ma.len() != mb.len() {
                return false;
            }
            for (key, va) in ma {
                match mb.get(key) {
                    Some(vb) => {
                        if !equal_values(arena, va, vb, visiting) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            true
        }
        (Container::Seq(sa), Container::Seq(sb)) => {
            if sa.len() != sb.len() {
                return false;
            }
            for (ia, ib) in sa.iter().zip(sb) {
                match (ia, ib) {
                    (None, None) => {}
                    (Some(va), Some(vb)) => {
                        if !equal_values(arena, va, vb, visiting) {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
            true
        }
        _ => false,
    }
}
