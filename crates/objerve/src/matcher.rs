//! Matching concrete paths against registered listener patterns.
//!
//! Instead of expanding every generalization of a path up front, the walk
//! carries a set of live trie cursors (one per pattern prefix that can still
//! match) and the `TREE` patterns already in effect. A branch is only
//! explored while at least one of those can still produce a match.

use objerve_path::{is_index, Cursor, Key, Path, Pattern, PatternMap, Segment};

use crate::arena::Arena;
use crate::value::{NodeId, Value};

/// Order in which a container and its contents are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Container before contents. Used for creations and changes.
    TrunkFirst,
    /// Contents before container. Used for deletions.
    LeafFirst,
}

/// A registered pattern and the concrete path it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub pattern: Pattern,
    pub path: Path,
}

struct Live<'a, V> {
    pattern: Pattern,
    cursor: Cursor<'a, V>,
}

impl<V> Clone for Live<'_, V> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            cursor: self.cursor,
        }
    }
}

/// Registered `TREE` patterns rooted at the current depth, in cursor order.
fn tree_starts<V>(live: &[Live<'_, V>]) -> Vec<Pattern> {
    live.iter()
        .filter(|l| l.cursor.child(&Segment::Tree).and_then(|c| c.value()).is_some())
        .map(|l| {
            let mut pattern = l.pattern.clone();
            pattern.push(Segment::Tree);
            pattern
        })
        .collect()
}

/// Steps every live cursor into `key`: the literal branch first, then the
/// `EACH` branch for index keys.
fn advance<'a, V>(live: &[Live<'a, V>], key: &str) -> Vec<Live<'a, V>> {
    let literal = Segment::Key(key.to_string());
    let mut out = Vec::new();
    for l in live {
        if let Some(cursor) = l.cursor.child(&literal) {
            let mut pattern = l.pattern.clone();
            pattern.push(literal.clone());
            out.push(Live { pattern, cursor });
        }
        if is_index(key) {
            if let Some(cursor) = l.cursor.child(&Segment::Each) {
                let mut pattern = l.pattern.clone();
                pattern.push(Segment::Each);
                out.push(Live { pattern, cursor });
            }
        }
    }
    out
}

/// Walks the registry along `prefix`, returning the cursors still alive at
/// its end and the `TREE` patterns that started above it (deepest first).
fn descend<'a, V>(index: &'a PatternMap<V>, prefix: &[Key]) -> (Vec<Live<'a, V>>, Vec<Pattern>) {
    let Some(root) = index.cursor() else {
        return (Vec::new(), Vec::new());
    };
    let mut live = vec![Live {
        pattern: Vec::new(),
        cursor: root,
    }];
    let mut trees: Vec<Pattern> = Vec::new();
    for key in prefix {
        let mut started = tree_starts(&live);
        started.append(&mut trees);
        trees = started;
        live = advance(&live, key);
        if live.is_empty() && trees.is_empty() {
            break;
        }
    }
    (live, trees)
}

/// Registered patterns matching exactly `path`: exact and `EACH` forms
/// first, then `TREE` patterns from the deepest prefix to the root.
pub fn patterns_for_path<V>(index: &PatternMap<V>, path: &[Key]) -> Vec<Pattern> {
    let (live, trees) = descend(index, path);
    let mut out: Vec<Pattern> = live
        .iter()
        .filter(|l| l.cursor.value().is_some())
        .map(|l| l.pattern.clone())
        .collect();
    out.extend(tree_starts(&live));
    out.extend(trees);
    out
}

/// Every concrete path at or below `prefix` (with `value` sitting at
/// `prefix`) that matches a registered pattern.
///
/// Only branches some pattern can still match are explored. `seed` lists
/// containers already being traversed by the caller (the ancestors of
/// `prefix`); a container met again while it is on the descent stack is
/// reported but not descended into.
pub fn find_matching_paths<V>(
    arena: &Arena,
    index: &PatternMap<V>,
    value: Option<&Value>,
    prefix: &[Key],
    order: SortOrder,
    seed: &[NodeId],
) -> Vec<Match> {
    let (live, trees) = descend(index, prefix);
    let mut walker = Walker {
        arena,
        order,
        stack: seed.to_vec(),
        out: Vec::new(),
    };
    let mut path = prefix.to_vec();
    walker.visit(value, &mut path, &live, &trees);
    walker.out
}

struct Walker<'r> {
    arena: &'r Arena,
    order: SortOrder,
    stack: Vec<NodeId>,
    out: Vec<Match>,
}

impl Walker<'_> {
    fn visit<V>(
        &mut self,
        value: Option<&Value>,
        path: &mut Path,
        live: &[Live<'_, V>],
        inherited: &[Pattern],
    ) {
        let mut trees = tree_starts(live);
        trees.extend_from_slice(inherited);
        if live.is_empty() && trees.is_empty() {
            return;
        }
        match self.order {
            SortOrder::TrunkFirst => {
                self.trunk(path, live, &trees);
                self.leaves(value, path, live, &trees);
            }
            SortOrder::LeafFirst => {
                self.leaves(value, path, live, &trees);
                self.trunk(path, live, &trees);
            }
        }
    }

    fn trunk<V>(&mut self, path: &Path, live: &[Live<'_, V>], trees: &[Pattern]) {
        for l in live {
            if l.cursor.value().is_some() {
                self.out.push(Match {
                    pattern: l.pattern.clone(),
                    path: path.clone(),
                });
            }
        }
        for pattern in trees {
            self.out.push(Match {
                pattern: pattern.clone(),
                path: path.clone(),
            });
        }
    }

    fn leaves<V>(
        &mut self,
        value: Option<&Value>,
        path: &mut Path,
        live: &[Live<'_, V>],
        trees: &[Pattern],
    ) {
        let Some(id) = value.and_then(Value::as_node) else {
            return;
        };
        if self.stack.contains(&id) {
            return;
        }
        let Some(container) = self.arena.container(id) else {
            return;
        };
        self.stack.push(id);
        for key in container.child_keys() {
            let child = container.get(&key);
            let next = advance(live, &key);
            path.push(key);
            self.visit(child.as_ref(), path, &next, trees);
            path.pop();
        }
        self.stack.pop();
    }
}
