//! Type definitions for paths and listener patterns.

use std::fmt;

/// A single key in a concrete path.
///
/// Sequence indices are materialized as their decimal string form, so the
/// key `3` and the key `"3"` are the same key.
pub type Key = String;

/// A concrete path: the ordered keys leading from a root to a value.
pub type Path = Vec<Key>;

/// A listener pattern: a path that may contain [`EACH`] and end in [`TREE`].
pub type Pattern = Vec<Segment>;

/// One segment of a listener pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A literal key.
    Key(Key),
    /// Any single sequence index at this position.
    Each,
    /// The remainder of any path, including the empty remainder. Only valid
    /// as the final segment of a pattern.
    Tree,
}

/// Matches any single sequence-index segment.
pub const EACH: Segment = Segment::Each;

/// Matches the remainder of any path.
pub const TREE: Segment = Segment::Tree;

impl Segment {
    /// Returns the literal key, if this segment is one.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            _ => None,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Segment::Tree)
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<&String> for Segment {
    fn from(key: &String) -> Self {
        Segment::Key(key.clone())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Key(index.to_string())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => crate::write_key(f, key),
            Segment::Each => f.write_str("[each]"),
            Segment::Tree => f.write_str("[tree]"),
        }
    }
}

/// Builds a pattern from a concrete path, one literal segment per key.
pub fn literal_pattern(path: &[Key]) -> Pattern {
    path.iter().map(Segment::from).collect()
}
