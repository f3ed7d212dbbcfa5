//! A map keyed by listener patterns.
//!
//! [`PatternMap`] is a trie over [`Segment`]s. Besides plain lookup it
//! answers "is anything registered under this prefix", which lets tree
//! traversals skip branches nobody listens to.

use std::collections::BTreeMap;

use crate::types::{Pattern, Segment};

#[derive(Debug, Clone)]
pub struct PatternMap<V> {
    root: TrieNode<V>,
    len: usize,
}

#[derive(Debug, Clone)]
struct TrieNode<V> {
    value: Option<V>,
    children: BTreeMap<Segment, TrieNode<V>>,
}

impl<V> Default for TrieNode<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<V> TrieNode<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

/// A read-only position inside a [`PatternMap`].
///
/// A cursor only exists for prefixes that have at least one pattern at or
/// beneath them.
#[derive(Debug)]
pub struct Cursor<'a, V> {
    node: &'a TrieNode<V>,
}

impl<V> Clone for Cursor<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Cursor<'_, V> {}

impl<'a, V> Cursor<'a, V> {
    /// Step into `segment`, if anything is registered beneath it.
    pub fn child(&self, segment: &Segment) -> Option<Cursor<'a, V>> {
        self.node.children.get(segment).map(|node| Cursor { node })
    }

    /// The value registered at exactly this prefix.
    pub fn value(&self) -> Option<&'a V> {
        self.node.value.as_ref()
    }
}

impl<V> Default for PatternMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PatternMap<V> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Number of patterns with a value.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cursor at the empty prefix. `None` when the map is empty.
    pub fn cursor(&self) -> Option<Cursor<'_, V>> {
        if self.root.is_empty() {
            None
        } else {
            Some(Cursor { node: &self.root })
        }
    }

    fn node(&self, pattern: &[Segment]) -> Option<&TrieNode<V>> {
        let mut node = &self.root;
        for segment in pattern {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub fn get(&self, pattern: &[Segment]) -> Option<&V> {
        self.node(pattern)?.value.as_ref()
    }

    pub fn get_mut(&mut self, pattern: &[Segment]) -> Option<&mut V> {
        let mut node = &mut self.root;
        for segment in pattern {
            node = node.children.get_mut(segment)?;
        }
        node.value.as_mut()
    }

    pub fn contains(&self, pattern: &[Segment]) -> bool {
        self.get(pattern).is_some()
    }

    /// Returns `true` when some pattern starts with `prefix` (including
    /// `prefix` itself).
    ///
    /// # Example
    ///
    /// ```
    /// use objerve_path::{PatternMap, Segment, TREE};
    ///
    /// let mut map = PatternMap::new();
    /// map.insert(vec![Segment::from("a"), TREE], 1);
    /// assert!(map.has_prefix(&[Segment::from("a")]));
    /// assert!(!map.has_prefix(&[Segment::from("b")]));
    /// ```
    pub fn has_prefix(&self, prefix: &[Segment]) -> bool {
        self.node(prefix).is_some_and(|node| !node.is_empty())
    }

    pub fn insert(&mut self, pattern: Pattern, value: V) -> Option<V> {
        let node = self.node_mut_or_create(&pattern);
        let prev = node.value.replace(value);
        if prev.is_none() {
            self.len += 1;
        }
        prev
    }

    pub fn get_or_insert_with(&mut self, pattern: &[Segment], f: impl FnOnce() -> V) -> &mut V {
        let mut node = &mut self.root;
        for segment in pattern {
            node = node.children.entry(segment.clone()).or_default();
        }
        if node.value.is_none() {
            self.len += 1;
        }
        node.value.get_or_insert_with(f)
    }

    fn node_mut_or_create(&mut self, pattern: &[Segment]) -> &mut TrieNode<V> {
        let mut node = &mut self.root;
        for segment in pattern {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }

    /// Remove the value at `pattern`, pruning branches left empty.
    pub fn remove(&mut self, pattern: &[Segment]) -> Option<V> {
        let removed = remove_at(&mut self.root, pattern);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// All patterns with a value, depth-first.
    pub fn patterns(&self) -> Vec<Pattern> {
        let mut out = Vec::with_capacity(self.len);
        let mut prefix = Vec::new();
        collect_patterns(&self.root, &mut prefix, &mut out);
        out
    }
}

fn remove_at<V>(node: &mut TrieNode<V>, pattern: &[Segment]) -> Option<V> {
    match pattern.split_first() {
        None => node.value.take(),
        Some((head, rest)) => {
            let child = node.children.get_mut(head)?;
            let removed = remove_at(child, rest);
            if child.is_empty() {
                node.children.remove(head);
            }
            removed
        }
    }
}

fn collect_patterns<V>(node: &TrieNode<V>, prefix: &mut Pattern, out: &mut Vec<Pattern>) {
    if node.value.is_some() {
        out.push(prefix.clone());
    }
    for (segment, child) in &node.children {
        prefix.push(segment.clone());
        collect_patterns(child, prefix, out);
        prefix.pop();
    }
}
