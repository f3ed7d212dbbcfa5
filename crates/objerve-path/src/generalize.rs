//! Generalization of concrete paths into the listener patterns that match them.

use crate::is_index;
use crate::types::{Key, Pattern, Segment};

/// Generalise a concrete path, creating every listener pattern that could
/// match it:
///
/// - each index-like key may be itself or [`EACH`](crate::EACH),
/// - [`TREE`](crate::TREE) may terminate the pattern at any depth, from the
///   root prefix up to and including the full path.
///
/// Exact expansions come first (literal before `EACH`, earlier positions
/// varying slowest), followed by the `TREE` patterns from the deepest prefix
/// to the root prefix. The output only depends on `path`.
///
/// # Example
///
/// ```
/// use objerve_path::{generalize, Segment, EACH, TREE};
///
/// let patterns = generalize(&["list".to_string(), "0".to_string()]);
/// assert_eq!(patterns[0], vec![Segment::from("list"), Segment::from("0")]);
/// assert_eq!(patterns[1], vec![Segment::from("list"), EACH]);
/// assert_eq!(patterns.last(), Some(&vec![TREE]));
/// ```
pub fn generalize(path: &[Key]) -> Vec<Pattern> {
    let mut out = expansions(path);
    for depth in (0..=path.len()).rev() {
        for mut prefix in expansions(&path[..depth]) {
            prefix.push(Segment::Tree);
            out.push(prefix);
        }
    }
    out
}

/// Every literal/`EACH` combination of `path`, without `TREE` terminators.
pub fn expansions(path: &[Key]) -> Vec<Pattern> {
    let mut acc: Vec<Pattern> = vec![Vec::with_capacity(path.len())];
    for key in path {
        let mut next = Vec::with_capacity(acc.len() * 2);
        for prefix in acc {
            if is_index(key) {
                let mut each = prefix.clone();
                each.push(Segment::Each);
                let mut literal = prefix;
                literal.push(Segment::Key(key.clone()));
                next.push(literal);
                next.push(each);
            } else {
                let mut literal = prefix;
                literal.push(Segment::Key(key.clone()));
                next.push(literal);
            }
        }
        acc = next;
    }
    acc
}

/// Returns `true` when `pattern` matches the concrete `path`.
///
/// # Example
///
/// ```
/// use objerve_path::{pattern_matches, Segment, EACH, TREE};
///
/// let path = vec!["a".to_string(), "2".to_string(), "b".to_string()];
/// assert!(pattern_matches(&[Segment::from("a"), EACH, Segment::from("b")], &path));
/// assert!(pattern_matches(&[Segment::from("a"), TREE], &path));
/// assert!(!pattern_matches(&[Segment::from("a"), EACH], &path));
/// ```
pub fn pattern_matches(pattern: &[Segment], path: &[Key]) -> bool {
    let mut keys = path.iter();
    for segment in pattern {
        match segment {
            Segment::Tree => return true,
            Segment::Each => match keys.next() {
                Some(key) if is_index(key) => {}
                _ => return false,
            },
            Segment::Key(expected) => match keys.next() {
                Some(key) if key == expected => {}
                _ => return false,
            },
        }
    }
    keys.next().is_none()
}
