//! Paths and listener patterns for objerve.
//!
//! A concrete [`Path`] is a list of string keys; sequence indices are keys in
//! their decimal form. A [`Pattern`] is what listeners register under: a path
//! whose segments may also be [`EACH`] (any sequence index) and whose last
//! segment may be [`TREE`] (anything below).
//!
//! # Example
//!
//! ```
//! use objerve_path::{format_path, generalize, pattern_matches, Segment, EACH};
//!
//! let path: Vec<String> = vec!["todos".into(), "3".into(), "done".into()];
//! assert_eq!(format_path(&path), "/todos/3/done");
//!
//! let pattern = vec![Segment::from("todos"), EACH, Segment::from("done")];
//! assert!(pattern_matches(&pattern, &path));
//! assert!(generalize(&path).contains(&pattern));
//! ```

pub mod generalize;
pub mod pattern_map;
pub mod types;
pub mod validate;

pub use generalize::{expansions, generalize, pattern_matches};
pub use pattern_map::{Cursor, PatternMap};
pub use types::{literal_pattern, Key, Path, Pattern, Segment, EACH, TREE};
pub use validate::{validate_pattern, PatternError};

use std::fmt;

/// Format path keys for diagnostics, pointer style (`/todos/3/done`). `~` and
/// `/` inside a key are written as `~0` and `~1`. The root path formats as `""`.
pub fn format_path(path: &[Key]) -> String {
    let mut out = String::new();
    for key in path {
        out.push('/');
        // writing into a String cannot fail
        let _ = write_key(&mut out, key);
    }
    out
}

pub(crate) fn write_key(out: &mut impl fmt::Write, key: &str) -> fmt::Result {
    for ch in key.chars() {
        match ch {
            '~' => out.write_str("~0")?,
            '/' => out.write_str("~1")?,
            _ => out.write_char(ch)?,
        }
    }
    Ok(())
}

/// Format a pattern for diagnostics, e.g. `/todos/[each]/[tree]`.
pub fn format_pattern(pattern: &[Segment]) -> String {
    let mut out = String::new();
    for segment in pattern {
        out.push('/');
        out.push_str(&segment.to_string());
    }
    out
}

/// Returns `true` when `key` is a canonical sequence index: ASCII digits
/// without a leading zero (except `"0"` itself).
///
/// # Example
///
/// ```
/// use objerve_path::is_index;
///
/// assert!(is_index("0"));
/// assert!(is_index("123"));
/// assert!(!is_index("007"));
/// assert!(!is_index("-1"));
/// assert!(!is_index("length"));
/// ```
pub fn is_index(key: &str) -> bool {
    match key.as_bytes() {
        [b'0'] => true,
        [b'1'..=b'9', rest @ ..] => rest.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Parse a canonical sequence index.
pub fn parse_index(key: &str) -> Option<usize> {
    if is_index(key) {
        key.parse().ok()
    } else {
        None
    }
}

/// Check if `prefix` is a (non-strict) prefix of `path`.
///
/// # Example
///
/// ```
/// use objerve_path::is_prefix;
///
/// let a = vec!["a".to_string()];
/// let ab = vec!["a".to_string(), "b".to_string()];
/// assert!(is_prefix(&a, &ab));
/// assert!(is_prefix(&ab, &ab));
/// assert!(!is_prefix(&ab, &a));
/// ```
pub fn is_prefix(prefix: &[Key], path: &[Key]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

/// Check if `parent` is a strict prefix of `child`.
pub fn is_child(parent: &[Key], child: &[Key]) -> bool {
    parent.len() < child.len() && is_prefix(parent, child)
}

/// `base` followed by `key`.
pub fn join(base: &[Key], key: &str) -> Path {
    let mut out = Vec::with_capacity(base.len() + 1);
    out.extend_from_slice(base);
    out.push(key.to_string());
    out
}
