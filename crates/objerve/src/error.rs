use objerve_path::PatternError;
use thiserror::Error;

/// Errors returned by [`Observer`](crate::Observer) operations.
///
/// Registration errors are programmer errors and are reported at the call
/// site; tree mutations only fail on handles or keys that cannot exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserveError {
    /// The handle does not name a live, attached observed node.
    #[error("target is not a tracked observed node")]
    InvalidTarget,
    #[error("invalid listener path: {0}")]
    InvalidPath(#[from] PatternError),
    #[error("value is not a container")]
    NotContainer,
    #[error("node is not a sequence")]
    NotSequence,
    /// A sequence only accepts canonical indices below `u32::MAX` and
    /// `length`.
    #[error("key {0:?} is not valid for this container")]
    InvalidKey(String),
    #[error("sequence length must be an integer between 0 and 4294967295")]
    InvalidLength,
    #[error("path not found")]
    NotFound,
    #[error("value contains a reference cycle")]
    Cycle,
}
