//! Validation functions for listener patterns.

use thiserror::Error;

use crate::types::Segment;

/// Maximum allowed pattern depth.
const MAX_PATTERN_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("TREE must be the final segment of a pattern (found at {position})")]
    TreeNotLast { position: usize },
    #[error("Pattern too long")]
    PatternTooLong,
}

/// Validate a listener pattern.
///
/// # Errors
///
/// Returns an error if:
/// - [`TREE`](crate::TREE) appears anywhere but the last position
/// - The pattern exceeds the maximum depth (256 segments)
///
/// # Example
///
/// ```
/// use objerve_path::{validate_pattern, Segment, EACH, TREE};
///
/// assert!(validate_pattern(&[Segment::from("a"), EACH, TREE]).is_ok());
/// assert!(validate_pattern(&[TREE, Segment::from("a")]).is_err());
/// ```
pub fn validate_pattern(pattern: &[Segment]) -> Result<(), PatternError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(PatternError::PatternTooLong);
    }
    let last = pattern.len().saturating_sub(1);
    for (position, segment) in pattern.iter().enumerate() {
        if segment.is_tree() && position != last {
            return Err(PatternError::TreeNotLast { position });
        }
    }
    Ok(())
}
