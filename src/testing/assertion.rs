//! Substring assertions on rendered values

use thiserror::Error;

use super::EvalPath;

/// A rendering that lacks one of its expected substrings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path} '{expression}': \"{missing}\" not found in:\n{actual}")]
pub struct AssertionFailure {
    pub expression: String,
    pub path: EvalPath,
    /// First expected substring that was not found
    pub missing: String,
    /// Full rendering that was searched
    pub actual: String,
}

/// Check that every substring appears in `rendered`, stopping at the first miss
pub fn assert_contains(
    expression: &str,
    path: EvalPath,
    rendered: &str,
    substrings: &[String],
) -> Result<(), AssertionFailure> {
    match substrings.iter().find(|s| !rendered.contains(s.as_str())) {
        Some(missing) => Err(AssertionFailure {
            expression: expression.to_string(),
            path,
            missing: missing.clone(),
            actual: rendered.to_string(),
        }),
        None => Ok(()),
    }
}
