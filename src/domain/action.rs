//! The client-supplied action name and its validation rules.
//!
//! An [`Action`] names both the cache key and the stored procedure to invoke.
//! Because the name is later embedded into a database command, nothing
//! downstream may see it before it has fully matched the configured pattern.
//! The validator enforces the full match itself rather than trusting the
//! operator to anchor the pattern.

use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Upper bound on the action name, in bytes.
pub const MAX_ACTION_BYTES: usize = 255;

/// A validated action name.
///
/// Can only be obtained through [`validate`], so holding one is proof the
/// value passed presence, length, and pattern checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action(String);

impl Action {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while validating an action parameter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("query parameter `{param}` missing")]
    MissingParameter { param: String },
    #[error("action exceeds {MAX_ACTION_BYTES} bytes ({length})")]
    ParameterTooLong { length: usize },
    #[error("validation pattern `{pattern}` failed to compile: {reason}")]
    PatternCompile { pattern: String, reason: String },
    #[error("action does not match the validation pattern")]
    PatternMismatch,
}

/// Validate the raw parameter value against the configured pattern.
///
/// Checks run in order: presence, byte length, then a full match of the
/// pattern compiled fresh for this request (a deployment may change the
/// pattern between restarts, and an invalid pattern must fail the request it
/// belongs to, not the process).
pub fn validate(
    raw: Option<&str>,
    pattern: &str,
    param: &str,
) -> Result<Action, ValidationError> {
    let value = raw.ok_or_else(|| ValidationError::MissingParameter {
        param: param.to_string(),
    })?;

    if value.len() > MAX_ACTION_BYTES {
        return Err(ValidationError::ParameterTooLong {
            length: value.len(),
        });
    }

    let regex = Regex::new(pattern).map_err(|err| ValidationError::PatternCompile {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })?;

    // The match must span the whole input even when the configured pattern is
    // unanchored; a partial match admits arbitrary surrounding bytes.
    let full_match = regex
        .find(value)
        .is_some_and(|found| found.start() == 0 && found.end() == value.len());
    if !full_match {
        return Err(ValidationError::PatternMismatch);
    }

    Ok(Action(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = "^[a-zA-Z0-9-_]+$";

    #[test]
    fn well_formed_action_passes() {
        let action = validate(Some("get_user"), PATTERN, "sp").expect("valid action");
        assert_eq!(action.as_str(), "get_user");
    }

    #[test]
    fn absent_parameter_is_rejected() {
        let err = validate(None, PATTERN, "sp").expect_err("missing parameter");
        assert_eq!(
            err,
            ValidationError::MissingParameter {
                param: "sp".to_string()
            }
        );
    }

    #[test]
    fn length_boundary_sits_at_255_bytes() {
        let at_limit = "a".repeat(MAX_ACTION_BYTES);
        assert!(validate(Some(&at_limit), PATTERN, "sp").is_ok());

        let over_limit = "a".repeat(MAX_ACTION_BYTES + 1);
        let err = validate(Some(&over_limit), PATTERN, "sp").expect_err("too long");
        assert_eq!(
            err,
            ValidationError::ParameterTooLong {
                length: MAX_ACTION_BYTES + 1
            }
        );
    }

    #[test]
    fn embedded_space_is_rejected() {
        let err = validate(Some("bad name"), PATTERN, "sp").expect_err("space");
        assert_eq!(err, ValidationError::PatternMismatch);
    }

    #[test]
    fn empty_value_is_rejected() {
        let err = validate(Some(""), PATTERN, "sp").expect_err("empty");
        assert_eq!(err, ValidationError::PatternMismatch);
    }

    #[test]
    fn unanchored_pattern_still_requires_a_full_match() {
        // `[a-z]+` alone would find "drop" inside "x;drop"; the validator
        // must not accept a partial match.
        let err = validate(Some("x;drop"), "[a-z]+", "sp").expect_err("partial match");
        assert_eq!(err, ValidationError::PatternMismatch);

        assert!(validate(Some("drop"), "[a-z]+", "sp").is_ok());
    }

    #[test]
    fn invalid_pattern_reports_compile_failure() {
        let err = validate(Some("get_user"), "(", "sp").expect_err("bad pattern");
        assert!(matches!(err, ValidationError::PatternCompile { .. }));
    }
}
