//! Validation capability for request types.
//!
//! A request type implements [`Validate`] to check its bound fields and to
//! fill in defaults. Violations are collected per field so the error
//! translation layer can report all of them at once.

use serde::{Deserialize, Serialize};

/// Validation trait for request types.
///
/// `validate` takes `&mut self` because implementations may apply default
/// values (page size, sort order, ...) as part of validation. It is called
/// exactly once, after binding and before any business logic.
pub trait Validate {
    fn validate(&mut self) -> Result<(), ValidationError>;
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Name of the offending field as it appears on the wire.
    pub field: String,
    /// Short rule name (`required`, `max`, `oneof`, ...).
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

/// Bound values violate the request's declared rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Error carrying a single violation.
    pub fn single(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                rule: rule.into(),
                message: message.into(),
            }],
        }
    }

    /// Whether `field` is among the violations.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.violations.iter().map(|v| v.message.as_str()).collect();
        write!(f, "validation failed: {}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Collects violations while a request is being checked.
///
/// ```
/// use modgate_service_shared::Violations;
///
/// let title = "";
/// let mut v = Violations::new();
/// v.require(!title.trim().is_empty(), "title", "required", "title is required");
/// assert!(v.finish().is_err());
/// ```
#[derive(Debug, Default)]
pub struct Violations {
    found: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unless `ok` holds.
    pub fn require(&mut self, ok: bool, field: &str, rule: &str, message: impl Into<String>) {
        if !ok {
            self.found.push(FieldViolation {
                field: field.to_string(),
                rule: rule.to_string(),
                message: message.into(),
            });
        }
    }

    /// Check a string length in characters, inclusive on both ends.
    pub fn length(&mut self, value: &str, field: &str, min: usize, max: usize) {
        let len = value.chars().count();
        self.require(
            len >= min,
            field,
            "min",
            format!("{field} must be at least {min} characters"),
        );
        self.require(
            len <= max,
            field,
            "max",
            format!("{field} must be at most {max} characters"),
        );
    }

    /// Check that `value` is one of `allowed`.
    pub fn one_of(&mut self, value: &str, field: &str, allowed: &[&str]) {
        self.require(
            allowed.contains(&value),
            field,
            "oneof",
            format!("{field} must be one of: {}", allowed.join(", ")),
        );
    }

    /// Check an inclusive numeric range.
    pub fn range(&mut self, value: u32, field: &str, min: u32, max: u32) {
        self.require(
            (min..=max).contains(&value),
            field,
            "range",
            format!("{field} must be between {min} and {max}"),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.found.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_empty_is_ok() {
        let mut v = Violations::new();
        v.require(true, "title", "required", "title is required");
        v.length("abc", "title", 1, 10);
        assert!(v.is_empty());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_violations_collects_every_field() {
        let mut v = Violations::new();
        v.length("", "title", 1, 255);
        v.one_of("sideways", "order", &["asc", "desc"]);
        v.range(0, "limit", 1, 100);
        let err = v.finish().unwrap_err();

        assert_eq!(err.violations.len(), 3);
        assert!(err.has_field("title"));
        assert!(err.has_field("order"));
        assert!(err.has_field("limit"));
        assert!(err.to_string().starts_with("validation failed:"));
    }

    #[test]
    fn test_length_counts_chars() {
        let mut v = Violations::new();
        v.length("ééé", "title", 1, 3);
        assert!(v.is_empty());
    }

    #[test]
    fn test_single() {
        let err = ValidationError::single("id", "uuid", "id must be a UUID");
        assert_eq!(err.violations[0].rule, "uuid");
    }
}
