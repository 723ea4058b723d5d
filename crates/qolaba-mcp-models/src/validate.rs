//! Request validation.
//!
//! Models deserialize leniently (defaults fill missing fields) and are then
//! checked against their field constraints. All violations are collected,
//! not just the first one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One field-level constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Field that failed validation.
    pub field: String,
    /// Constraint that was violated.
    pub constraint: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// All violations found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn summary(&self) -> String {
        summarize(&self.0)
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checked request models.
pub trait Validate {
    /// Collect every constraint violation in `self`.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Deserialize a raw JSON payload into `T` and validate it.
///
/// A shape mismatch (wrong type, missing required field) is reported as a
/// single `payload` violation; constraint violations are reported per field.
pub fn validate_payload<T>(data: &Value) -> Result<T, ValidationErrors>
where
    T: DeserializeOwned + Validate,
{
    let model: T = serde_json::from_value(data.clone()).map_err(|err| {
        ValidationErrors(vec![ValidationError::new(
            "payload",
            "schema",
            err.to_string(),
        )])
    })?;
    model.validate()?;
    Ok(model)
}

/// Collector used by `Validate` implementations.
#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<ValidationError>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn non_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::new(
                field,
                "non_empty",
                format!("{field} cannot be empty"),
            ));
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.len() > max {
            self.errors.push(ValidationError::new(
                field,
                "max_length",
                format!("{field} too long (max {max} characters)"),
            ));
        }
    }

    pub fn range_u32(&mut self, field: &str, value: u32, min: u32, max: u32) {
        if value < min || value > max {
            self.errors.push(ValidationError::new(
                field,
                "range",
                format!("{field} must be between {min} and {max}"),
            ));
        }
    }

    pub fn range_f64(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if value < min || value > max {
            self.errors.push(ValidationError::new(
                field,
                "range",
                format!("{field} must be between {min} and {max}"),
            ));
        }
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.errors.push(ValidationError::new(
                field,
                "one_of",
                format!("{field} must be one of: {}", allowed.join(", ")),
            ));
        }
    }

    pub fn check(&mut self, condition: bool, field: &str, constraint: &str, message: &str) {
        if !condition {
            self.errors
                .push(ValidationError::new(field, constraint, message));
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
