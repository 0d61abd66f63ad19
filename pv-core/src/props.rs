//! Typed, validated properties
//!
//! A [`Property`] wraps a single [`Value`] together with its kind, default,
//! and presentation metadata. Writes are validated against the kind; a
//! rejected write leaves the stored value untouched.

use crate::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures raised by a property write
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropError {
    #[error("Expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("{value} is below the minimum {min}")]
    BelowMin { value: f64, min: f64 },

    #[error("{value} is above the maximum {max}")]
    AboveMax { value: f64, max: f64 },

    #[error("{0} is not a finite number")]
    NotFinite(f64),

    #[error("'{value}' is not one of [{}]", .items.join(", "))]
    NotAChoice { value: String, items: Vec<String> },
}

/// What a property accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropKind {
    Bool,
    Int {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Float {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Text,
    Choice { items: Vec<String> },
}

impl PropKind {
    pub fn name(&self) -> &'static str {
        match self {
            PropKind::Bool => "Bool",
            PropKind::Int { .. } => "Int",
            PropKind::Float { .. } => "Float",
            PropKind::Text => "Text",
            PropKind::Choice { .. } => "Choice",
        }
    }

    /// Check `value` against this kind and return the value as it would be
    /// stored (integers written to a float property are widened).
    pub fn coerce(&self, value: Value) -> Result<Value, PropError> {
        let mismatch = |expected: &'static str, value: &Value| PropError::TypeMismatch {
            expected,
            got: value.type_name(),
        };

        match self {
            PropKind::Bool => match value {
                Value::Bool(_) => Ok(value),
                other => Err(mismatch("Bool", &other)),
            },
            PropKind::Int { min, max } => {
                let i = value.as_int().ok_or_else(|| mismatch("Int", &value))?;
                if let Some(min) = min {
                    if i < *min {
                        return Err(PropError::BelowMin { value: i as f64, min: *min as f64 });
                    }
                }
                if let Some(max) = max {
                    if i > *max {
                        return Err(PropError::AboveMax { value: i as f64, max: *max as f64 });
                    }
                }
                Ok(Value::Int(i))
            }
            PropKind::Float { min, max } => {
                let f = value.as_float().ok_or_else(|| mismatch("Float", &value))?;
                if !f.is_finite() {
                    return Err(PropError::NotFinite(f));
                }
                if let Some(min) = min {
                    if f < *min {
                        return Err(PropError::BelowMin { value: f, min: *min });
                    }
                }
                if let Some(max) = max {
                    if f > *max {
                        return Err(PropError::AboveMax { value: f, max: *max });
                    }
                }
                Ok(Value::Float(f))
            }
            PropKind::Text => match value {
                Value::Text(_) => Ok(value),
                other => Err(mismatch("Text", &other)),
            },
            PropKind::Choice { items } => {
                let s = value.as_text().ok_or_else(|| mismatch("Text", &value))?;
                if items.iter().any(|item| item == s) {
                    Ok(value)
                } else {
                    Err(PropError::NotAChoice { value: s.to_string(), items: items.clone() })
                }
            }
        }
    }
}

/// A typed value container with a default
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    label: String,
    description: String,
    #[serde(flatten)]
    kind: PropKind,
    default: Value,
    value: Value,
}

impl Property {
    fn with_kind(kind: PropKind, default: Value) -> Self {
        Self {
            label: String::new(),
            description: String::new(),
            kind,
            value: default.clone(),
            default,
        }
    }

    pub fn bool(default: bool) -> Self {
        Self::with_kind(PropKind::Bool, Value::Bool(default))
    }

    pub fn int(default: i64) -> Self {
        Self::with_kind(PropKind::Int { min: None, max: None }, Value::Int(default))
    }

    pub fn int_range(default: i64, min: i64, max: i64) -> Self {
        Self::with_kind(PropKind::Int { min: Some(min), max: Some(max) }, Value::Int(default))
    }

    pub fn float(default: f64) -> Self {
        Self::with_kind(PropKind::Float { min: None, max: None }, Value::Float(default))
    }

    pub fn float_range(default: f64, min: f64, max: f64) -> Self {
        Self::with_kind(PropKind::Float { min: Some(min), max: Some(max) }, Value::Float(default))
    }

    pub fn text(default: impl Into<String>) -> Self {
        Self::with_kind(PropKind::Text, Value::Text(default.into()))
    }

    pub fn choice(items: &[&str], default: &str) -> Self {
        let items = items.iter().map(|s| s.to_string()).collect();
        Self::with_kind(PropKind::Choice { items }, Value::Text(default.to_string()))
    }

    /// Builder: GUI label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Builder: tooltip text
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &PropKind {
        &self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Validate and store a new value.
    pub fn set(&mut self, value: Value) -> Result<(), PropError> {
        self.value = self.kind.coerce(value)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    /// Check that the default satisfies the kind.
    pub fn validate(&self) -> Result<(), PropError> {
        self.kind.coerce(self.default.clone()).map(|_| ())
    }
}
