//! Typed custom fields.
//!
//! A field's `config` is a tagged union bound to its type. The constructors
//! here are the single entry point for building configs, so an invalid shape
//! (empty select options, `max_rating` of 0, a non-empty boolean config)
//! can never reach the store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Custom field type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Select,
    Rating,
    Text,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Select => "select",
            FieldType::Rating => "rating",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(FieldType::Select),
            "rating" => Ok(FieldType::Rating),
            "text" => Ok(FieldType::Text),
            "boolean" => Ok(FieldType::Boolean),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

/// Errors from config construction and updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldConfigError {
    #[error("select fields need at least one option")]
    EmptyOptions,
    #[error("select options must be non-empty strings")]
    BlankOption,
    #[error("select options must be unique")]
    DuplicateOption,
    #[error("max_rating must be between 1 and 10")]
    RatingOutOfRange,
    #[error("max_length must be at least 1")]
    InvalidMaxLength,
    #[error("config does not match field type {field_type}: {detail}")]
    Shape {
        field_type: FieldType,
        detail: String,
    },
}

/// Typed field configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldConfig {
    Select { options: Vec<String> },
    Rating { max_rating: u8 },
    Text { max_length: Option<u32> },
    Boolean,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectShape {
    options: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RatingShape {
    max_rating: u8,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TextShape {
    #[serde(default)]
    max_length: Option<u32>,
}

impl FieldConfig {
    /// Select config: options must be non-empty, trimmed, unique.
    pub fn select(options: Vec<String>) -> Result<Self, FieldConfigError> {
        if options.is_empty() {
            return Err(FieldConfigError::EmptyOptions);
        }
        let mut seen = Vec::with_capacity(options.len());
        let mut cleaned = Vec::with_capacity(options.len());
        for option in options {
            let trimmed = option.trim().to_string();
            if trimmed.is_empty() {
                return Err(FieldConfigError::BlankOption);
            }
            if seen.contains(&trimmed) {
                return Err(FieldConfigError::DuplicateOption);
            }
            seen.push(trimmed.clone());
            cleaned.push(trimmed);
        }
        Ok(FieldConfig::Select { options: cleaned })
    }

    /// Rating config: `max_rating` in `1..=10`.
    pub fn rating(max_rating: u8) -> Result<Self, FieldConfigError> {
        if !(1..=10).contains(&max_rating) {
            return Err(FieldConfigError::RatingOutOfRange);
        }
        Ok(FieldConfig::Rating { max_rating })
    }

    /// Text config: optional `max_length >= 1`.
    pub fn text(max_length: Option<u32>) -> Result<Self, FieldConfigError> {
        if matches!(max_length, Some(0)) {
            return Err(FieldConfigError::InvalidMaxLength);
        }
        Ok(FieldConfig::Text { max_length })
    }

    pub fn boolean() -> Self {
        FieldConfig::Boolean
    }

    /// Rebuild a config from the persisted `(field_type, config)` pair, or
    /// validate a client-supplied config blob against a declared type.
    pub fn from_parts(field_type: FieldType, config: &Value) -> Result<Self, FieldConfigError> {
        let shape_err = |e: serde_json::Error| FieldConfigError::Shape {
            field_type,
            detail: e.to_string(),
        };
        match field_type {
            FieldType::Select => {
                let shape: SelectShape =
                    serde_json::from_value(config.clone()).map_err(shape_err)?;
                Self::select(shape.options)
            }
            FieldType::Rating => {
                let shape: RatingShape =
                    serde_json::from_value(config.clone()).map_err(shape_err)?;
                Self::rating(shape.max_rating)
            }
            FieldType::Text => {
                let shape: TextShape =
                    serde_json::from_value(config.clone()).map_err(shape_err)?;
                Self::text(shape.max_length)
            }
            FieldType::Boolean => {
                // Boolean carries no configuration at all.
                match config {
                    Value::Object(map) if map.is_empty() => Ok(FieldConfig::Boolean),
                    _ => Err(FieldConfigError::Shape {
                        field_type,
                        detail: "boolean config must be an empty object".to_string(),
                    }),
                }
            }
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldConfig::Select { .. } => FieldType::Select,
            FieldConfig::Rating { .. } => FieldType::Rating,
            FieldConfig::Text { .. } => FieldType::Text,
            FieldConfig::Boolean => FieldType::Boolean,
        }
    }

    /// Config blob as persisted (no discriminator; that lives in its own
    /// column).
    pub fn to_json(&self) -> Value {
        match self {
            FieldConfig::Select { options } => serde_json::json!({ "options": options }),
            FieldConfig::Rating { max_rating } => serde_json::json!({ "max_rating": max_rating }),
            FieldConfig::Text { max_length } => match max_length {
                Some(max) => serde_json::json!({ "max_length": max }),
                None => serde_json::json!({}),
            },
            FieldConfig::Boolean => serde_json::json!({}),
        }
    }

    /// Coerce a raw JSON value into this field's typed value.
    ///
    /// `null` clears the value and is always accepted.
    pub fn coerce(&self, raw: &Value) -> Result<Option<FieldValue>, ValueError> {
        if raw.is_null() {
            return Ok(None);
        }
        match self {
            FieldConfig::Rating { max_rating } => {
                let number = raw.as_f64().ok_or(ValueError::WrongType {
                    expected: "integer",
                })?;
                if number.fract() != 0.0 {
                    return Err(ValueError::NotAnInteger);
                }
                let value = number as i64;
                if value < 0 || value > i64::from(*max_rating) {
                    return Err(ValueError::OutOfRange {
                        max: u32::from(*max_rating),
                    });
                }
                Ok(Some(FieldValue::Number(value as f64)))
            }
            FieldConfig::Select { options } => {
                let text = raw.as_str().ok_or(ValueError::WrongType { expected: "string" })?;
                if !options.iter().any(|o| o == text) {
                    return Err(ValueError::UnknownOption {
                        value: text.to_string(),
                    });
                }
                Ok(Some(FieldValue::Text(text.to_string())))
            }
            FieldConfig::Text { max_length } => {
                let text = raw.as_str().ok_or(ValueError::WrongType { expected: "string" })?;
                if let Some(max) = max_length {
                    if text.chars().count() as u32 > *max {
                        return Err(ValueError::TooLong { max: *max });
                    }
                }
                Ok(Some(FieldValue::Text(text.to_string())))
            }
            FieldConfig::Boolean => {
                let flag = raw.as_bool().ok_or(ValueError::WrongType {
                    expected: "boolean",
                })?;
                Ok(Some(FieldValue::Boolean(flag)))
            }
        }
    }
}

/// Errors from coercing a raw value into a typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected a {expected} value")]
    WrongType { expected: &'static str },
    #[error("rating must be a whole number")]
    NotAnInteger,
    #[error("rating must be between 0 and {max}")]
    OutOfRange { max: u32 },
    #[error("'{value}' is not one of the field's options")]
    UnknownOption { value: String },
    #[error("text exceeds the maximum length of {max}")]
    TooLong { max: u32 },
    #[error("value columns are inconsistent")]
    InconsistentColumns,
}

/// A typed field value. Exactly one of the three storage columns is
/// populated, selected by the field's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl FieldValue {
    /// Split into the `(text, numeric, boolean)` storage columns.
    pub fn columns(&self) -> (Option<&str>, Option<f64>, Option<bool>) {
        match self {
            FieldValue::Text(s) => (Some(s), None, None),
            FieldValue::Number(n) => (None, Some(*n), None),
            FieldValue::Boolean(b) => (None, None, Some(*b)),
        }
    }

    /// Rebuild from storage columns. All-null means "cleared"; more than one
    /// populated column is a corrupt row.
    pub fn from_columns(
        text: Option<String>,
        numeric: Option<f64>,
        boolean: Option<bool>,
    ) -> Result<Option<Self>, ValueError> {
        match (text, numeric, boolean) {
            (None, None, None) => Ok(None),
            (Some(s), None, None) => Ok(Some(FieldValue::Text(s))),
            (None, Some(n), None) => Ok(Some(FieldValue::Number(n))),
            (None, None, Some(b)) => Ok(Some(FieldValue::Boolean(b))),
            _ => Err(ValueError::InconsistentColumns),
        }
    }

    /// JSON representation for API responses.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
        }
    }
}

/// A per-list custom field definition.
///
/// Unique per `(list_id, lowercase(name))`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CustomField {
    pub id: Uuid,
    pub list_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub config: FieldConfig,
    pub created_at: DateTime<Utc>,
}

impl CustomField {
    pub fn field_type(&self) -> FieldType {
        self.config.field_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_constructor_rules() {
        assert!(FieldConfig::select(vec![]).is_err());
        assert!(FieldConfig::select(vec!["a".into(), "  ".into()]).is_err());
        assert!(FieldConfig::select(vec!["a".into(), "a".into()]).is_err());
        assert!(FieldConfig::select(vec!["a".into(), "b".into()]).is_ok());
    }

    #[test]
    fn rating_constructor_rules() {
        assert!(FieldConfig::rating(0).is_err());
        assert!(FieldConfig::rating(11).is_err());
        assert!(FieldConfig::rating(1).is_ok());
        assert!(FieldConfig::rating(10).is_ok());
    }

    #[test]
    fn text_constructor_rules() {
        assert!(FieldConfig::text(Some(0)).is_err());
        assert!(FieldConfig::text(Some(1)).is_ok());
        assert!(FieldConfig::text(None).is_ok());
    }

    #[test]
    fn boolean_config_must_be_empty() {
        assert!(FieldConfig::from_parts(FieldType::Boolean, &json!({})).is_ok());
        assert!(FieldConfig::from_parts(FieldType::Boolean, &json!({"x": 1})).is_err());
        assert!(FieldConfig::from_parts(FieldType::Boolean, &json!(null)).is_err());
    }

    #[test]
    fn from_parts_rejects_mismatched_shape() {
        assert!(FieldConfig::from_parts(FieldType::Rating, &json!({"options": ["a"]})).is_err());
        assert!(FieldConfig::from_parts(FieldType::Select, &json!({"max_rating": 5})).is_err());
    }

    #[test]
    fn from_parts_round_trips() {
        let config = FieldConfig::select(vec!["a".into(), "b".into()]).unwrap();
        let rebuilt = FieldConfig::from_parts(FieldType::Select, &config.to_json()).unwrap();
        assert_eq!(config, rebuilt);

        let config = FieldConfig::text(None).unwrap();
        let rebuilt = FieldConfig::from_parts(FieldType::Text, &config.to_json()).unwrap();
        assert_eq!(config, rebuilt);
    }

    #[test]
    fn rating_coercion_bounds() {
        let config = FieldConfig::rating(5).unwrap();
        assert!(config.coerce(&json!(6)).is_err());
        assert!(config.coerce(&json!(-1)).is_err());
        assert!(config.coerce(&json!(2.5)).is_err());
        assert!(config.coerce(&json!("3")).is_err());
        assert_eq!(
            config.coerce(&json!(5)).unwrap(),
            Some(FieldValue::Number(5.0))
        );
        assert_eq!(config.coerce(&json!(0)).unwrap(), Some(FieldValue::Number(0.0)));
        assert_eq!(config.coerce(&json!(null)).unwrap(), None);
    }

    #[test]
    fn select_coercion_checks_options() {
        let config = FieldConfig::select(vec!["easy".into(), "hard".into()]).unwrap();
        assert_eq!(
            config.coerce(&json!("easy")).unwrap(),
            Some(FieldValue::Text("easy".into()))
        );
        assert!(config.coerce(&json!("medium")).is_err());
    }

    #[test]
    fn text_coercion_respects_max_length() {
        let config = FieldConfig::text(Some(3)).unwrap();
        assert!(config.coerce(&json!("abcd")).is_err());
        assert!(config.coerce(&json!("abc")).is_ok());

        let unbounded = FieldConfig::text(None).unwrap();
        assert!(unbounded.coerce(&json!("a".repeat(10_000))).is_ok());
    }

    #[test]
    fn boolean_coercion() {
        let config = FieldConfig::boolean();
        assert_eq!(
            config.coerce(&json!(true)).unwrap(),
            Some(FieldValue::Boolean(true))
        );
        assert!(config.coerce(&json!("true")).is_err());
    }

    #[test]
    fn value_columns_are_exclusive() {
        let (t, n, b) = FieldValue::Number(4.0).columns();
        assert!(t.is_none());
        assert_eq!(n, Some(4.0));
        assert!(b.is_none());

        assert_eq!(FieldValue::from_columns(None, None, None).unwrap(), None);
        assert!(FieldValue::from_columns(Some("x".into()), Some(1.0), None).is_err());
    }
}
