//! API error types.
//!
//! Every user-visible error carries a stable code string; clients key
//! behavior off the code, never the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use tmark_models::CustomField;
use tmark_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("a field named '{}' already exists", existing.name)]
    DuplicateName { existing: Box<CustomField> },

    #[error("field is still referenced")]
    FieldInUse { references: Vec<String> },

    #[error("{message}")]
    SchemaInvariant { rule: String, message: String },

    #[error("video already has a category tag")]
    CategoryInvariant,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_)
            | ApiError::SchemaInvariant { .. }
            | ApiError::CategoryInvariant => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateName { .. } | ApiError::FieldInUse { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "auth_failed",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) | ApiError::BadRequest(_) => "validation_error",
            ApiError::DuplicateName { .. } => "duplicate_name",
            ApiError::FieldInUse { .. } => "field_in_use",
            ApiError::SchemaInvariant { .. } => "schema_invariant_violated",
            ApiError::CategoryInvariant => "category_invariant_violated",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity } => ApiError::NotFound(format!("{entity} not found")),
            StoreError::DuplicateName { existing } => ApiError::DuplicateName { existing },
            StoreError::FieldInUse { references } => ApiError::FieldInUse { references },
            StoreError::SchemaInvariant(inner) => ApiError::SchemaInvariant {
                rule: inner.rule(),
                message: inner.to_string(),
            },
            StoreError::CategoryInvariant => ApiError::CategoryInvariant,
            StoreError::InvalidConfig(inner) => ApiError::Validation(inner.to_string()),
            StoreError::InvalidTag(inner) => ApiError::Validation(inner.to_string()),
            StoreError::InvalidValue { .. } | StoreError::ConfirmationRequired { .. } => {
                ApiError::Validation(e.to_string())
            }
            StoreError::Database(_) | StoreError::Serialization(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<tmark_queue::QueueError> for ApiError {
    fn from(e: tmark_queue::QueueError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<CustomField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    references: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Internal detail stays out of production responses.
        let message = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let (field, references, rule) = match self {
            ApiError::DuplicateName { existing } => (Some(*existing), None, None),
            ApiError::FieldInUse { references } => (None, Some(references), None),
            ApiError::SchemaInvariant { rule, .. } => (None, None, Some(rule)),
            _ => (None, None, None),
        };

        let body = ErrorResponse {
            code,
            message,
            field,
            references,
            rule,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ApiError::CategoryInvariant.code(), "category_invariant_violated");
        assert_eq!(ApiError::validation("x").code(), "validation_error");
        assert_eq!(
            ApiError::FieldInUse { references: vec![] }.code(),
            "field_in_use"
        );
    }

    #[test]
    fn store_schema_errors_carry_the_rule() {
        let store_err =
            StoreError::SchemaInvariant(tmark_models::SchemaInvariantError::TooManyCardFields);
        match ApiError::from(store_err) {
            ApiError::SchemaInvariant { rule, .. } => assert_eq!(rule, "max_show_on_card=3"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
