//! Store error types.

use thiserror::Error;

use tmark_models::{
    CustomField, FieldConfigError, SchemaInvariantError, TagValidationError, ValueError,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A field with the same name (case-insensitive) already exists in the
    /// list. Carries the existing field so the API can attach it.
    #[error("a field named '{}' already exists", existing.name)]
    DuplicateName { existing: Box<CustomField> },

    /// Field delete blocked; names the schemas and value count that still
    /// reference it.
    #[error("field is referenced by {}", references.join(", "))]
    FieldInUse { references: Vec<String> },

    #[error(transparent)]
    SchemaInvariant(#[from] SchemaInvariantError),

    /// A second category tag was attached without replacing the current one.
    #[error("video already has a category tag")]
    CategoryInvariant,

    #[error(transparent)]
    InvalidConfig(#[from] FieldConfigError),

    #[error(transparent)]
    InvalidTag(#[from] TagValidationError),

    /// A typed-value write failed coercion; names the offending field.
    #[error("invalid value for field '{field_name}': {source}")]
    InvalidValue {
        field_name: String,
        source: ValueError,
    },

    /// A destructive catalog change was requested without confirmation.
    #[error("{action} requires confirmation")]
    ConfirmationRequired { action: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Transaction conflicts worth retrying: serialization failures and
    /// deadlocks.
    pub fn is_tx_conflict(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Map `RowNotFound` onto a domain-level not-found.
pub(crate) fn or_not_found(err: sqlx::Error, entity: &'static str) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::not_found(entity),
        other => StoreError::Database(other),
    }
}
