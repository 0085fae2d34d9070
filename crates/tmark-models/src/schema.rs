//! Field schemas: ordered, reusable compositions of custom fields.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of fields a schema may surface on list/grid cards.
pub const MAX_CARD_FIELDS: usize = 3;

/// A named, ordered set of fields attachable to a tag.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldSchema {
    pub id: Uuid,
    pub list_id: Uuid,
    pub name: String,
    /// The workspace default schema applies to every video in the list
    pub is_workspace_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Membership of a field in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaField {
    pub field_id: Uuid,
    /// Position within the schema; unique, gaps allowed
    pub display_order: i32,
    pub show_on_card: bool,
}

/// Schema write rejected because it would break a structural invariant.
///
/// `rule()` is the stable machine-readable rule identifier surfaced to
/// clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaInvariantError {
    #[error("a schema may show at most {MAX_CARD_FIELDS} fields on cards")]
    TooManyCardFields,
    #[error("display_order values must be unique within a schema")]
    DuplicateDisplayOrder,
    #[error("a field may appear only once in a schema")]
    DuplicateField,
    #[error("display_order must be non-negative")]
    NegativeDisplayOrder,
    #[error("field {0} does not belong to the schema's list")]
    ForeignField(Uuid),
}

impl SchemaInvariantError {
    pub fn rule(&self) -> String {
        match self {
            SchemaInvariantError::TooManyCardFields => {
                format!("max_show_on_card={MAX_CARD_FIELDS}")
            }
            SchemaInvariantError::DuplicateDisplayOrder => "unique_display_order".to_string(),
            SchemaInvariantError::DuplicateField => "unique_field_id".to_string(),
            SchemaInvariantError::NegativeDisplayOrder => "non_negative_display_order".to_string(),
            SchemaInvariantError::ForeignField(_) => "field_belongs_to_list".to_string(),
        }
    }
}

/// Validate a full schema membership set.
///
/// Checks the card cap, order uniqueness, and field uniqueness. Whether each
/// field belongs to the schema's list is checked at the store layer, which
/// knows the list.
pub fn validate_schema_fields(fields: &[SchemaField]) -> Result<(), SchemaInvariantError> {
    let card_count = fields.iter().filter(|sf| sf.show_on_card).count();
    if card_count > MAX_CARD_FIELDS {
        return Err(SchemaInvariantError::TooManyCardFields);
    }

    let mut orders = HashSet::with_capacity(fields.len());
    let mut ids = HashSet::with_capacity(fields.len());
    for sf in fields {
        if sf.display_order < 0 {
            return Err(SchemaInvariantError::NegativeDisplayOrder);
        }
        if !orders.insert(sf.display_order) {
            return Err(SchemaInvariantError::DuplicateDisplayOrder);
        }
        if !ids.insert(sf.field_id) {
            return Err(SchemaInvariantError::DuplicateField);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf(order: i32, card: bool) -> SchemaField {
        SchemaField {
            field_id: Uuid::new_v4(),
            display_order: order,
            show_on_card: card,
        }
    }

    #[test]
    fn card_cap_enforced() {
        let fields = vec![sf(0, true), sf(1, true), sf(2, true), sf(3, true)];
        assert_eq!(
            validate_schema_fields(&fields),
            Err(SchemaInvariantError::TooManyCardFields)
        );
        assert_eq!(
            SchemaInvariantError::TooManyCardFields.rule(),
            "max_show_on_card=3"
        );
    }

    #[test]
    fn three_cards_allowed() {
        let fields = vec![sf(0, true), sf(1, true), sf(2, true), sf(3, false)];
        assert!(validate_schema_fields(&fields).is_ok());
    }

    #[test]
    fn duplicate_order_rejected() {
        let fields = vec![sf(0, false), sf(0, false)];
        assert_eq!(
            validate_schema_fields(&fields),
            Err(SchemaInvariantError::DuplicateDisplayOrder)
        );
    }

    #[test]
    fn duplicate_field_rejected() {
        let field_id = Uuid::new_v4();
        let fields = vec![
            SchemaField {
                field_id,
                display_order: 0,
                show_on_card: false,
            },
            SchemaField {
                field_id,
                display_order: 1,
                show_on_card: false,
            },
        ];
        assert_eq!(
            validate_schema_fields(&fields),
            Err(SchemaInvariantError::DuplicateField)
        );
    }

    #[test]
    fn gaps_in_order_allowed() {
        let fields = vec![sf(0, false), sf(10, false), sf(7, false)];
        assert!(validate_schema_fields(&fields).is_ok());
    }

    #[test]
    fn negative_order_rejected() {
        let fields = vec![sf(-1, false)];
        assert_eq!(
            validate_schema_fields(&fields),
            Err(SchemaInvariantError::NegativeDisplayOrder)
        );
    }
}
