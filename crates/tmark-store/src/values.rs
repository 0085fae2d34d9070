//! Typed field-value repo.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tmark_models::{CustomField, FieldValue};

use crate::error::{StoreError, StoreResult};
use crate::fields::row_to_field;
use crate::videos;

/// A stored value joined with its field definition.
#[derive(Debug, Clone)]
pub struct ValueWithField {
    pub field: CustomField,
    pub value: FieldValue,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a batch write. `value = null` clears.
#[derive(Debug, Clone)]
pub struct ValueUpdate {
    pub field_id: Uuid,
    pub value: serde_json::Value,
}

/// Filled values for a video, joined with their field definitions.
pub async fn for_video(pool: &PgPool, video_id: Uuid) -> StoreResult<Vec<ValueWithField>> {
    let rows = sqlx::query(
        r#"
        SELECT f.id, f.list_id, f.name, f.field_type, f.config, f.created_at,
               v.value_text, v.value_numeric, v.value_boolean, v.updated_at AS value_updated_at
        FROM video_field_values v
        JOIN custom_fields f ON f.id = v.field_id
        WHERE v.video_id = $1
        ORDER BY f.created_at
        "#,
    )
    .bind(video_id)
    .fetch_all(pool)
    .await?;

    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let field = row_to_field(row)?;
        let value = FieldValue::from_columns(
            row.get("value_text"),
            row.get("value_numeric"),
            row.get("value_boolean"),
        )
        .map_err(|e| StoreError::InvalidValue {
            field_name: field.name.clone(),
            source: e,
        })?;
        // All-null rows mean "cleared"; list views only show filled fields.
        if let Some(value) = value {
            values.push(ValueWithField {
                field,
                value,
                updated_at: row.get("value_updated_at"),
            });
        }
    }
    Ok(values)
}

/// Filled values for every video in a list, grouped by video. One query
/// backs the whole list view.
pub async fn for_list(
    pool: &PgPool,
    list_id: Uuid,
) -> StoreResult<HashMap<Uuid, Vec<ValueWithField>>> {
    let rows = sqlx::query(
        r#"
        SELECT v.video_id, f.id, f.list_id, f.name, f.field_type, f.config, f.created_at,
               v.value_text, v.value_numeric, v.value_boolean, v.updated_at AS value_updated_at
        FROM video_field_values v
        JOIN custom_fields f ON f.id = v.field_id
        JOIN videos vid ON vid.id = v.video_id
        WHERE vid.list_id = $1
        ORDER BY f.created_at
        "#,
    )
    .bind(list_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<ValueWithField>> = HashMap::new();
    for row in &rows {
        let field = row_to_field(row)?;
        let value = FieldValue::from_columns(
            row.get("value_text"),
            row.get("value_numeric"),
            row.get("value_boolean"),
        )
        .map_err(|e| StoreError::InvalidValue {
            field_name: field.name.clone(),
            source: e,
        })?;
        if let Some(value) = value {
            grouped
                .entry(row.get("video_id"))
                .or_default()
                .push(ValueWithField {
                    field,
                    value,
                    updated_at: row.get("value_updated_at"),
                });
        }
    }
    Ok(grouped)
}

/// Apply a batch of typed value writes for one video.
///
/// Every entry is coerced against its field's config before anything is
/// written; one invalid entry fails the whole batch. Valid batches run in a
/// single transaction with the touched rows locked in field-id order, so two
/// concurrent batches over the same video serialize per field.
pub async fn batch_set(
    pool: &PgPool,
    user_id: &str,
    video_id: Uuid,
    updates: &[ValueUpdate],
) -> StoreResult<()> {
    videos::get_for_user(pool, user_id, video_id).await?;

    if updates.is_empty() {
        return Ok(());
    }

    // Load the targeted field definitions. Tags cross lists, so a video may
    // legitimately carry values for fields of the user's other lists; an
    // unknown or foreign-user field is a not-found.
    let field_ids: Vec<Uuid> = updates.iter().map(|u| u.field_id).collect();
    let rows = sqlx::query(
        r#"
        SELECT f.id, f.list_id, f.name, f.field_type, f.config, f.created_at
        FROM custom_fields f
        JOIN lists l ON l.id = f.list_id
        WHERE f.id = ANY($1) AND l.user_id = $2
        "#,
    )
    .bind(&field_ids)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut fields: HashMap<Uuid, CustomField> = HashMap::with_capacity(rows.len());
    for row in &rows {
        let field = row_to_field(row)?;
        fields.insert(field.id, field);
    }

    // Coerce everything up front; nothing is written unless all entries pass.
    let mut writes: Vec<(Uuid, Option<FieldValue>)> = Vec::with_capacity(updates.len());
    for update in updates {
        let field = fields
            .get(&update.field_id)
            .ok_or_else(|| StoreError::not_found("field"))?;
        let value = field
            .config
            .coerce(&update.value)
            .map_err(|e| StoreError::InvalidValue {
                field_name: field.name.clone(),
                source: e,
            })?;
        writes.push((update.field_id, value));
    }

    // Stable lock order prevents deadlocks between concurrent batches.
    writes.sort_by_key(|(field_id, _)| *field_id);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        SELECT field_id FROM video_field_values
        WHERE video_id = $1 AND field_id = ANY($2)
        ORDER BY field_id
        FOR UPDATE
        "#,
    )
    .bind(video_id)
    .bind(&field_ids)
    .fetch_all(&mut *tx)
    .await?;

    for (field_id, value) in &writes {
        match value {
            None => {
                sqlx::query(
                    "DELETE FROM video_field_values WHERE video_id = $1 AND field_id = $2",
                )
                .bind(video_id)
                .bind(field_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(value) => {
                let (text, numeric, boolean) = value.columns();
                sqlx::query(
                    r#"
                    INSERT INTO video_field_values
                        (video_id, field_id, value_text, value_numeric, value_boolean, updated_at)
                    VALUES ($1, $2, $3, $4, $5, now())
                    ON CONFLICT (video_id, field_id) DO UPDATE
                    SET value_text = EXCLUDED.value_text,
                        value_numeric = EXCLUDED.value_numeric,
                        value_boolean = EXCLUDED.value_boolean,
                        updated_at = now()
                    "#,
                )
                .bind(video_id)
                .bind(field_id)
                .bind(text)
                .bind(numeric)
                .bind(boolean)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(())
}
