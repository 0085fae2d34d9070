//! Custom field catalog repo.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tmark_models::{CustomField, FieldConfig, FieldType};

use crate::error::{or_not_found, StoreError, StoreResult};
use crate::videos::decode;

pub(crate) fn row_to_field(row: &PgRow) -> StoreResult<CustomField> {
    let field_type: String = row.get("field_type");
    let field_type = field_type.parse::<FieldType>().map_err(decode)?;
    let config: serde_json::Value = row.get("config");

    Ok(CustomField {
        id: row.get("id"),
        list_id: row.get("list_id"),
        name: row.get("name"),
        config: FieldConfig::from_parts(field_type, &config)
            .map_err(|e| decode(e.to_string()))?,
        created_at: row.get("created_at"),
    })
}

const FIELD_COLUMNS: &str = "id, list_id, name, field_type, config, created_at";

/// Create a field in a list.
///
/// The config blob is validated against the declared type before anything is
/// written. A case-insensitive name collision returns the existing field.
pub async fn create(
    pool: &PgPool,
    list_id: Uuid,
    name: &str,
    field_type: FieldType,
    config: &serde_json::Value,
) -> StoreResult<CustomField> {
    let config = FieldConfig::from_parts(field_type, config)?;

    if let Some(existing) = check_duplicate(pool, list_id, name).await? {
        return Err(StoreError::DuplicateName {
            existing: Box::new(existing),
        });
    }

    let insert = sqlx::query(&format!(
        r#"
        INSERT INTO custom_fields (id, list_id, name, field_type, config)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {FIELD_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(list_id)
    .bind(name)
    .bind(field_type.as_str())
    .bind(config.to_json())
    .fetch_one(pool)
    .await;

    match insert {
        Ok(row) => row_to_field(&row),
        // Raced with a concurrent create of the same name.
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
            match check_duplicate(pool, list_id, name).await? {
                Some(existing) => Err(StoreError::DuplicateName {
                    existing: Box::new(existing),
                }),
                None => Err(StoreError::Database(sqlx::Error::Database(db))),
            }
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

/// Case-insensitive duplicate probe for inline creation UIs.
pub async fn check_duplicate(
    pool: &PgPool,
    list_id: Uuid,
    name: &str,
) -> StoreResult<Option<CustomField>> {
    let row = sqlx::query(&format!(
        "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE list_id = $1 AND lower(name) = lower($2)"
    ))
    .bind(list_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_field).transpose()
}

/// Fetch one field of a list.
pub async fn get(pool: &PgPool, list_id: Uuid, field_id: Uuid) -> StoreResult<CustomField> {
    let row = sqlx::query(&format!(
        "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE id = $1 AND list_id = $2"
    ))
    .bind(field_id)
    .bind(list_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "field"))?;
    row_to_field(&row)
}

/// All fields of a list, oldest first.
pub async fn list_for_list(pool: &PgPool, list_id: Uuid) -> StoreResult<Vec<CustomField>> {
    let rows = sqlx::query(&format!(
        "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE list_id = $1 ORDER BY created_at"
    ))
    .bind(list_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_field).collect()
}

/// Update a field's name and/or config.
///
/// Destructive changes (type change with stored values, removing a select
/// option in use, lowering `max_rating` below stored values, shortening
/// `max_length` below stored values) require `confirm` and are applied
/// atomically with the config write: values are converted or cleared in the
/// same transaction, or nothing changes at all.
pub async fn update(
    pool: &PgPool,
    list_id: Uuid,
    field_id: Uuid,
    new_name: Option<&str>,
    new_type: Option<FieldType>,
    new_config: Option<&serde_json::Value>,
    confirm: bool,
) -> StoreResult<CustomField> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT {FIELD_COLUMNS} FROM custom_fields WHERE id = $1 AND list_id = $2 FOR UPDATE"
    ))
    .bind(field_id)
    .bind(list_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| or_not_found(e, "field"))?;
    let current = row_to_field(&row)?;

    let name = new_name.unwrap_or(&current.name);
    if !name.eq_ignore_ascii_case(&current.name) {
        let dup = sqlx::query(&format!(
            r#"
            SELECT {FIELD_COLUMNS} FROM custom_fields
            WHERE list_id = $1 AND lower(name) = lower($2) AND id <> $3
            "#
        ))
        .bind(list_id)
        .bind(name)
        .bind(field_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(dup) = dup {
            return Err(StoreError::DuplicateName {
                existing: Box::new(row_to_field(&dup)?),
            });
        }
    }

    let target_type = new_type.unwrap_or_else(|| current.field_type());
    let config = match (target_type == current.field_type(), new_config) {
        (true, None) => current.config.clone(),
        (true, Some(raw)) => FieldConfig::from_parts(target_type, raw)?,
        // Type change: the new type needs its own config shape; absent means
        // the empty object (fine for text/boolean, rejected for select).
        (false, raw) => {
            FieldConfig::from_parts(target_type, raw.unwrap_or(&serde_json::json!({})))?
        }
    };

    if target_type != current.field_type() {
        apply_type_change(&mut tx, field_id, confirm).await?;
    } else {
        apply_config_narrowing(&mut tx, field_id, &current.config, &config, confirm).await?;
    }

    let updated = sqlx::query(&format!(
        r#"
        UPDATE custom_fields
        SET name = $3, field_type = $4, config = $5
        WHERE id = $1 AND list_id = $2
        RETURNING {FIELD_COLUMNS}
        "#
    ))
    .bind(field_id)
    .bind(list_id)
    .bind(name)
    .bind(target_type.as_str())
    .bind(config.to_json())
    .fetch_one(&mut *tx)
    .await?;

    let updated = row_to_field(&updated)?;
    tx.commit().await?;
    Ok(updated)
}

/// Clearing stored values on a type change requires confirmation.
async fn apply_type_change(
    tx: &mut PgConnection,
    field_id: Uuid,
    confirm: bool,
) -> StoreResult<()> {
    let count = value_count(tx, field_id).await?;
    if count == 0 {
        return Ok(());
    }
    if !confirm {
        return Err(StoreError::ConfirmationRequired {
            action: format!("changing the type of a field with {count} stored values"),
        });
    }
    sqlx::query("DELETE FROM video_field_values WHERE field_id = $1")
        .bind(field_id)
        .execute(tx)
        .await?;
    Ok(())
}

/// Same-type config updates that would strand stored values require
/// confirmation; confirmed updates convert or clear in the same transaction.
async fn apply_config_narrowing(
    tx: &mut PgConnection,
    field_id: Uuid,
    old: &FieldConfig,
    new: &FieldConfig,
    confirm: bool,
) -> StoreResult<()> {
    match (old, new) {
        (FieldConfig::Select { options: before }, FieldConfig::Select { options: after }) => {
            let removed: Vec<&String> =
                before.iter().filter(|o| !after.contains(*o)).collect();
            if removed.is_empty() {
                return Ok(());
            }
            let removed: Vec<String> = removed.into_iter().cloned().collect();
            let count: i64 = sqlx::query(
                "SELECT count(*) AS n FROM video_field_values WHERE field_id = $1 AND value_text = ANY($2)",
            )
            .bind(field_id)
            .bind(&removed)
            .fetch_one(&mut *tx)
            .await?
            .get("n");
            if count == 0 {
                return Ok(());
            }
            if !confirm {
                return Err(StoreError::ConfirmationRequired {
                    action: format!("removing select options used by {count} values"),
                });
            }
            sqlx::query(
                "DELETE FROM video_field_values WHERE field_id = $1 AND value_text = ANY($2)",
            )
            .bind(field_id)
            .bind(&removed)
            .execute(&mut *tx)
            .await?;
        }
        (
            FieldConfig::Rating { max_rating: before },
            FieldConfig::Rating { max_rating: after },
        ) if after < before => {
            let max = f64::from(*after);
            let count: i64 = sqlx::query(
                "SELECT count(*) AS n FROM video_field_values WHERE field_id = $1 AND value_numeric > $2",
            )
            .bind(field_id)
            .bind(max)
            .fetch_one(&mut *tx)
            .await?
            .get("n");
            if count == 0 {
                return Ok(());
            }
            if !confirm {
                return Err(StoreError::ConfirmationRequired {
                    action: format!("lowering max_rating below {count} stored values"),
                });
            }
            sqlx::query(
                "UPDATE video_field_values SET value_numeric = $2, updated_at = now() WHERE field_id = $1 AND value_numeric > $2",
            )
            .bind(field_id)
            .bind(max)
            .execute(&mut *tx)
            .await?;
        }
        (
            FieldConfig::Text { max_length: before },
            FieldConfig::Text { max_length: Some(after) },
        ) if before.map(|b| *after < b).unwrap_or(true) => {
            let max = i32::try_from(*after).unwrap_or(i32::MAX);
            let count: i64 = sqlx::query(
                "SELECT count(*) AS n FROM video_field_values WHERE field_id = $1 AND char_length(value_text) > $2",
            )
            .bind(field_id)
            .bind(max)
            .fetch_one(&mut *tx)
            .await?
            .get("n");
            if count == 0 {
                return Ok(());
            }
            if !confirm {
                return Err(StoreError::ConfirmationRequired {
                    action: format!("shortening max_length would truncate {count} values"),
                });
            }
            sqlx::query(
                "UPDATE video_field_values SET value_text = left(value_text, $2), updated_at = now() WHERE field_id = $1 AND char_length(value_text) > $2",
            )
            .bind(field_id)
            .bind(max)
            .execute(&mut *tx)
            .await?;
        }
        _ => {}
    }
    Ok(())
}

async fn value_count(tx: &mut PgConnection, field_id: Uuid) -> StoreResult<i64> {
    let row = sqlx::query("SELECT count(*) AS n FROM video_field_values WHERE field_id = $1")
        .bind(field_id)
        .fetch_one(tx)
        .await?;
    Ok(row.get("n"))
}

/// Delete a field. Blocked while any schema or value references it; the
/// error names the referents.
pub async fn delete(pool: &PgPool, list_id: Uuid, field_id: Uuid) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    // Existence check scoped to the list.
    sqlx::query("SELECT 1 FROM custom_fields WHERE id = $1 AND list_id = $2")
        .bind(field_id)
        .bind(list_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| or_not_found(e, "field"))?;

    let schema_names: Vec<String> = sqlx::query(
        r#"
        SELECT fs.name FROM schema_fields sf
        JOIN field_schemas fs ON fs.id = sf.schema_id
        WHERE sf.field_id = $1
        ORDER BY fs.name
        "#,
    )
    .bind(field_id)
    .fetch_all(&mut *tx)
    .await?
    .iter()
    .map(|row| row.get::<String, _>("name"))
    .collect();

    let values = value_count(&mut tx, field_id).await?;

    if !schema_names.is_empty() || values > 0 {
        let mut references: Vec<String> = schema_names
            .into_iter()
            .map(|n| format!("schema '{n}'"))
            .collect();
        if values > 0 {
            references.push(format!("{values} stored values"));
        }
        return Err(StoreError::FieldInUse { references });
    }

    sqlx::query("DELETE FROM custom_fields WHERE id = $1")
        .bind(field_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
