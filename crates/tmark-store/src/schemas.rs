//! Field schema repo.

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tmark_models::{validate_schema_fields, FieldSchema, SchemaField, SchemaInvariantError};

use crate::error::{or_not_found, StoreError, StoreResult};

fn row_to_schema(row: &PgRow) -> FieldSchema {
    FieldSchema {
        id: row.get("id"),
        list_id: row.get("list_id"),
        name: row.get("name"),
        is_workspace_default: row.get("is_workspace_default"),
        created_at: row.get("created_at"),
    }
}

fn row_to_schema_field(row: &PgRow) -> SchemaField {
    SchemaField {
        field_id: row.get("field_id"),
        display_order: row.get("display_order"),
        show_on_card: row.get("show_on_card"),
    }
}

const SCHEMA_COLUMNS: &str = "id, list_id, name, is_workspace_default, created_at";

/// A schema with its ordered memberships.
#[derive(Debug, Clone)]
pub struct SchemaWithFields {
    pub schema: FieldSchema,
    pub fields: Vec<SchemaField>,
}

/// Validate memberships and check every field belongs to the list, then
/// replace the schema's membership rows. Caller owns the transaction.
async fn replace_fields(
    tx: &mut PgConnection,
    list_id: Uuid,
    schema_id: Uuid,
    fields: &[SchemaField],
) -> StoreResult<()> {
    validate_schema_fields(fields)?;

    if !fields.is_empty() {
        let field_ids: Vec<Uuid> = fields.iter().map(|f| f.field_id).collect();
        let known: Vec<Uuid> =
            sqlx::query("SELECT id FROM custom_fields WHERE id = ANY($1) AND list_id = $2")
                .bind(&field_ids)
                .bind(list_id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| row.get("id"))
                .collect();
        if let Some(foreign) = field_ids.iter().find(|id| !known.contains(id)) {
            return Err(StoreError::SchemaInvariant(
                SchemaInvariantError::ForeignField(*foreign),
            ));
        }
    }

    // Delete-and-reinsert keeps the unique (schema_id, display_order)
    // constraint happy during reorders.
    sqlx::query("DELETE FROM schema_fields WHERE schema_id = $1")
        .bind(schema_id)
        .execute(&mut *tx)
        .await?;

    for field in fields {
        sqlx::query(
            r#"
            INSERT INTO schema_fields (schema_id, field_id, display_order, show_on_card)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(schema_id)
        .bind(field.field_id)
        .bind(field.display_order)
        .bind(field.show_on_card)
        .execute(&mut *tx)
        .await?;
    }

    Ok(())
}

/// Create a schema with its initial memberships, atomically.
pub async fn create(
    pool: &PgPool,
    list_id: Uuid,
    name: &str,
    is_workspace_default: bool,
    fields: &[SchemaField],
) -> StoreResult<SchemaWithFields> {
    let mut tx = pool.begin().await?;

    let insert = sqlx::query(&format!(
        r#"
        INSERT INTO field_schemas (id, list_id, name, is_workspace_default)
        VALUES ($1, $2, $3, $4)
        RETURNING {SCHEMA_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(list_id)
    .bind(name)
    .bind(is_workspace_default)
    .fetch_one(&mut *tx)
    .await;

    let row = match insert {
        Ok(row) => row,
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
            return Err(StoreError::ConfirmationRequired {
                action: "the list already has a workspace default schema; replacing it"
                    .to_string(),
            });
        }
        Err(e) => return Err(StoreError::Database(e)),
    };
    let schema = row_to_schema(&row);

    replace_fields(&mut tx, list_id, schema.id, fields).await?;

    tx.commit().await?;
    Ok(SchemaWithFields {
        schema,
        fields: fields.to_vec(),
    })
}

async fn fields_of(pool: &PgPool, schema_id: Uuid) -> StoreResult<Vec<SchemaField>> {
    let rows = sqlx::query(
        r#"
        SELECT field_id, display_order, show_on_card
        FROM schema_fields
        WHERE schema_id = $1
        ORDER BY display_order
        "#,
    )
    .bind(schema_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_schema_field).collect())
}

/// Fetch a schema of a list with its memberships.
pub async fn get(pool: &PgPool, list_id: Uuid, schema_id: Uuid) -> StoreResult<SchemaWithFields> {
    let row = sqlx::query(&format!(
        "SELECT {SCHEMA_COLUMNS} FROM field_schemas WHERE id = $1 AND list_id = $2"
    ))
    .bind(schema_id)
    .bind(list_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "schema"))?;
    let schema = row_to_schema(&row);
    let fields = fields_of(pool, schema.id).await?;
    Ok(SchemaWithFields { schema, fields })
}

/// All schemas of a list with memberships, oldest first.
pub async fn list_for_list(pool: &PgPool, list_id: Uuid) -> StoreResult<Vec<SchemaWithFields>> {
    let schema_rows = sqlx::query(&format!(
        "SELECT {SCHEMA_COLUMNS} FROM field_schemas WHERE list_id = $1 ORDER BY created_at"
    ))
    .bind(list_id)
    .fetch_all(pool)
    .await?;
    let schemas: Vec<FieldSchema> = schema_rows.iter().map(row_to_schema).collect();

    let schema_ids: Vec<Uuid> = schemas.iter().map(|s| s.id).collect();
    let field_rows = sqlx::query(
        r#"
        SELECT schema_id, field_id, display_order, show_on_card
        FROM schema_fields
        WHERE schema_id = ANY($1)
        ORDER BY display_order
        "#,
    )
    .bind(&schema_ids)
    .fetch_all(pool)
    .await?;

    let mut by_schema: HashMap<Uuid, Vec<SchemaField>> = HashMap::new();
    for row in &field_rows {
        by_schema
            .entry(row.get("schema_id"))
            .or_default()
            .push(row_to_schema_field(row));
    }

    Ok(schemas
        .into_iter()
        .map(|schema| {
            let fields = by_schema.remove(&schema.id).unwrap_or_default();
            SchemaWithFields { schema, fields }
        })
        .collect())
}

/// Update a schema's name and/or replace its memberships atomically.
pub async fn update(
    pool: &PgPool,
    list_id: Uuid,
    schema_id: Uuid,
    name: Option<&str>,
    fields: Option<&[SchemaField]>,
) -> StoreResult<SchemaWithFields> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT {SCHEMA_COLUMNS} FROM field_schemas WHERE id = $1 AND list_id = $2 FOR UPDATE"
    ))
    .bind(schema_id)
    .bind(list_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| or_not_found(e, "schema"))?;
    let mut schema = row_to_schema(&row);

    if let Some(name) = name {
        let row = sqlx::query(&format!(
            "UPDATE field_schemas SET name = $3 WHERE id = $1 AND list_id = $2 RETURNING {SCHEMA_COLUMNS}"
        ))
        .bind(schema_id)
        .bind(list_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        schema = row_to_schema(&row);
    }

    if let Some(fields) = fields {
        replace_fields(&mut tx, list_id, schema_id, fields).await?;
    }

    tx.commit().await?;

    let fields = fields_of(pool, schema_id).await?;
    Ok(SchemaWithFields { schema, fields })
}

/// Apply a full reorder: every membership gets its new `display_order`,
/// atomically. Card flags are preserved.
pub async fn reorder(
    pool: &PgPool,
    list_id: Uuid,
    schema_id: Uuid,
    orders: &[(Uuid, i32)],
) -> StoreResult<SchemaWithFields> {
    let current = get(pool, list_id, schema_id).await?;

    let by_field: HashMap<Uuid, i32> = orders.iter().copied().collect();
    let mut fields = Vec::with_capacity(current.fields.len());
    for sf in &current.fields {
        let display_order = by_field
            .get(&sf.field_id)
            .copied()
            .ok_or(StoreError::SchemaInvariant(
                SchemaInvariantError::ForeignField(sf.field_id),
            ))?;
        fields.push(SchemaField {
            field_id: sf.field_id,
            display_order,
            show_on_card: sf.show_on_card,
        });
    }

    let mut tx = pool.begin().await?;
    replace_fields(&mut tx, list_id, schema_id, &fields).await?;
    tx.commit().await?;

    get(pool, list_id, schema_id).await
}

/// Delete a schema. Memberships cascade; tags referencing it fall back to
/// no schema.
pub async fn delete(pool: &PgPool, list_id: Uuid, schema_id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("DELETE FROM field_schemas WHERE id = $1 AND list_id = $2")
        .bind(schema_id)
        .bind(list_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("schema"));
    }
    Ok(())
}
