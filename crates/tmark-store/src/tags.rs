//! Tag repo: categories, labels, attachment, and the category-switch
//! backup/restore flow.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use tmark_models::{validate_hex_color, validate_tag_name, Tag, TagValidationError};

use crate::backups::{self, BackupValue};
use crate::error::{or_not_found, StoreError, StoreResult};
use crate::videos;

fn row_to_tag(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        color: row.get("color"),
        is_video_type: row.get("is_video_type"),
        schema_id: row.get("schema_id"),
        created_at: row.get("created_at"),
    }
}

const TAG_COLUMNS: &str = "id, user_id, name, color, is_video_type, schema_id, created_at";

fn validate(name: &str, color: &str) -> StoreResult<()> {
    validate_tag_name(name)?;
    if !validate_hex_color(color) {
        return Err(TagValidationError::InvalidColor.into());
    }
    Ok(())
}

/// Create a tag for a user.
pub async fn create(
    pool: &PgPool,
    user_id: &str,
    name: &str,
    color: &str,
    is_video_type: bool,
    schema_id: Option<Uuid>,
) -> StoreResult<Tag> {
    validate(name, color)?;

    if let Some(schema_id) = schema_id {
        ensure_schema_owned(pool, user_id, schema_id).await?;
    }

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO tags (id, user_id, name, color, is_video_type, schema_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TAG_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name.trim())
    .bind(color)
    .bind(is_video_type)
    .bind(schema_id)
    .fetch_one(pool)
    .await?;

    Ok(row_to_tag(&row))
}

async fn ensure_schema_owned(pool: &PgPool, user_id: &str, schema_id: Uuid) -> StoreResult<()> {
    sqlx::query(
        r#"
        SELECT 1 FROM field_schemas fs
        JOIN lists l ON l.id = fs.list_id
        WHERE fs.id = $1 AND l.user_id = $2
        "#,
    )
    .bind(schema_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "schema"))?;
    Ok(())
}

/// Fetch one tag of a user.
pub async fn get(pool: &PgPool, user_id: &str, tag_id: Uuid) -> StoreResult<Tag> {
    let row = sqlx::query(&format!(
        "SELECT {TAG_COLUMNS} FROM tags WHERE id = $1 AND user_id = $2"
    ))
    .bind(tag_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "tag"))?;
    Ok(row_to_tag(&row))
}

/// All tags of a user.
pub async fn list_for_user(pool: &PgPool, user_id: &str) -> StoreResult<Vec<Tag>> {
    let rows = sqlx::query(&format!(
        "SELECT {TAG_COLUMNS} FROM tags WHERE user_id = $1 ORDER BY name"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_tag).collect())
}

/// Update a tag's name, color, or schema reference.
pub async fn update(
    pool: &PgPool,
    user_id: &str,
    tag_id: Uuid,
    name: Option<&str>,
    color: Option<&str>,
    schema_id: Option<Option<Uuid>>,
) -> StoreResult<Tag> {
    let current = get(pool, user_id, tag_id).await?;
    let name = name.unwrap_or(&current.name);
    let color = color.unwrap_or(&current.color);
    validate(name, color)?;

    let schema_id = match schema_id {
        Some(new) => {
            if let Some(schema_id) = new {
                ensure_schema_owned(pool, user_id, schema_id).await?;
            }
            new
        }
        None => current.schema_id,
    };

    let row = sqlx::query(&format!(
        r#"
        UPDATE tags SET name = $3, color = $4, schema_id = $5
        WHERE id = $1 AND user_id = $2
        RETURNING {TAG_COLUMNS}
        "#
    ))
    .bind(tag_id)
    .bind(user_id)
    .bind(name.trim())
    .bind(color)
    .bind(schema_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "tag"))?;
    Ok(row_to_tag(&row))
}

/// Delete a tag. Attachments cascade; backups for the category are kept
/// until the tag row goes away.
pub async fn delete(pool: &PgPool, user_id: &str, tag_id: Uuid) -> StoreResult<()> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
        .bind(tag_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("tag"));
    }
    Ok(())
}

/// Tags attached to a video, in attachment order.
pub async fn for_video(pool: &PgPool, video_id: Uuid) -> StoreResult<Vec<Tag>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {TAG_COLUMNS} FROM tags t
        JOIN video_tags vt ON vt.tag_id = t.id
        WHERE vt.video_id = $1
        ORDER BY vt.attached_at
        "#
    ))
    .bind(video_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_tag).collect())
}

async fn current_category(conn: &mut PgConnection, video_id: Uuid) -> StoreResult<Option<Tag>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {TAG_COLUMNS} FROM tags t
        JOIN video_tags vt ON vt.tag_id = t.id
        WHERE vt.video_id = $1 AND vt.is_category
        "#
    ))
    .bind(video_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(row_to_tag))
}

/// Field ids that belong to a category's schema but NOT to the list's
/// workspace default schema. Only these are snapshotted and cleared on a
/// category switch; workspace values persist across categories.
async fn category_only_field_ids(
    conn: &mut PgConnection,
    category: &Tag,
    list_id: Uuid,
) -> StoreResult<Vec<Uuid>> {
    let Some(schema_id) = category.schema_id else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT sf.field_id FROM schema_fields sf
        WHERE sf.schema_id = $1
          AND sf.field_id NOT IN (
              SELECT wsf.field_id FROM schema_fields wsf
              JOIN field_schemas ws ON ws.id = wsf.schema_id
              WHERE ws.list_id = $2 AND ws.is_workspace_default
          )
        "#,
    )
    .bind(schema_id)
    .bind(list_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.iter().map(|row| row.get("field_id")).collect())
}

/// Snapshot the category-only values of a video into the backup store, then
/// remove them from the live store. Caller owns the transaction.
async fn snapshot_and_clear(
    conn: &mut PgConnection,
    video_id: Uuid,
    category: &Tag,
    list_id: Uuid,
) -> StoreResult<()> {
    let field_ids = category_only_field_ids(&mut *conn, category, list_id).await?;

    let values: Vec<BackupValue> = if field_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query(
            r#"
            SELECT field_id, value_text, value_numeric, value_boolean
            FROM video_field_values
            WHERE video_id = $1 AND field_id = ANY($2)
            ORDER BY field_id
            "#,
        )
        .bind(video_id)
        .bind(&field_ids)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| BackupValue {
            field_id: row.get("field_id"),
            value_text: row.get("value_text"),
            value_numeric: row.get("value_numeric"),
            value_boolean: row.get("value_boolean"),
        })
        .collect()
    };

    backups::upsert(&mut *conn, video_id, category.id, &category.name, &values).await?;

    if !field_ids.is_empty() {
        sqlx::query("DELETE FROM video_field_values WHERE video_id = $1 AND field_id = ANY($2)")
            .bind(video_id)
            .bind(&field_ids)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Outcome of an attach.
#[derive(Debug, Clone, Copy)]
pub struct AttachOutcome {
    /// A backup exists for `(video, attached category)`; the client may
    /// offer a restore.
    pub restore_available: bool,
}

/// Attach a tag to a video.
///
/// Attaching a category while another category is present fails with the
/// category invariant unless `replace_category` is set, in which case the
/// old category's values are snapshotted and cleared before the swap, all in
/// one transaction.
pub async fn attach(
    pool: &PgPool,
    user_id: &str,
    video_id: Uuid,
    tag_id: Uuid,
    replace_category: bool,
) -> StoreResult<AttachOutcome> {
    let tag = get(pool, user_id, tag_id).await?;
    let video = videos::get_for_user(pool, user_id, video_id).await?;

    let mut tx = pool.begin().await?;

    if tag.is_video_type {
        match current_category(&mut tx, video_id).await? {
            Some(current) if current.id == tag.id => {
                // Already the category; nothing to do.
                tx.commit().await?;
                return Ok(AttachOutcome {
                    restore_available: false,
                });
            }
            Some(current) => {
                if !replace_category {
                    return Err(StoreError::CategoryInvariant);
                }
                snapshot_and_clear(&mut tx, video_id, &current, video.list_id).await?;
                sqlx::query("DELETE FROM video_tags WHERE video_id = $1 AND tag_id = $2")
                    .bind(video_id)
                    .bind(current.id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {}
        }
    }

    sqlx::query(
        r#"
        INSERT INTO video_tags (video_id, tag_id, is_category)
        VALUES ($1, $2, $3)
        ON CONFLICT (video_id, tag_id) DO NOTHING
        "#,
    )
    .bind(video_id)
    .bind(tag_id)
    .bind(tag.is_video_type)
    .execute(&mut *tx)
    .await?;

    let restore_available = if tag.is_video_type {
        backups::exists(&mut tx, video_id, tag_id).await?
    } else {
        false
    };

    tx.commit().await?;
    Ok(AttachOutcome { restore_available })
}

/// Detach a tag from a video. Detaching the category snapshots and clears
/// its values first (a switch "to none").
pub async fn detach(
    pool: &PgPool,
    user_id: &str,
    video_id: Uuid,
    tag_id: Uuid,
) -> StoreResult<()> {
    let tag = get(pool, user_id, tag_id).await?;
    let video = videos::get_for_user(pool, user_id, video_id).await?;

    let mut tx = pool.begin().await?;

    let attached: Option<bool> =
        sqlx::query("SELECT is_category FROM video_tags WHERE video_id = $1 AND tag_id = $2")
            .bind(video_id)
            .bind(tag_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get("is_category"));

    let Some(is_category) = attached else {
        return Err(StoreError::not_found("tag attachment"));
    };

    if is_category {
        snapshot_and_clear(&mut tx, video_id, &tag, video.list_id).await?;
    }

    sqlx::query("DELETE FROM video_tags WHERE video_id = $1 AND tag_id = $2")
        .bind(video_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Re-materialize a category's backed-up values, overwriting any colliding
/// values written since. The video must currently carry that category.
pub async fn restore(
    pool: &PgPool,
    user_id: &str,
    video_id: Uuid,
    category_tag_id: Uuid,
) -> StoreResult<usize> {
    get(pool, user_id, category_tag_id).await?;
    videos::get_for_user(pool, user_id, video_id).await?;

    let backup = backups::get(pool, video_id, category_tag_id)
        .await?
        .ok_or_else(|| StoreError::not_found("backup"))?;

    let mut tx = pool.begin().await?;

    let current = current_category(&mut tx, video_id).await?;
    if current.map(|t| t.id) != Some(category_tag_id) {
        return Err(StoreError::CategoryInvariant);
    }

    for value in &backup.values {
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
        .bind(value.field_id)
        .bind(&value.value_text)
        .bind(value.value_numeric)
        .bind(value.value_boolean)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(backup.values.len())
}
