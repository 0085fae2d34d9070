//! List repo.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tmark_models::List;

use crate::error::{or_not_found, StoreResult};

fn row_to_list(row: &PgRow) -> List {
    List {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

/// Create a list for a user.
pub async fn create(pool: &PgPool, user_id: &str, name: &str) -> StoreResult<List> {
    let row = sqlx::query(
        r#"
        INSERT INTO lists (id, user_id, name)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row_to_list(&row))
}

/// Fetch a list owned by a user.
pub async fn get(pool: &PgPool, user_id: &str, list_id: Uuid) -> StoreResult<List> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, name, created_at
        FROM lists
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(list_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| or_not_found(e, "list"))?;

    Ok(row_to_list(&row))
}

/// All lists for a user, newest first.
pub async fn list_for_user(pool: &PgPool, user_id: &str) -> StoreResult<Vec<List>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, name, created_at
        FROM lists
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_list).collect())
}

/// Delete a list and everything it owns. Returns the ids of its videos so
/// outstanding work can be canceled.
pub async fn delete(pool: &PgPool, user_id: &str, list_id: Uuid) -> StoreResult<Vec<Uuid>> {
    let mut tx = pool.begin().await?;

    let video_ids: Vec<Uuid> = sqlx::query("SELECT id FROM videos WHERE list_id = $1")
        .bind(list_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.get("id"))
        .collect();

    let result = sqlx::query("DELETE FROM lists WHERE id = $1 AND user_id = $2")
        .bind(list_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(crate::error::StoreError::not_found("list"));
    }

    tx.commit().await?;
    Ok(video_ids)
}
