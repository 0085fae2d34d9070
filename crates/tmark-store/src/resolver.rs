//! Loads the schema bundles for a video and resolves its field union.

use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use tmark_models::{resolve_field_union, ResolvedField, SchemaBundle, UnionField};

use crate::error::StoreResult;
use crate::fields::row_to_field;
use crate::{tags, videos};

/// The effective, ordered field list for a video: fields from every
/// schema-bearing tag (in attachment order) plus the list's workspace
/// default schema, conflict-resolved.
pub async fn available_fields(pool: &PgPool, video_id: Uuid) -> StoreResult<Vec<ResolvedField>> {
    let video = videos::get(pool, video_id).await?;
    let video_tags = tags::for_video(pool, video_id).await?;

    let tag_schema_ids: Vec<Uuid> = video_tags.iter().filter_map(|t| t.schema_id).collect();

    let workspace_row = sqlx::query(
        "SELECT id, name FROM field_schemas WHERE list_id = $1 AND is_workspace_default",
    )
    .bind(video.list_id)
    .fetch_optional(pool)
    .await?;
    let workspace = workspace_row.map(|row| (row.get::<Uuid, _>("id"), row.get::<String, _>("name")));

    let mut all_schema_ids = tag_schema_ids.clone();
    if let Some((workspace_id, _)) = &workspace {
        all_schema_ids.push(*workspace_id);
    }
    if all_schema_ids.is_empty() {
        return Ok(Vec::new());
    }

    // One query loads every membership with its field definition.
    let rows = sqlx::query(
        r#"
        SELECT sf.schema_id, sf.show_on_card, sf.display_order, fs.name AS schema_name,
               f.id, f.list_id, f.name, f.field_type, f.config, f.created_at
        FROM schema_fields sf
        JOIN field_schemas fs ON fs.id = sf.schema_id
        JOIN custom_fields f ON f.id = sf.field_id
        WHERE sf.schema_id = ANY($1)
        ORDER BY sf.display_order
        "#,
    )
    .bind(&all_schema_ids)
    .fetch_all(pool)
    .await?;

    let mut fields_by_schema: HashMap<Uuid, (String, Vec<UnionField>)> = HashMap::new();
    for row in &rows {
        let schema_id: Uuid = row.get("schema_id");
        let schema_name: String = row.get("schema_name");
        let field = row_to_field(row)?;
        fields_by_schema
            .entry(schema_id)
            .or_insert_with(|| (schema_name, Vec::new()))
            .1
            .push(UnionField {
                field,
                show_on_card: row.get("show_on_card"),
            });
    }

    let bundle_for = |schema_id: Uuid| -> Option<SchemaBundle> {
        fields_by_schema
            .get(&schema_id)
            .map(|(schema_name, fields)| SchemaBundle {
                schema_name: schema_name.clone(),
                fields: fields.clone(),
            })
    };

    let tag_bundles: Vec<SchemaBundle> = tag_schema_ids
        .iter()
        .filter_map(|id| bundle_for(*id))
        .collect();
    let workspace_bundle = workspace.and_then(|(id, _)| bundle_for(id));

    Ok(resolve_field_union(&tag_bundles, workspace_bundle.as_ref()))
}
