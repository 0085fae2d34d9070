//! Postgres store integration tests.
//!
//! These exercise the invariants the schema and repos enforce together:
//! typed values, the card cap, duplicate names, delete blocking, and the
//! category backup round trip.

use serde_json::json;
use uuid::Uuid;

use tmark_models::{FieldType, FieldValue, SchemaField, YoutubeId};
use tmark_store::values::ValueUpdate;
use tmark_store::{fields, jobs, lists, schemas, tags, values, StoreError};

async fn pool() -> sqlx::PgPool {
    dotenvy::dotenv().ok();
    let pool = tmark_store::connect_from_env().await.expect("connect failed");
    tmark_store::run_migrations(&pool).await.expect("migrations failed");
    pool
}

fn user() -> String {
    format!("test-user-{}", Uuid::new_v4())
}

fn yt(label: u8) -> YoutubeId {
    // Deterministic distinct ids per call site.
    YoutubeId::new(format!("testvideo{:02}", label % 100)).unwrap()
}

async fn seeded_video(
    pool: &sqlx::PgPool,
    user_id: &str,
) -> (tmark_models::List, Uuid) {
    let list = lists::create(pool, user_id, "Test list").await.unwrap();
    let bulk = jobs::create_bulk(pool, list.id, user_id, &[yt(1)], 0)
        .await
        .unwrap();
    (list, bulk.queued[0].video_id)
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn bulk_ingest_dedupes_by_video() {
    let pool = pool().await;
    let user_id = user();
    let list = lists::create(&pool, &user_id, "Dedup list").await.unwrap();

    let first = jobs::create_bulk(&pool, list.id, &user_id, &[yt(1), yt(2)], 1)
        .await
        .unwrap();
    assert_eq!(first.job.accepted, 2);
    assert_eq!(first.job.rejected, 1);
    assert_eq!(first.queued.len(), 2);

    // Re-submitting the same ids reuses the video rows.
    let second = jobs::create_bulk(&pool, list.id, &user_id, &[yt(1)], 0)
        .await
        .unwrap();
    assert_eq!(second.queued.len(), 1);
    assert_eq!(second.queued[0].video_id, first.queued[0].video_id);

    let all = tmark_store::videos::list_for_list(&pool, list.id).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn duplicate_field_names_conflict_case_insensitively() {
    let pool = pool().await;
    let user_id = user();
    let list = lists::create(&pool, &user_id, "Fields").await.unwrap();

    fields::create(&pool, list.id, "Rating", FieldType::Rating, &json!({"max_rating": 5}))
        .await
        .unwrap();

    let err = fields::create(&pool, list.id, "rating", FieldType::Text, &json!({}))
        .await
        .unwrap_err();
    match err {
        StoreError::DuplicateName { existing } => assert_eq!(existing.name, "Rating"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn schema_card_cap_is_enforced() {
    let pool = pool().await;
    let user_id = user();
    let list = lists::create(&pool, &user_id, "Cards").await.unwrap();

    let mut members = Vec::new();
    for i in 0..4 {
        let field = fields::create(
            &pool,
            list.id,
            &format!("Field {i}"),
            FieldType::Boolean,
            &json!({}),
        )
        .await
        .unwrap();
        members.push(SchemaField {
            field_id: field.id,
            display_order: i,
            show_on_card: true,
        });
    }

    let err = schemas::create(&pool, list.id, "Too many cards", false, &members)
        .await
        .unwrap_err();
    match err {
        StoreError::SchemaInvariant(inner) => {
            assert_eq!(inner.rule(), "max_show_on_card=3");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn referenced_field_cannot_be_deleted() {
    let pool = pool().await;
    let user_id = user();
    let list = lists::create(&pool, &user_id, "In use").await.unwrap();

    let field = fields::create(&pool, list.id, "Level", FieldType::Rating, &json!({"max_rating": 5}))
        .await
        .unwrap();
    schemas::create(
        &pool,
        list.id,
        "Skills",
        false,
        &[SchemaField {
            field_id: field.id,
            display_order: 0,
            show_on_card: false,
        }],
    )
    .await
    .unwrap();

    let err = fields::delete(&pool, list.id, field.id).await.unwrap_err();
    match err {
        StoreError::FieldInUse { references } => {
            assert!(references.iter().any(|r| r.contains("Skills")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn typed_batch_writes_are_all_or_nothing() {
    let pool = pool().await;
    let user_id = user();
    let (list, video_id) = seeded_video(&pool, &user_id).await;

    let rating = fields::create(&pool, list.id, "Stars", FieldType::Rating, &json!({"max_rating": 5}))
        .await
        .unwrap();
    let tasty = fields::create(&pool, list.id, "Tasty", FieldType::Boolean, &json!({}))
        .await
        .unwrap();

    // Out-of-range rating fails the whole batch; nothing is written.
    let err = values::batch_set(
        &pool,
        &user_id,
        video_id,
        &[
            ValueUpdate {
                field_id: tasty.id,
                value: json!(true),
            },
            ValueUpdate {
                field_id: rating.id,
                value: json!(6),
            },
        ],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { .. }));
    assert!(values::for_video(&pool, video_id).await.unwrap().is_empty());

    // A valid batch lands with the right typed columns.
    values::batch_set(
        &pool,
        &user_id,
        video_id,
        &[
            ValueUpdate {
                field_id: tasty.id,
                value: json!(true),
            },
            ValueUpdate {
                field_id: rating.id,
                value: json!(5),
            },
        ],
    )
    .await
    .unwrap();

    let stored = values::for_video(&pool, video_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    let stars = stored.iter().find(|v| v.field.id == rating.id).unwrap();
    assert_eq!(stars.value, FieldValue::Number(5.0));

    // Null clears.
    values::batch_set(
        &pool,
        &user_id,
        video_id,
        &[ValueUpdate {
            field_id: rating.id,
            value: json!(null),
        }],
    )
    .await
    .unwrap();
    let stored = values::for_video(&pool, video_id).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn category_switch_backs_up_and_restores_values() {
    let pool = pool().await;
    let user_id = user();
    let (list, video_id) = seeded_video(&pool, &user_id).await;

    // Workspace schema with a Rating field that applies to every video.
    let rating = fields::create(&pool, list.id, "Rating", FieldType::Rating, &json!({"max_rating": 5}))
        .await
        .unwrap();
    schemas::create(
        &pool,
        list.id,
        "Workspace",
        true,
        &[SchemaField {
            field_id: rating.id,
            display_order: 0,
            show_on_card: true,
        }],
    )
    .await
    .unwrap();

    // Category A carries Calories and Tasty.
    let calories = fields::create(&pool, list.id, "Calories", FieldType::Rating, &json!({"max_rating": 10}))
        .await
        .unwrap();
    let tasty = fields::create(&pool, list.id, "Tasty", FieldType::Boolean, &json!({}))
        .await
        .unwrap();
    let schema_a = schemas::create(
        &pool,
        list.id,
        "Recipes",
        false,
        &[
            SchemaField {
                field_id: calories.id,
                display_order: 0,
                show_on_card: true,
            },
            SchemaField {
                field_id: tasty.id,
                display_order: 1,
                show_on_card: false,
            },
        ],
    )
    .await
    .unwrap();

    let tag_a = tags::create(&pool, &user_id, "Recipes", "#11aa22", true, Some(schema_a.schema.id))
        .await
        .unwrap();
    let tag_b = tags::create(&pool, &user_id, "Music", "#2233dd", true, None)
        .await
        .unwrap();

    tags::attach(&pool, &user_id, video_id, tag_a.id, false)
        .await
        .unwrap();

    values::batch_set(
        &pool,
        &user_id,
        video_id,
        &[
            ValueUpdate {
                field_id: calories.id,
                value: json!(7),
            },
            ValueUpdate {
                field_id: tasty.id,
                value: json!(true),
            },
            ValueUpdate {
                field_id: rating.id,
                value: json!(5),
            },
        ],
    )
    .await
    .unwrap();

    // Attaching a second category without replace is the invariant error.
    let err = tags::attach(&pool, &user_id, video_id, tag_b.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CategoryInvariant));

    // Switch A -> B: category-only values move into the backup; the
    // workspace Rating survives.
    tags::attach(&pool, &user_id, video_id, tag_b.id, true)
        .await
        .unwrap();

    let live = values::for_video(&pool, video_id).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].field.id, rating.id);

    let backup = tmark_store::backups::get(&pool, video_id, tag_a.id)
        .await
        .unwrap()
        .expect("backup missing");
    assert_eq!(backup.values.len(), 2);
    assert_eq!(backup.category_name, "Recipes");

    // Switch back to A and restore: the original values return, the
    // workspace value still present.
    let outcome = tags::attach(&pool, &user_id, video_id, tag_a.id, true)
        .await
        .unwrap();
    assert!(outcome.restore_available);

    tags::restore(&pool, &user_id, video_id, tag_a.id).await.unwrap();

    let live = values::for_video(&pool, video_id).await.unwrap();
    assert_eq!(live.len(), 3);
    let by_id = |id: Uuid| live.iter().find(|v| v.field.id == id).unwrap().value.clone();
    assert_eq!(by_id(calories.id), FieldValue::Number(7.0));
    assert_eq!(by_id(tasty.id), FieldValue::Boolean(true));
    assert_eq!(by_id(rating.id), FieldValue::Number(5.0));
}

#[tokio::test]
#[ignore = "requires Postgres"]
async fn union_resolver_prefixes_conflicting_names() {
    let pool = pool().await;
    let user_id = user();
    let (list, video_id) = seeded_video(&pool, &user_id).await;

    // Field names are unique per list, so the colliding field lives in a
    // second list; tags are per-user and cross lists freely.
    let other_list = lists::create(&pool, &user_id, "Other list").await.unwrap();

    let level_select = fields::create(
        &pool,
        list.id,
        "Level",
        FieldType::Select,
        &json!({"options": ["beginner", "advanced"]}),
    )
    .await
    .unwrap();
    let level_rating = fields::create(
        &pool,
        other_list.id,
        "level",
        FieldType::Rating,
        &json!({"max_rating": 5}),
    )
    .await
    .unwrap();

    let python = schemas::create(
        &pool,
        list.id,
        "Python",
        false,
        &[SchemaField {
            field_id: level_select.id,
            display_order: 0,
            show_on_card: false,
        }],
    )
    .await
    .unwrap();
    let docker = schemas::create(
        &pool,
        other_list.id,
        "Docker",
        false,
        &[SchemaField {
            field_id: level_rating.id,
            display_order: 0,
            show_on_card: false,
        }],
    )
    .await
    .unwrap();

    let tag_python = tags::create(&pool, &user_id, "Python", "#3776ab", false, Some(python.schema.id))
        .await
        .unwrap();
    let tag_docker = tags::create(&pool, &user_id, "Docker", "#0db7ed", false, Some(docker.schema.id))
        .await
        .unwrap();

    tags::attach(&pool, &user_id, video_id, tag_python.id, false)
        .await
        .unwrap();
    tags::attach(&pool, &user_id, video_id, tag_docker.id, false)
        .await
        .unwrap();

    let resolved = tmark_store::resolver::available_fields(&pool, video_id)
        .await
        .unwrap();
    let names: Vec<&str> = resolved
        .iter()
        .map(|r| r.effective_display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Python: Level", "Docker: level"]);
}
