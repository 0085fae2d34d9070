//! Effective field set for a video across its tags.
//!
//! The detail view shows one merged field list: the fields of every
//! schema-bearing tag on the video (in tag-attachment order) plus the list's
//! workspace default schema. Name collisions across schemas are resolved in
//! two passes over already-loaded data; nothing here queries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::field::{CustomField, FieldType};

/// One field as it participates in the union, with its card flag.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnionField {
    pub field: CustomField,
    pub show_on_card: bool,
}

/// A schema's contribution to the union: its name and its fields in display
/// order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaBundle {
    pub schema_name: String,
    pub fields: Vec<UnionField>,
}

/// A field in the resolved union, with the display name to show.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedField {
    pub field: CustomField,
    pub effective_display_name: String,
    pub show_on_card: bool,
}

struct Entry {
    schema_name: String,
    field: CustomField,
    show_on_card: bool,
}

/// Compute the effective, ordered field list for a video.
///
/// `tag_bundles` are the schemas of the video's tags in attachment order;
/// `workspace` is the list's default schema, whose fields apply to every
/// video.
///
/// Pass 1 groups fields by case-insensitive name; a group whose members
/// disagree on `field_type` is a conflict. Pass 2 renames every member of a
/// conflict group to `"<schema_name>: <field_name>"`; same-name same-type
/// members collapse to the first occurrence. First-seen order is preserved.
pub fn resolve_field_union(
    tag_bundles: &[SchemaBundle],
    workspace: Option<&SchemaBundle>,
) -> Vec<ResolvedField> {
    let mut entries: Vec<Entry> = Vec::new();
    let mut seen_fields: HashSet<Uuid> = HashSet::new();

    let bundles = tag_bundles.iter().chain(workspace);
    for bundle in bundles {
        for uf in &bundle.fields {
            // The same field can arrive via several tags; the first wins.
            if !seen_fields.insert(uf.field.id) {
                continue;
            }
            entries.push(Entry {
                schema_name: bundle.schema_name.clone(),
                field: uf.field.clone(),
                show_on_card: uf.show_on_card,
            });
        }
    }

    // Pass 1: group by case-insensitive name and collect the types present.
    let mut types_by_name: HashMap<String, HashSet<FieldType>> = HashMap::new();
    for entry in &entries {
        types_by_name
            .entry(entry.field.name.to_lowercase())
            .or_default()
            .insert(entry.field.field_type());
    }

    // Pass 2: prefix conflicting names, collapse same-type duplicates.
    let mut resolved = Vec::with_capacity(entries.len());
    let mut emitted_names: HashSet<String> = HashSet::new();
    for entry in entries {
        let key = entry.field.name.to_lowercase();
        let conflicted = types_by_name
            .get(&key)
            .map(|types| types.len() > 1)
            .unwrap_or(false);

        if conflicted {
            let display = format!("{}: {}", entry.schema_name, entry.field.name);
            resolved.push(ResolvedField {
                field: entry.field,
                effective_display_name: display,
                show_on_card: entry.show_on_card,
            });
        } else {
            if !emitted_names.insert(key) {
                continue;
            }
            let display = entry.field.name.clone();
            resolved.push(ResolvedField {
                field: entry.field,
                effective_display_name: display,
                show_on_card: entry.show_on_card,
            });
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldConfig;
    use chrono::Utc;

    fn field(name: &str, config: FieldConfig) -> CustomField {
        CustomField {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            name: name.to_string(),
            config,
            created_at: Utc::now(),
        }
    }

    fn bundle(schema_name: &str, fields: Vec<CustomField>) -> SchemaBundle {
        SchemaBundle {
            schema_name: schema_name.to_string(),
            fields: fields
                .into_iter()
                .map(|f| UnionField {
                    field: f,
                    show_on_card: false,
                })
                .collect(),
        }
    }

    #[test]
    fn conflicting_types_get_schema_prefix() {
        let python = bundle(
            "Python",
            vec![field("Level", FieldConfig::select(vec!["a".into()]).unwrap())],
        );
        let docker = bundle("Docker", vec![field("Level", FieldConfig::rating(5).unwrap())]);

        let resolved = resolve_field_union(&[python, docker], None);
        let names: Vec<&str> = resolved
            .iter()
            .map(|r| r.effective_display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Python: Level", "Docker: Level"]);
    }

    #[test]
    fn same_type_same_name_collapses() {
        let a = bundle("A", vec![field("Notes", FieldConfig::text(None).unwrap())]);
        let b = bundle("B", vec![field("notes", FieldConfig::text(Some(50)).unwrap())]);

        let resolved = resolve_field_union(&[a, b], None);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].effective_display_name, "Notes");
    }

    #[test]
    fn conflict_detection_is_case_insensitive() {
        let a = bundle("A", vec![field("level", FieldConfig::rating(5).unwrap())]);
        let b = bundle(
            "B",
            vec![field("Level", FieldConfig::select(vec!["x".into()]).unwrap())],
        );

        let resolved = resolve_field_union(&[a, b], None);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].effective_display_name, "A: level");
        assert_eq!(resolved[1].effective_display_name, "B: Level");
    }

    #[test]
    fn workspace_fields_come_after_tag_fields() {
        let tag = bundle("Recipes", vec![field("Calories", FieldConfig::rating(10).unwrap())]);
        let workspace = bundle("Workspace", vec![field("Rating", FieldConfig::rating(5).unwrap())]);

        let resolved = resolve_field_union(&[tag], Some(&workspace));
        let names: Vec<&str> = resolved
            .iter()
            .map(|r| r.effective_display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Calories", "Rating"]);
    }

    #[test]
    fn same_field_via_two_tags_appears_once() {
        let shared = field("Difficulty", FieldConfig::rating(5).unwrap());
        let a = bundle("A", vec![shared.clone()]);
        let b = bundle("B", vec![shared]);

        let resolved = resolve_field_union(&[a, b], None);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_union() {
        assert!(resolve_field_union(&[], None).is_empty());
    }

    #[test]
    fn non_conflicting_names_keep_original() {
        let a = bundle("A", vec![field("Tasty", FieldConfig::boolean())]);
        let resolved = resolve_field_union(&[a], None);
        assert_eq!(resolved[0].effective_display_name, "Tasty");
    }
}
