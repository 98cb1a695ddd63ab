//! Schema-name conflict resolution between the merged document and an
//! incoming source.
//!
//! Renames are computed first, name by name in the source's own iteration
//! order, then applied as two batches (target renames, then source renames),
//! each followed by a deep reference rewrite so every `$ref` keeps resolving.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use openapiv3::{OpenAPI, ReferenceOr, Schema};
use tracing::debug;

use crate::config::SourceConfig;
use crate::merge::naming;
use crate::merge::origin::{rekey_origins, ComponentOrigin, ComponentOrigins};
use crate::merge::refs;
use crate::merge::report::{ConflictResolution, MergeReport, ResolutionKind};
use crate::merge::strategy::{ConflictAction, ConflictResolutionStrategy, NameConflict};

/// Detects and resolves every schema name of `source` that already exists in
/// `target`. Both documents may be rewritten; the origin map follows target
/// renames.
pub(crate) fn resolve_schema_conflicts(
    target: &mut OpenAPI,
    source: &mut OpenAPI,
    config: &SourceConfig,
    origins: &mut ComponentOrigins,
    strategy: &dyn ConflictResolutionStrategy,
    pattern: &str,
    report: &mut MergeReport,
) {
    let plan = plan_resolutions(target, source, config, origins, strategy, pattern, report);

    if !plan.deduplicated.is_empty() {
        if let Some(components) = source.components.as_mut() {
            for name in &plan.deduplicated {
                components.schemas.shift_remove(name);
            }
        }
    }

    apply_schema_renames(target, &plan.target_renames);
    rekey_origins(origins, &plan.target_renames);
    apply_schema_renames(source, &plan.source_renames);
}

#[derive(Debug, Default)]
struct ResolutionPlan {
    deduplicated: Vec<String>,
    target_renames: IndexMap<String, String>,
    source_renames: IndexMap<String, String>,
}

fn plan_resolutions(
    target: &OpenAPI,
    source: &OpenAPI,
    config: &SourceConfig,
    origins: &ComponentOrigins,
    strategy: &dyn ConflictResolutionStrategy,
    pattern: &str,
    report: &mut MergeReport,
) -> ResolutionPlan {
    let mut plan = ResolutionPlan::default();

    let Some(source_components) = source.components.as_ref() else {
        return plan;
    };
    if source_components.schemas.is_empty() {
        return plan;
    }
    let target_schemas = target
        .components
        .as_ref()
        .map(|components| &components.schemas);

    // Names a rename may not collide with: everything visible in either
    // document, plus renames decided earlier in this batch.
    let mut taken: BTreeSet<String> = source_components.schemas.keys().cloned().collect();
    if let Some(schemas) = target_schemas {
        taken.extend(schemas.keys().cloned());
    }

    let incoming_token = scope_token(config.path_prefix.as_deref(), &config.name);
    let incoming_qualified = naming::prefix_token(&config.name);

    for (name, incoming_schema) in &source_components.schemas {
        let Some(existing_schema) = target_schemas.and_then(|schemas| schemas.get(name)) else {
            continue;
        };

        let equivalent = structurally_identical(existing_schema, incoming_schema);
        let origin = origins.get(name).cloned().unwrap_or(ComponentOrigin {
            api: String::new(),
            prefix: None,
        });
        let conflict = NameConflict {
            name,
            equivalent,
            existing_api: &origin.api,
            existing_prefix: origin.prefix.as_deref(),
            incoming_api: &config.name,
            incoming_prefix: config.path_prefix.as_deref(),
        };

        match strategy.resolve(&conflict) {
            ConflictAction::KeepExisting => {
                debug!(api = %config.name, schema = %name, "deduplicated schema");
                plan.deduplicated.push(name.clone());
                report.schema_resolution(ConflictResolution {
                    api: config.name.clone(),
                    name: name.clone(),
                    renamed_to: None,
                    kind: ResolutionKind::Deduplicated,
                });
            }
            ConflictAction::RenameIncoming => {
                let new_name = rename_incoming(
                    &mut plan,
                    &mut taken,
                    pattern,
                    &incoming_token,
                    &incoming_qualified,
                    name,
                );
                report.schema_resolution(ConflictResolution {
                    api: config.name.clone(),
                    name: name.clone(),
                    renamed_to: Some(new_name),
                    kind: ResolutionKind::RenamedIncoming,
                });
            }
            ConflictAction::RenameExisting => {
                let new_name = rename_existing(&mut plan, &mut taken, pattern, &origin, name);
                report.schema_resolution(ConflictResolution {
                    api: origin.api.clone(),
                    name: name.clone(),
                    renamed_to: Some(new_name),
                    kind: ResolutionKind::RenamedExisting,
                });
            }
            ConflictAction::RenameBoth => {
                let existing_name = rename_existing(&mut plan, &mut taken, pattern, &origin, name);
                report.schema_resolution(ConflictResolution {
                    api: origin.api.clone(),
                    name: name.clone(),
                    renamed_to: Some(existing_name),
                    kind: ResolutionKind::RenamedBoth,
                });
                let incoming_name = rename_incoming(
                    &mut plan,
                    &mut taken,
                    pattern,
                    &incoming_token,
                    &incoming_qualified,
                    name,
                );
                report.schema_resolution(ConflictResolution {
                    api: config.name.clone(),
                    name: name.clone(),
                    renamed_to: Some(incoming_name),
                    kind: ResolutionKind::RenamedBoth,
                });
            }
        }
    }

    plan
}

fn rename_incoming(
    plan: &mut ResolutionPlan,
    taken: &mut BTreeSet<String>,
    pattern: &str,
    token: &str,
    qualified: &str,
    name: &str,
) -> String {
    let new_name = naming::unique_rename(pattern, token, qualified, name, &|candidate| {
        taken.contains(candidate)
    });
    taken.insert(new_name.clone());
    plan.source_renames.insert(name.to_string(), new_name.clone());
    new_name
}

fn rename_existing(
    plan: &mut ResolutionPlan,
    taken: &mut BTreeSet<String>,
    pattern: &str,
    origin: &ComponentOrigin,
    name: &str,
) -> String {
    let token = scope_token(origin.prefix.as_deref(), &origin.api);
    let qualified = naming::prefix_token(&origin.api);
    let new_name = naming::unique_rename(pattern, &token, &qualified, name, &|candidate| {
        taken.contains(candidate)
    });
    taken.insert(new_name.clone());
    plan.target_renames.insert(name.to_string(), new_name.clone());
    new_name
}

/// Prefix token for a source: its virtual prefix when declared, else its api
/// name.
fn scope_token(prefix: Option<&str>, api: &str) -> String {
    match prefix {
        Some(prefix) => naming::prefix_token(prefix),
        None => naming::prefix_token(api),
    }
}

/// Deep equality after canonicalization through `serde_json`.
fn structurally_identical(left: &ReferenceOr<Schema>, right: &ReferenceOr<Schema>) -> bool {
    match (serde_json::to_value(left), serde_json::to_value(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Re-keys the component schemas of `document` and rewrites every reference.
pub(crate) fn apply_schema_renames(document: &mut OpenAPI, renames: &IndexMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    if let Some(components) = document.components.as_mut() {
        let schemas = std::mem::take(&mut components.schemas);
        components.schemas = schemas
            .into_iter()
            .map(|(name, schema)| match renames.get(&name) {
                Some(new_name) => (new_name.clone(), schema),
                None => (name, schema),
            })
            .collect();
    }
    refs::rewrite_document_refs(document, renames);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::merge::strategy::PrefixAwareResolution;

    use super::*;

    fn document(value: serde_json::Value) -> OpenAPI {
        serde_json::from_value(value).expect("valid test document")
    }

    fn simple_doc(schema_name: &str, schema: serde_json::Value) -> OpenAPI {
        let mut schemas = serde_json::Map::new();
        schemas.insert(schema_name.to_string(), schema);
        document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Test", "version": "1.0.0"},
            "paths": {
                "/items": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": format!("#/components/schemas/{schema_name}")}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {"schemas": schemas}
        }))
    }

    fn resolve(
        target: &mut OpenAPI,
        source: &mut OpenAPI,
        config: &SourceConfig,
        origins: &mut ComponentOrigins,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        resolve_schema_conflicts(
            target,
            source,
            config,
            origins,
            &PrefixAwareResolution,
            "{prefix}_{name}",
            &mut report,
        );
        report
    }

    fn origin_for(config: &SourceConfig) -> ComponentOrigin {
        ComponentOrigin::new(config)
    }

    #[test]
    fn should_deduplicate_identical_schemas() {
        let schema = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let mut target = simple_doc("Product", schema.clone());
        let mut source = simple_doc("Product", schema);

        let first = SourceConfig::from_file("inventory", "a.json");
        let second = SourceConfig::from_file("orders", "b.json");
        let mut origins = ComponentOrigins::new();
        origins.insert("Product".to_string(), origin_for(&first));

        resolve(&mut target, &mut source, &second, &mut origins);

        // Source copy dropped; its references resolve to the target entry.
        assert!(
            !source
                .components
                .as_ref()
                .unwrap()
                .schemas
                .contains_key("Product")
        );
        assert!(
            target
                .components
                .as_ref()
                .unwrap()
                .schemas
                .contains_key("Product")
        );
    }

    #[test]
    fn should_rename_incoming_when_existing_has_no_prefix() {
        let mut target = simple_doc("Product", json!({"type": "object"}));
        let mut source = simple_doc("Product", json!({"type": "string"}));

        let first = SourceConfig::from_file("catalog", "a.json");
        let second = SourceConfig::from_file("inventory", "b.json").with_path_prefix("/inventory");
        let mut origins = ComponentOrigins::new();
        origins.insert("Product".to_string(), origin_for(&first));

        resolve(&mut target, &mut source, &second, &mut origins);

        let source_schemas = &source.components.as_ref().unwrap().schemas;
        assert!(source_schemas.contains_key("Inventory_Product"));
        assert!(!source_schemas.contains_key("Product"));

        // The source's own references follow the rename.
        let used = refs::path_level_schema_refs(&source);
        assert!(used.contains("Inventory_Product"));
    }

    #[test]
    fn should_rename_existing_when_only_it_has_a_prefix() {
        let mut target = simple_doc("Product", json!({"type": "object"}));
        let mut source = simple_doc("Product", json!({"type": "string"}));

        let first = SourceConfig::from_file("inventory", "a.json").with_path_prefix("/inventory");
        let second = SourceConfig::from_file("catalog", "b.json");
        let mut origins = ComponentOrigins::new();
        origins.insert("Product".to_string(), origin_for(&first));

        resolve(&mut target, &mut source, &second, &mut origins);

        let target_schemas = &target.components.as_ref().unwrap().schemas;
        assert!(target_schemas.contains_key("Inventory_Product"));
        assert!(!target_schemas.contains_key("Product"));
        assert!(refs::path_level_schema_refs(&target).contains("Inventory_Product"));

        // The incoming schema keeps its original name and takes the slot.
        assert!(
            source
                .components
                .as_ref()
                .unwrap()
                .schemas
                .contains_key("Product")
        );
        // The origin map follows the target rename.
        assert_eq!(origins.get("Inventory_Product").unwrap().api, "inventory");
    }

    #[test]
    fn should_rename_both_when_both_have_prefixes() {
        let mut target = simple_doc("Invoice", json!({"type": "object"}));
        let mut source = simple_doc("Invoice", json!({"type": "string"}));

        let first = SourceConfig::from_file("billing", "a.json").with_path_prefix("/billing");
        let second = SourceConfig::from_file("orders", "b.json").with_path_prefix("/orders");
        let mut origins = ComponentOrigins::new();
        origins.insert("Invoice".to_string(), origin_for(&first));

        let report = resolve(&mut target, &mut source, &second, &mut origins);

        assert!(
            target
                .components
                .as_ref()
                .unwrap()
                .schemas
                .contains_key("Billing_Invoice")
        );
        assert!(
            source
                .components
                .as_ref()
                .unwrap()
                .schemas
                .contains_key("Orders_Invoice")
        );

        let summary = report.finalize();
        assert_eq!(summary.schema_resolutions.len(), 2);
        assert!(
            summary
                .schema_resolutions
                .iter()
                .all(|resolution| resolution.kind == ResolutionKind::RenamedBoth)
        );
    }

    #[test]
    fn should_disambiguate_when_pattern_output_collides() {
        let mut target = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Test", "version": "1.0.0"},
            "paths": {},
            "components": {"schemas": {
                "Product": {"type": "object"},
                "Inventory_Product": {"type": "boolean"}
            }}
        }));
        let mut source = simple_doc("Product", json!({"type": "string"}));

        let first = SourceConfig::from_file("catalog", "a.json");
        let second = SourceConfig::from_file("inventory", "b.json").with_path_prefix("/inventory");
        let mut origins = ComponentOrigins::new();
        origins.insert("Product".to_string(), origin_for(&first));
        origins.insert("Inventory_Product".to_string(), origin_for(&first));

        resolve(&mut target, &mut source, &second, &mut origins);

        // `Inventory_Product` is taken, so the fully-qualified api-name
        // prefix steps in.
        let source_schemas = &source.components.as_ref().unwrap().schemas;
        assert!(source_schemas.contains_key("Inventory_Product_1"));
    }
}
