//! Security-scheme-name conflict resolution.
//!
//! Mirrors the schema coordinator with a different equality test: schemes are
//! deduplicated when they are *semantically* equal (same type, same HTTP
//! scheme, same header/parameter name and location, same bearer format, same
//! OpenID-Connect URL) rather than byte-for-byte identical. Differing
//! descriptions never keep two schemes apart.
//!
//! Schemes are referenced by name from security requirement maps, not by
//! `$ref`, so after renaming every requirement in the rewritten document is
//! re-keyed.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use openapiv3::{OpenAPI, ReferenceOr, SecurityRequirement, SecurityScheme};
use serde_json::Value;
use tracing::debug;

use crate::config::SourceConfig;
use crate::merge::naming;
use crate::merge::origin::{rekey_origins, ComponentOrigin, ComponentOrigins};
use crate::merge::refs;
use crate::merge::report::{ConflictResolution, MergeReport, ResolutionKind};
use crate::merge::strategy::{ConflictAction, ConflictResolutionStrategy, NameConflict};

/// Detects and resolves every security-scheme name of `source` that already
/// exists in `target`.
pub(crate) fn resolve_scheme_conflicts(
    target: &mut OpenAPI,
    source: &mut OpenAPI,
    config: &SourceConfig,
    origins: &mut ComponentOrigins,
    strategy: &dyn ConflictResolutionStrategy,
    pattern: &str,
    report: &mut MergeReport,
) {
    let mut deduplicated = Vec::new();
    let mut target_renames: IndexMap<String, String> = IndexMap::new();
    let mut source_renames: IndexMap<String, String> = IndexMap::new();

    {
        let Some(source_components) = source.components.as_ref() else {
            return;
        };
        if source_components.security_schemes.is_empty() {
            return;
        }
        let target_schemes = target
            .components
            .as_ref()
            .map(|components| &components.security_schemes);

        let mut taken: BTreeSet<String> =
            source_components.security_schemes.keys().cloned().collect();
        if let Some(schemes) = target_schemes {
            taken.extend(schemes.keys().cloned());
        }

        let incoming_token = config
            .path_prefix
            .as_deref()
            .map_or_else(|| naming::prefix_token(&config.name), naming::prefix_token);
        let incoming_qualified = naming::prefix_token(&config.name);

        for (name, incoming_scheme) in &source_components.security_schemes {
            let Some(existing_scheme) = target_schemes.and_then(|schemes| schemes.get(name)) else {
                continue;
            };

            let equivalent = semantically_equal(existing_scheme, incoming_scheme);
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
                    debug!(api = %config.name, scheme = %name, "deduplicated security scheme");
                    deduplicated.push(name.clone());
                    report.scheme_resolution(ConflictResolution {
                        api: config.name.clone(),
                        name: name.clone(),
                        renamed_to: None,
                        kind: ResolutionKind::Deduplicated,
                    });
                }
                ConflictAction::RenameIncoming => {
                    let new_name = naming::unique_rename(
                        pattern,
                        &incoming_token,
                        &incoming_qualified,
                        name,
                        &|candidate| taken.contains(candidate),
                    );
                    taken.insert(new_name.clone());
                    source_renames.insert(name.clone(), new_name.clone());
                    report.scheme_resolution(ConflictResolution {
                        api: config.name.clone(),
                        name: name.clone(),
                        renamed_to: Some(new_name),
                        kind: ResolutionKind::RenamedIncoming,
                    });
                }
                ConflictAction::RenameExisting => {
                    let new_name = existing_rename(&mut taken, pattern, &origin, name);
                    target_renames.insert(name.clone(), new_name.clone());
                    report.scheme_resolution(ConflictResolution {
                        api: origin.api.clone(),
                        name: name.clone(),
                        renamed_to: Some(new_name),
                        kind: ResolutionKind::RenamedExisting,
                    });
                }
                ConflictAction::RenameBoth => {
                    let existing_name = existing_rename(&mut taken, pattern, &origin, name);
                    target_renames.insert(name.clone(), existing_name.clone());
                    report.scheme_resolution(ConflictResolution {
                        api: origin.api.clone(),
                        name: name.clone(),
                        renamed_to: Some(existing_name),
                        kind: ResolutionKind::RenamedBoth,
                    });
                    let incoming_name = naming::unique_rename(
                        pattern,
                        &incoming_token,
                        &incoming_qualified,
                        name,
                        &|candidate| taken.contains(candidate),
                    );
                    taken.insert(incoming_name.clone());
                    source_renames.insert(name.clone(), incoming_name.clone());
                    report.scheme_resolution(ConflictResolution {
                        api: config.name.clone(),
                        name: name.clone(),
                        renamed_to: Some(incoming_name),
                        kind: ResolutionKind::RenamedBoth,
                    });
                }
            }
        }
    }

    if !deduplicated.is_empty() {
        if let Some(components) = source.components.as_mut() {
            for name in &deduplicated {
                components.security_schemes.shift_remove(name);
            }
        }
    }

    apply_scheme_renames(target, &target_renames);
    rekey_origins(origins, &target_renames);
    apply_scheme_renames(source, &source_renames);
}

fn existing_rename(
    taken: &mut BTreeSet<String>,
    pattern: &str,
    origin: &ComponentOrigin,
    name: &str,
) -> String {
    let token = origin
        .prefix
        .as_deref()
        .map_or_else(|| naming::prefix_token(&origin.api), naming::prefix_token);
    let qualified = naming::prefix_token(&origin.api);
    let new_name = naming::unique_rename(pattern, &token, &qualified, name, &|candidate| {
        taken.contains(candidate)
    });
    taken.insert(new_name.clone());
    new_name
}

/// Re-keys the security schemes of `document` and every security requirement
/// that references a renamed name, at document level and on every operation.
pub(crate) fn apply_scheme_renames(document: &mut OpenAPI, renames: &IndexMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    if let Some(components) = document.components.as_mut() {
        let schemes = std::mem::take(&mut components.security_schemes);
        components.security_schemes = schemes
            .into_iter()
            .map(|(name, scheme)| match renames.get(&name) {
                Some(new_name) => (new_name.clone(), scheme),
                None => (name, scheme),
            })
            .collect();
    }
    if let Some(security) = document.security.as_mut() {
        rewrite_requirements(security, renames);
    }
    for path_item in document.paths.paths.values_mut() {
        if let ReferenceOr::Item(item) = path_item {
            for operation in refs::operations_mut(item) {
                if let Some(security) = operation.security.as_mut() {
                    rewrite_requirements(security, renames);
                }
            }
        }
    }
}

fn rewrite_requirements(
    requirements: &mut Vec<SecurityRequirement>,
    renames: &IndexMap<String, String>,
) {
    for requirement in requirements.iter_mut() {
        if requirement.keys().any(|name| renames.contains_key(name)) {
            *requirement = std::mem::take(requirement)
                .into_iter()
                .map(|(name, scopes)| match renames.get(&name) {
                    Some(new_name) => (new_name.clone(), scopes),
                    None => (name, scopes),
                })
                .collect();
        }
    }
}

/// Semantic equality of two schemes: their canonical serialized forms with
/// every `description` stripped. Scope maps still participate, so OAuth2
/// schemes with different scopes stay distinct.
fn semantically_equal(
    left: &ReferenceOr<SecurityScheme>,
    right: &ReferenceOr<SecurityScheme>,
) -> bool {
    match (canonical(left), canonical(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn canonical(scheme: &ReferenceOr<SecurityScheme>) -> Option<Value> {
    let mut value = serde_json::to_value(scheme).ok()?;
    strip_descriptions(&mut value);
    Some(value)
}

fn strip_descriptions(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("description");
            for nested in map.values_mut() {
                strip_descriptions(nested);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_descriptions(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::merge::strategy::PrefixAwareResolution;

    use super::*;

    fn scheme(value: serde_json::Value) -> ReferenceOr<SecurityScheme> {
        serde_json::from_value(value).expect("valid test scheme")
    }

    fn doc_with_scheme(name: &str, scheme: serde_json::Value) -> OpenAPI {
        let mut schemes = serde_json::Map::new();
        schemes.insert(name.to_string(), scheme);
        let mut requirement = serde_json::Map::new();
        requirement.insert(name.to_string(), json!([]));
        serde_json::from_value(json!({
            "openapi": "3.0.3",
            "info": {"title": "Test", "version": "1.0.0"},
            "paths": {
                "/items": {
                    "get": {
                        "security": [requirement.clone()],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            },
            "security": [requirement],
            "components": {"securitySchemes": schemes}
        }))
        .expect("valid test document")
    }

    #[test]
    fn should_treat_descriptions_as_irrelevant() {
        let left = scheme(json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}));
        let right = scheme(json!({
            "type": "http",
            "scheme": "bearer",
            "bearerFormat": "JWT",
            "description": "JWT issued by the auth service"
        }));
        assert!(semantically_equal(&left, &right));
    }

    #[test]
    fn should_distinguish_bearer_formats_and_locations() {
        let bearer = scheme(json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}));
        let opaque = scheme(json!({"type": "http", "scheme": "bearer"}));
        assert!(!semantically_equal(&bearer, &opaque));

        let header = scheme(json!({"type": "apiKey", "name": "X-Key", "in": "header"}));
        let query = scheme(json!({"type": "apiKey", "name": "X-Key", "in": "query"}));
        assert!(!semantically_equal(&header, &query));
    }

    #[test]
    fn should_deduplicate_identical_bearer_schemes() {
        let bearer = json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"});
        let mut target = doc_with_scheme("bearerAuth", bearer.clone());
        let mut source = doc_with_scheme("bearerAuth", bearer);

        let first = SourceConfig::from_file("orders", "a.json");
        let second = SourceConfig::from_file("inventory", "b.json");
        let mut origins = ComponentOrigins::new();
        origins.insert("bearerAuth".to_string(), ComponentOrigin::new(&first));

        let mut report = MergeReport::default();
        resolve_scheme_conflicts(
            &mut target,
            &mut source,
            &second,
            &mut origins,
            &PrefixAwareResolution,
            "{prefix}_{name}",
            &mut report,
        );

        assert!(
            !source
                .components
                .as_ref()
                .unwrap()
                .security_schemes
                .contains_key("bearerAuth")
        );
        let summary = report.finalize();
        assert_eq!(summary.scheme_resolutions.len(), 1);
        assert_eq!(
            summary.scheme_resolutions[0].kind,
            ResolutionKind::Deduplicated
        );
    }

    #[test]
    fn should_rename_incoming_scheme_and_rewrite_requirements() {
        let mut target = doc_with_scheme(
            "auth",
            json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}),
        );
        let mut source = doc_with_scheme(
            "auth",
            json!({"type": "apiKey", "name": "X-Key", "in": "header"}),
        );

        let first = SourceConfig::from_file("orders", "a.json");
        let second = SourceConfig::from_file("inventory", "b.json");
        let mut origins = ComponentOrigins::new();
        origins.insert("auth".to_string(), ComponentOrigin::new(&first));

        let mut report = MergeReport::default();
        resolve_scheme_conflicts(
            &mut target,
            &mut source,
            &second,
            &mut origins,
            &PrefixAwareResolution,
            "{prefix}_{name}",
            &mut report,
        );

        let schemes = &source.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("Inventory_auth"));
        assert!(!schemes.contains_key("auth"));

        // Document-level and operation-level requirements follow the rename.
        let document_security = source.security.as_ref().unwrap();
        assert!(document_security[0].contains_key("Inventory_auth"));

        let ReferenceOr::Item(item) = &source.paths.paths["/items"] else {
            panic!("expected a concrete path item");
        };
        let operation_security = item.get.as_ref().unwrap().security.as_ref().unwrap();
        assert!(operation_security[0].contains_key("Inventory_auth"));
    }
}
