//! Path merging: exclusion wildcards, virtual-prefix keys, duplicate-path
//! policy, and operation materialization.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use openapiv3::{OpenAPI, PathItem, ReferenceOr, SecurityRequirement, Server};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{SourceConfig, SourceLocation};
use crate::merge::error::MergeError;
use crate::merge::naming;
use crate::merge::refs;
use crate::merge::report::MergeReport;

/// Compiled exclusion patterns, keyed by the raw pattern string.
///
/// Patterns are static per configuration load, so the cache only ever grows
/// and needs no invalidation; concurrent merges share it behind the lock.
static PATTERN_CACHE: LazyLock<RwLock<HashMap<String, Regex>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Compiles a `*` wildcard pattern into an anchored regex.
///
/// `*` matches any run of characters, within or across path segments;
/// everything else matches literally. Two adjacent wildcards are invalid
/// configuration.
pub(crate) fn compile_exclusion(pattern: &str) -> Result<Regex, MergeError> {
    if pattern.contains("**") {
        return Err(MergeError::InvalidExclusionPattern {
            pattern: pattern.to_string(),
            reason: "adjacent wildcards".to_string(),
        });
    }
    if let Some(regex) = PATTERN_CACHE
        .read()
        .ok()
        .and_then(|cache| cache.get(pattern).cloned())
    {
        return Ok(regex);
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let regex =
        Regex::new(&format!("^{body}$")).map_err(|error| MergeError::InvalidExclusionPattern {
            pattern: pattern.to_string(),
            reason: error.to_string(),
        })?;
    if let Ok(mut cache) = PATTERN_CACHE.write() {
        cache.insert(pattern.to_string(), regex.clone());
    }
    Ok(regex)
}

/// First exclusion pattern of `config` matching `path`, if any.
fn excluded_by(config: &SourceConfig, path: &str) -> Result<Option<String>, MergeError> {
    for pattern in &config.exclude_patterns {
        if compile_exclusion(pattern)?.is_match(path) {
            return Ok(Some(pattern.clone()));
        }
    }
    Ok(None)
}

/// Key of a source path in the merged document.
pub(crate) fn merged_path_key(config: &SourceConfig, path: &str) -> String {
    match config.path_prefix.as_deref() {
        Some(prefix) => format!(
            "/{}/{}",
            prefix.trim_matches('/'),
            path.trim_start_matches('/')
        ),
        None => path.to_string(),
    }
}

/// Server entry representing a source: its document's first server, else the
/// origin of its fetch URL.
pub(crate) fn resolved_server(config: &SourceConfig, document: &OpenAPI) -> Option<Server> {
    if let Some(server) = document.servers.first() {
        return Some(server.clone());
    }
    match &config.location {
        SourceLocation::Url(url) => {
            let host = url.host_str()?;
            let mut origin = format!("{}://{host}", url.scheme());
            if let Some(port) = url.port() {
                origin.push_str(&format!(":{port}"));
            }
            Some(Server {
                url: origin,
                ..Server::default()
            })
        }
        SourceLocation::File(_) => None,
    }
}

/// Merges the paths of `source` into `target`, in declaration order.
///
/// Excluded and colliding paths never make it into the target; everything
/// else is materialized as a fully self-contained path item.
#[allow(clippy::too_many_arguments)]
pub(crate) fn merge_paths(
    target: &mut OpenAPI,
    source: &mut OpenAPI,
    config: &SourceConfig,
    server: Option<&Server>,
    gateway_configured: bool,
    skip_duplicates: bool,
    report: &mut MergeReport,
) -> Result<(), MergeError> {
    let document_security = source.security.clone().filter(|security| !security.is_empty());
    let paths = std::mem::take(&mut source.paths.paths);

    for (path, item) in paths {
        if let Some(pattern) = excluded_by(config, &path)? {
            debug!(api = %config.name, %path, %pattern, "path excluded");
            report.path_excluded(&config.name, &path, &pattern);
            continue;
        }

        let key = merged_path_key(config, &path);
        let ReferenceOr::Item(mut item) = item else {
            warn!(api = %config.name, %path, "referenced path items are not merged");
            report.path_skipped(&config.name, &key, "referenced path item");
            continue;
        };

        if target.paths.paths.contains_key(&key) {
            if skip_duplicates {
                debug!(api = %config.name, %key, "duplicate path skipped");
                report.path_skipped(&config.name, &key, "duplicate path");
                continue;
            }
            return Err(MergeError::DuplicatePath {
                path: key,
                api: config.name.clone(),
            });
        }

        materialize_path_item(
            &mut item,
            config,
            document_security.as_deref(),
            server,
            gateway_configured,
        );
        target.paths.paths.insert(key, ReferenceOr::Item(item));
        report.path_merged();
    }

    Ok(())
}

/// Makes a path item self-contained in the merged document: prefixed
/// operation ids and tags, gateway-aware servers, materialized security, and
/// a summary that is never left undefined.
fn materialize_path_item(
    item: &mut PathItem,
    config: &SourceConfig,
    document_security: Option<&[SecurityRequirement]>,
    server: Option<&Server>,
    gateway_configured: bool,
) {
    if gateway_configured {
        item.servers.clear();
    }

    let operation_prefix = config.path_prefix.as_deref().map(naming::prefix_token);

    for operation in refs::operations_mut(item) {
        if let Some(token) = operation_prefix.as_deref() {
            if let Some(operation_id) = operation.operation_id.take() {
                operation.operation_id = Some(format!("{token}_{operation_id}"));
            }
        }

        if let Some(prefix) = config.tag_prefix.as_deref() {
            for tag in &mut operation.tags {
                *tag = format!("{prefix}{tag}");
            }
        }

        if gateway_configured {
            // The gateway owns routing; backend servers would bypass it.
            operation.servers.clear();
        } else if operation.servers.is_empty() {
            if let Some(server) = server {
                operation.servers.push(server.clone());
            }
        }

        // Operations stay self-describing once detached from their document.
        if operation.security.is_none() {
            if let Some(security) = document_security {
                operation.security = Some(security.to_vec());
            }
        }

        if operation.summary.is_none() {
            operation.summary = Some(String::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn document(value: serde_json::Value) -> OpenAPI {
        serde_json::from_value(value).expect("valid test document")
    }

    fn empty_target() -> OpenAPI {
        document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Aggregated API", "version": "1.0.0"},
            "paths": {}
        }))
    }

    #[rstest]
    #[case("/api/*", "/api/users", true)]
    #[case("/api/*", "/api/users/1", true)]
    #[case("/api/*", "/apiX", false)]
    #[case("*/admin", "/v1/admin", true)]
    #[case("*/admin", "/v2/admin", true)]
    #[case("*/admin", "/admin/users", false)]
    #[case("/api/*/details", "/api/users/details", true)]
    #[case("/api/*/details", "/api/details", false)]
    #[case("/admin*", "/admin", true)]
    #[case("/admin*", "/administrators", true)]
    #[case("/admin*", "/api/admin", false)]
    fn should_match_wildcard_patterns(
        #[case] pattern: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        let regex = compile_exclusion(pattern).unwrap();
        assert_eq!(regex.is_match(path), expected, "{pattern} vs {path}");
    }

    #[test]
    fn should_reject_adjacent_wildcards() {
        let error = compile_exclusion("/api/**").unwrap_err();
        assert!(matches!(
            error,
            MergeError::InvalidExclusionPattern { .. }
        ));
    }

    #[rstest]
    #[case(Some("/inventory"), "/products", "/inventory/products")]
    #[case(Some("inventory/"), "/products", "/inventory/products")]
    #[case(None, "/products", "/products")]
    fn should_generate_path_keys(
        #[case] prefix: Option<&str>,
        #[case] path: &str,
        #[case] expected: &str,
    ) {
        let mut config = SourceConfig::from_file("inventory", "a.json");
        if let Some(prefix) = prefix {
            config = config.with_path_prefix(prefix);
        }
        assert_eq!(merged_path_key(&config, path), expected);
    }

    #[test]
    fn should_prefer_document_server_over_fetch_origin() {
        let config = SourceConfig::from_url(
            "orders",
            url::Url::parse("https://orders.internal:8443/specs/openapi.json").unwrap(),
        );

        let with_server = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Orders", "version": "1.0.0"},
            "servers": [{"url": "https://public.example.com/orders"}],
            "paths": {}
        }));
        let server = resolved_server(&config, &with_server).unwrap();
        assert_eq!(server.url, "https://public.example.com/orders");

        let without_server = empty_target();
        let server = resolved_server(&config, &without_server).unwrap();
        assert_eq!(server.url, "https://orders.internal:8443");
    }

    #[test]
    fn should_materialize_operations() {
        let mut source = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Inventory", "version": "1.0.0"},
            "security": [{"bearerAuth": []}],
            "paths": {
                "/products": {
                    "get": {
                        "operationId": "listProducts",
                        "tags": ["products"],
                        "responses": {"200": {"description": "ok"}}
                    },
                    "post": {
                        "operationId": "createProduct",
                        "security": [{"apiKey": []}],
                        "responses": {"201": {"description": "created"}}
                    }
                }
            }
        }));
        let config = SourceConfig::from_file("inventory", "a.json")
            .with_path_prefix("/inventory")
            .with_tag_prefix("inv-");
        let server = Server {
            url: "https://inventory.internal".to_string(),
            ..Server::default()
        };

        let mut target = empty_target();
        let mut report = MergeReport::default();
        merge_paths(
            &mut target,
            &mut source,
            &config,
            Some(&server),
            false,
            true,
            &mut report,
        )
        .unwrap();

        let ReferenceOr::Item(item) = &target.paths.paths["/inventory/products"] else {
            panic!("expected a concrete path item");
        };

        let get = item.get.as_ref().unwrap();
        assert_eq!(get.operation_id.as_deref(), Some("Inventory_listProducts"));
        assert_eq!(get.tags, vec!["inv-products".to_string()]);
        assert_eq!(get.summary.as_deref(), Some(""));
        assert_eq!(get.servers[0].url, "https://inventory.internal");
        // No explicit security: the document-level default is materialized.
        assert!(get.security.as_ref().unwrap()[0].contains_key("bearerAuth"));

        // Explicit security is left alone.
        let post = item.post.as_ref().unwrap();
        assert!(post.security.as_ref().unwrap()[0].contains_key("apiKey"));
    }

    #[test]
    fn should_clear_servers_when_gateway_owns_routing() {
        let mut source = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Inventory", "version": "1.0.0"},
            "paths": {
                "/products": {
                    "servers": [{"url": "https://inventory.internal"}],
                    "get": {
                        "servers": [{"url": "https://inventory.internal"}],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let config = SourceConfig::from_file("inventory", "a.json");

        let mut target = empty_target();
        let mut report = MergeReport::default();
        merge_paths(
            &mut target,
            &mut source,
            &config,
            None,
            true,
            true,
            &mut report,
        )
        .unwrap();

        let ReferenceOr::Item(item) = &target.paths.paths["/products"] else {
            panic!("expected a concrete path item");
        };
        assert!(item.servers.is_empty());
        assert!(item.get.as_ref().unwrap().servers.is_empty());
    }

    #[test]
    fn should_exclude_before_collision_checks() {
        let mut source = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Inventory", "version": "1.0.0"},
            "paths": {
                "/internal/metrics": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/products": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        }));
        let config = SourceConfig::from_file("inventory", "a.json").exclude_path("/internal/*");

        let mut target = empty_target();
        let mut report = MergeReport::default();
        merge_paths(
            &mut target,
            &mut source,
            &config,
            None,
            false,
            true,
            &mut report,
        )
        .unwrap();

        assert!(!target.paths.paths.contains_key("/internal/metrics"));
        assert!(target.paths.paths.contains_key("/products"));

        let summary = report.finalize();
        assert_eq!(summary.excluded_paths.len(), 1);
        assert_eq!(summary.excluded_paths[0].reason.as_deref(), Some("/internal/*"));
        assert_eq!(summary.merged_paths, 1);
    }

    #[test]
    fn should_error_on_duplicate_path_in_strict_mode() {
        let mut source = document(json!({
            "openapi": "3.0.3",
            "info": {"title": "Widgets v2", "version": "1.0.0"},
            "paths": {
                "/api/widgets": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        }));
        let config = SourceConfig::from_file("widgets-v2", "b.json");

        let mut target = empty_target();
        target.paths.paths.insert(
            "/api/widgets".to_string(),
            ReferenceOr::Item(PathItem::default()),
        );

        let mut report = MergeReport::default();
        let error = merge_paths(
            &mut target,
            &mut source,
            &config,
            None,
            false,
            false,
            &mut report,
        )
        .unwrap_err();

        assert!(matches!(
            error,
            MergeError::DuplicatePath { path, api }
                if path == "/api/widgets" && api == "widgets-v2"
        ));
    }
}
