//! The merge engine: concurrent source loading and the deterministic fold
//! that turns N backend documents into one gateway document.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use openapiv3::{Info, OpenAPI, ReferenceOr, Server};
use tracing::{debug, info, warn};

use crate::config::{MergeSettings, SourceConfig};

mod builder;
pub use self::builder::SpecMergerBuilder;

mod error;
pub use self::error::MergeError;

mod loader;
pub use self::loader::{LoadError, LoadedSource};

mod naming;

mod origin;
use self::origin::{ComponentOrigin, ComponentOrigins};

mod paths;

mod refs;

mod report;
pub use self::report::{ConflictResolution, MergeSummary, PathDecision, ResolutionKind, SourceLoad};
use self::report::MergeReport;

mod schemas;

mod security;

mod strategy;
pub use self::strategy::{
    ConflictAction, ConflictResolutionStrategy, NameConflict, PrefixAwareResolution,
};


/// Everything one merge produces for the hosting layer.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The merged document, ready for version tagging and JSON/YAML encoding.
    pub document: OpenAPI,
    /// Per-source load results (url/path, loaded flag, optional error).
    pub sources: Vec<SourceLoad>,
    /// Full record of every decision the merge made.
    pub summary: MergeSummary,
}

/// Aggregates the OpenAPI documents of several backends into one document.
///
/// Built with [`SpecMergerBuilder`]; see the [crate documentation](crate) for
/// an overview of the fold. A merger is cheap to clone and safe to share:
/// all per-merge state lives inside the merge call.
#[derive(Debug, Clone)]
pub struct SpecMerger {
    client: reqwest::Client,
    sources: Vec<SourceConfig>,
    settings: MergeSettings,
    strategy: Arc<dyn ConflictResolutionStrategy>,
}

impl SpecMerger {
    /// Creates a builder.
    pub fn builder() -> SpecMergerBuilder {
        SpecMergerBuilder::default()
    }

    /// Loads every configured source concurrently, then folds the documents
    /// into one in configured order.
    ///
    /// # Errors
    ///
    /// Fails on an unreachable source when `require_all_sources` is set, and
    /// on a duplicate path key when `skip_duplicate_paths` is off. Everything
    /// else degrades into [`MergeSummary`] entries.
    pub async fn merge(&self) -> Result<MergeOutcome, MergeError> {
        let loaded =
            loader::load_all(&self.client, &self.sources, self.settings.fetch_timeout).await;
        self.merge_loaded(loaded)
    }

    /// Folds already-loaded documents into one.
    ///
    /// This is the synchronous, deterministic core of the engine;
    /// [`merge`](Self::merge) is load + fold. Callers with their own loading
    /// pipeline can hand parsed documents straight to this method.
    ///
    /// # Errors
    ///
    /// Same conditions as [`merge`](Self::merge).
    pub fn merge_loaded(&self, loaded: Vec<LoadedSource>) -> Result<MergeOutcome, MergeError> {
        let mut report = MergeReport::default();
        let mut target = self.empty_document();
        let mut schema_origins = ComponentOrigins::new();
        let mut scheme_origins = ComponentOrigins::new();
        let mut source_servers: IndexMap<String, Server> = IndexMap::new();

        for LoadedSource { config, outcome } in loaded {
            let location = config.location.to_string();
            let mut document = match outcome {
                Ok(document) => document,
                Err(error) => {
                    if self.settings.require_all_sources {
                        return Err(MergeError::SourceUnavailable {
                            api: config.name,
                            location,
                            source: error,
                        });
                    }
                    warn!(api = %config.name, %location, %error, "source skipped");
                    report.source_failed(&config.name, &location, error.to_string());
                    continue;
                }
            };
            debug!(api = %config.name, %location, "folding source");
            report.source_loaded(&config.name, &location);

            schemas::resolve_schema_conflicts(
                &mut target,
                &mut document,
                &config,
                &mut schema_origins,
                self.strategy.as_ref(),
                &self.settings.naming_pattern,
                &mut report,
            );
            security::resolve_scheme_conflicts(
                &mut target,
                &mut document,
                &config,
                &mut scheme_origins,
                self.strategy.as_ref(),
                &self.settings.naming_pattern,
                &mut report,
            );

            let server = paths::resolved_server(&config, &document);
            if let Some(server) = &server {
                source_servers
                    .entry(server.url.clone())
                    .or_insert_with(|| server.clone());
            }

            paths::merge_paths(
                &mut target,
                &mut document,
                &config,
                server.as_ref(),
                self.settings.gateway_url.is_some(),
                self.settings.skip_duplicate_paths,
                &mut report,
            )?;

            merge_components(
                &mut target,
                document,
                &config,
                &mut schema_origins,
                &mut scheme_origins,
            );
        }

        prune_orphans(&mut target, &mut report);
        target.servers = self.consolidated_servers(source_servers);

        let sources = report.sources().to_vec();
        let summary = report.finalize();
        info!(
            paths = target.paths.paths.len(),
            sources = sources.len(),
            "merge complete"
        );
        Ok(MergeOutcome {
            document: target,
            sources,
            summary,
        })
    }

    fn empty_document(&self) -> OpenAPI {
        OpenAPI {
            openapi: "3.0.3".to_string(),
            info: Info {
                title: self.settings.title.clone(),
                version: self.settings.version.clone(),
                ..Info::default()
            },
            ..OpenAPI::default()
        }
    }

    fn consolidated_servers(&self, source_servers: IndexMap<String, Server>) -> Vec<Server> {
        match &self.settings.gateway_url {
            Some(url) => vec![Server {
                url: url.as_str().trim_end_matches('/').to_string(),
                ..Server::default()
            }],
            None => source_servers.into_values().collect(),
        }
    }
}

/// Moves the remaining components and tags of a folded source into the target
/// and records who introduced each component.
fn merge_components(
    target: &mut OpenAPI,
    document: OpenAPI,
    config: &SourceConfig,
    schema_origins: &mut ComponentOrigins,
    scheme_origins: &mut ComponentOrigins,
) {
    if let Some(components) = document.components {
        let target_components = target.components.get_or_insert_with(Default::default);
        for (name, schema) in components.schemas {
            schema_origins
                .entry(name.clone())
                .or_insert_with(|| ComponentOrigin::new(config));
            target_components.schemas.entry(name).or_insert(schema);
        }
        for (name, scheme) in components.security_schemes {
            scheme_origins
                .entry(name.clone())
                .or_insert_with(|| ComponentOrigin::new(config));
            target_components
                .security_schemes
                .entry(name)
                .or_insert(scheme);
        }
    }

    for mut tag in document.tags {
        if let Some(prefix) = config.tag_prefix.as_deref() {
            tag.name = format!("{prefix}{}", tag.name);
        }
        if !target.tags.iter().any(|existing| existing.name == tag.name) {
            target.tags.push(tag);
        }
    }
}

/// Removes schemas and security schemes not transitively reachable from any
/// merged path or top-level security requirement. Idempotent.
fn prune_orphans(target: &mut OpenAPI, report: &mut MergeReport) {
    if target.components.is_none() {
        return;
    }

    let seeds = refs::path_level_schema_refs(target);
    let live_schemas = target
        .components
        .as_ref()
        .map(|components| refs::reachable_schemas(components, seeds))
        .unwrap_or_default();

    let live_schemes = referenced_scheme_names(target);

    let Some(components) = target.components.as_mut() else {
        return;
    };

    let mut pruned_schemas = Vec::new();
    let schemas = std::mem::take(&mut components.schemas);
    for (name, schema) in schemas {
        if live_schemas.contains(&name) {
            components.schemas.insert(name, schema);
        } else {
            pruned_schemas.push(name);
        }
    }

    let mut pruned_schemes = Vec::new();
    let schemes = std::mem::take(&mut components.security_schemes);
    for (name, scheme) in schemes {
        if live_schemes.contains(&name) {
            components.security_schemes.insert(name, scheme);
        } else {
            pruned_schemes.push(name);
        }
    }

    if !pruned_schemas.is_empty() {
        debug!(count = pruned_schemas.len(), "pruned unreferenced schemas");
        report.schemas_pruned(pruned_schemas);
    }
    if !pruned_schemes.is_empty() {
        debug!(
            count = pruned_schemes.len(),
            "pruned unreferenced security schemes"
        );
        report.schemes_pruned(pruned_schemes);
    }
}

/// Scheme names referenced by any security requirement, at document level or
/// on any merged operation.
fn referenced_scheme_names(document: &OpenAPI) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    if let Some(security) = &document.security {
        for requirement in security {
            names.extend(requirement.keys().cloned());
        }
    }
    for path_item in document.paths.paths.values() {
        let ReferenceOr::Item(item) = path_item else {
            continue;
        };
        for operation in refs::operations(item) {
            if let Some(security) = &operation.security {
                for requirement in security {
                    names.extend(requirement.keys().cloned());
                }
            }
        }
    }
    names
}
