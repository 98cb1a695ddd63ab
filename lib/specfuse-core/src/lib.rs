//! # Specfuse Core
//!
//! Aggregate the OpenAPI documents of several backend services into one
//! consistent document for an API gateway.
//!
//! Gateways front many services but want to expose a single specification to
//! clients and tooling. Folding independent documents together is a
//! constrained renaming problem: schema and security-scheme names collide,
//! `$ref`s must keep resolving after renames, and the result has to be
//! reproducible no matter which backend answered first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use specfuse_core::{SourceConfig, SpecMerger};
//! use url::Url;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let merger = SpecMerger::builder()
//!     .add_source(
//!         SourceConfig::from_url("orders", Url::parse("https://orders.internal/openapi.json")?)
//!             .with_path_prefix("/orders"),
//!     )
//!     .add_source(
//!         SourceConfig::from_file("inventory", "specs/inventory.yaml")
//!             .with_path_prefix("/inventory")
//!             .exclude_path("/internal/*"),
//!     )
//!     .build()?;
//!
//! let outcome = merger.merge().await?;
//!
//! // The merged document is ready for the serializer of your choice.
//! let json = serde_json::to_string_pretty(&outcome.document)?;
//!
//! // Every decision the merge made is itemized in the summary.
//! for skipped in &outcome.summary.skipped_paths {
//!     eprintln!("dropped {} from {}", skipped.path, skipped.api);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## How sources are folded
//!
//! All sources are fetched concurrently, then folded into the target **in
//! configured order**, never completion order, so re-running the same
//! configuration always produces the same document and the same renames.
//! Per source, in order:
//!
//! 1. schema name collisions are resolved (deduplicated when the definitions
//!    are structurally identical, renamed otherwise),
//! 2. security scheme collisions are resolved (deduplicated when semantically
//!    equal),
//! 3. paths are merged (virtual prefixes, exclusion wildcards, duplicate-path
//!    policy, operation materialization),
//! 4. remaining components and tags are carried over.
//!
//! After the last source, components unreachable from any merged path are
//! pruned and the server list is consolidated.
//!
//! ## Error handling
//!
//! Unreachable or unparseable sources are skipped and itemized in the
//! [`MergeSummary`] unless `require_all_sources` is set, in which case they
//! abort the merge. Duplicate path keys are skipped by default and fatal with
//! `skip_duplicate_paths(false)`. Name collisions are never fatal: the
//! resolution falls back to numeric suffixes, which cannot fail.

mod config;
mod merge;

// Public API - only expose user-facing types and functions
pub use self::config::{
    DEFAULT_NAMING_PATTERN, MergeSettings, NAME_PLACEHOLDER, PREFIX_PLACEHOLDER, SourceConfig,
    SourceLocation,
};
pub use self::merge::{
    ConflictAction, ConflictResolution, ConflictResolutionStrategy, LoadError, LoadedSource,
    MergeError, MergeOutcome, MergeSummary, NameConflict, PathDecision, PrefixAwareResolution,
    ResolutionKind, SourceLoad, SpecMerger, SpecMergerBuilder,
};
