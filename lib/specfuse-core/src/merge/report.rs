//! Structured record of every decision a merge makes.
//!
//! The accumulator has no decision logic of its own: coordinators and the
//! path merger append events, `finalize` freezes them into a summary. The
//! serialized summary omits zero counters and empty sections so a diagnostics
//! endpoint shows only what actually happened.

use serde::Serialize;

/// Load outcome of one source, exposed to the hosting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLoad {
    /// Configured api name.
    pub api: String,
    /// URL or file path the document was loaded from.
    pub location: String,
    /// Whether a document was obtained.
    pub loaded: bool,
    /// Failure message for sources that were skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How one component-name collision was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Equivalent definitions collapsed into the existing entry.
    Deduplicated,
    /// The incoming component was renamed.
    RenamedIncoming,
    /// The existing entry was renamed.
    RenamedExisting,
    /// Both components were renamed; two records share this kind.
    RenamedBoth,
}

/// One recorded schema or security-scheme conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictResolution {
    /// Source api the decision applies to.
    pub api: String,
    /// Original component name.
    pub name: String,
    /// New name; absent for deduplications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
    /// Kind of resolution.
    pub kind: ResolutionKind,
}

/// A path that was left out of the merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathDecision {
    /// Source api the path came from.
    pub api: String,
    /// The (already prefixed) path key.
    pub path: String,
    /// Matched exclusion pattern or collision note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Append-only accumulator, built fresh per merge invocation.
#[derive(Debug, Default)]
pub(crate) struct MergeReport {
    sources: Vec<SourceLoad>,
    schema_resolutions: Vec<ConflictResolution>,
    scheme_resolutions: Vec<ConflictResolution>,
    excluded_paths: Vec<PathDecision>,
    skipped_paths: Vec<PathDecision>,
    merged_paths: usize,
    pruned_schemas: Vec<String>,
    pruned_schemes: Vec<String>,
}

impl MergeReport {
    pub(crate) fn source_loaded(&mut self, api: &str, location: &str) {
        self.sources.push(SourceLoad {
            api: api.to_string(),
            location: location.to_string(),
            loaded: true,
            message: None,
        });
    }

    pub(crate) fn source_failed(&mut self, api: &str, location: &str, message: String) {
        self.sources.push(SourceLoad {
            api: api.to_string(),
            location: location.to_string(),
            loaded: false,
            message: Some(message),
        });
    }

    pub(crate) fn schema_resolution(&mut self, resolution: ConflictResolution) {
        self.schema_resolutions.push(resolution);
    }

    pub(crate) fn scheme_resolution(&mut self, resolution: ConflictResolution) {
        self.scheme_resolutions.push(resolution);
    }

    pub(crate) fn path_excluded(&mut self, api: &str, path: &str, pattern: &str) {
        self.excluded_paths.push(PathDecision {
            api: api.to_string(),
            path: path.to_string(),
            reason: Some(pattern.to_string()),
        });
    }

    pub(crate) fn path_skipped(&mut self, api: &str, path: &str, reason: &str) {
        self.skipped_paths.push(PathDecision {
            api: api.to_string(),
            path: path.to_string(),
            reason: Some(reason.to_string()),
        });
    }

    pub(crate) fn path_merged(&mut self) {
        self.merged_paths += 1;
    }

    pub(crate) fn schemas_pruned(&mut self, names: Vec<String>) {
        self.pruned_schemas.extend(names);
    }

    pub(crate) fn schemes_pruned(&mut self, names: Vec<String>) {
        self.pruned_schemes.extend(names);
    }

    pub(crate) fn sources(&self) -> &[SourceLoad] {
        &self.sources
    }

    pub(crate) fn finalize(self) -> MergeSummary {
        let Self {
            sources,
            schema_resolutions,
            scheme_resolutions,
            excluded_paths,
            skipped_paths,
            merged_paths,
            pruned_schemas,
            pruned_schemes,
        } = self;
        MergeSummary {
            sources,
            schema_resolutions,
            scheme_resolutions,
            excluded_paths,
            skipped_paths,
            merged_paths,
            pruned_schemas,
            pruned_schemes,
        }
    }
}

/// Immutable summary of one merge.
///
/// Zero counters and empty sections disappear when serialized, keeping the
/// externally observable report free of noise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Per-source load outcomes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceLoad>,
    /// Schema-name conflict resolutions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schema_resolutions: Vec<ConflictResolution>,
    /// Security-scheme-name conflict resolutions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scheme_resolutions: Vec<ConflictResolution>,
    /// Paths excluded by configuration.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_paths: Vec<PathDecision>,
    /// Paths dropped because their key already existed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_paths: Vec<PathDecision>,
    /// Number of paths in the merged document.
    #[serde(skip_serializing_if = "is_zero")]
    pub merged_paths: usize,
    /// Schemas removed because nothing references them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned_schemas: Vec<String>,
    /// Security schemes removed because nothing references them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned_schemes: Vec<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(count: &usize) -> bool {
    *count == 0
}
