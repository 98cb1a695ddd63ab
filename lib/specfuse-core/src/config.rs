//! Configuration consumed by the merge engine.
//!
//! These types are owned and validated by the hosting layer (configuration
//! files, environment, CLI); the engine reads them and never mutates them.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder replaced by the scope prefix token in a naming pattern.
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";

/// Placeholder replaced by the original component name in a naming pattern.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Default conflict naming pattern, producing names like `Inventory_Product`.
pub const DEFAULT_NAMING_PATTERN: &str = "{prefix}_{name}";

/// Where one source document lives.
///
/// A source is either remote or on disk, never both; the enum makes the
/// exclusivity a property of the type instead of a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    /// Remote document fetched over HTTP(S).
    #[display("{_0}")]
    Url(Url),
    /// Document read from the local filesystem.
    #[display("{}", _0.display())]
    File(PathBuf),
}

/// Configuration of one backend source: where to fetch its document and how
/// to fold it into the merged one.
///
/// # Example
///
/// ```rust
/// use specfuse_core::SourceConfig;
///
/// let source = SourceConfig::from_file("inventory", "specs/inventory.yaml")
///     .with_path_prefix("/inventory")
///     .with_tag_prefix("inventory-")
///     .exclude_path("/internal/*")
///     .exclude_path("*/health");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name of the backend api. Used in reports and errors, and as the
    /// fallback rename prefix for sources without a path prefix.
    pub name: String,
    /// Where the document lives.
    pub location: SourceLocation,
    /// Virtual path prefix: merged path keys become `/<prefix>/<path>`.
    ///
    /// The prefix doubles as the namespacing signal during conflict
    /// resolution: a source that declares one has opted into namespacing
    /// and its colliding components are renamed with it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Prefix prepended verbatim to every tag name of this source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_prefix: Option<String>,
    /// Wildcard patterns for paths that must not be merged.
    ///
    /// `*` matches within or across path segments; `**` is invalid. The
    /// first matching pattern wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
}

impl SourceConfig {
    /// Creates a source fetched from a URL.
    pub fn from_url(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::Url(url),
            path_prefix: None,
            tag_prefix: None,
            exclude_patterns: Vec::new(),
        }
    }

    /// Creates a source read from a file.
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::File(path.into()),
            path_prefix: None,
            tag_prefix: None,
            exclude_patterns: Vec::new(),
        }
    }

    /// Sets the virtual path prefix.
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    /// Sets the tag prefix.
    #[must_use]
    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = Some(prefix.into());
        self
    }

    /// Adds an exclusion pattern.
    #[must_use]
    pub fn exclude_path(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }
}

/// Engine-wide merge settings.
///
/// Defaults are lenient: failed sources and duplicate paths degrade into
/// report entries instead of aborting the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Title of the merged document.
    pub title: String,
    /// Version of the merged document.
    pub version: String,
    /// Conflict naming pattern; must contain [`PREFIX_PLACEHOLDER`] and
    /// [`NAME_PLACEHOLDER`].
    pub naming_pattern: String,
    /// When `true` (the default), a path key that already exists in the
    /// merged document is dropped and recorded; when `false` it aborts the
    /// merge.
    pub skip_duplicate_paths: bool,
    /// When `true`, a source that fails to load aborts the whole merge
    /// instead of being skipped.
    pub require_all_sources: bool,
    /// Gateway base URL. When set, the gateway owns routing: it becomes the
    /// single server entry of the merged document and all per-source server
    /// information is suppressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<Url>,
    /// Timeout applied to each source fetch.
    pub fetch_timeout: Duration,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            title: "Aggregated API".to_string(),
            version: "1.0.0".to_string(),
            naming_pattern: DEFAULT_NAMING_PATTERN.to_string(),
            skip_duplicate_paths: true,
            require_all_sources: false,
            gateway_url: None,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_source_config() {
        let source = SourceConfig::from_file("inventory", "specs/inventory.yaml")
            .with_path_prefix("/inventory")
            .exclude_path("/internal/*");

        assert_eq!(source.name, "inventory");
        assert_eq!(source.path_prefix.as_deref(), Some("/inventory"));
        assert_eq!(source.exclude_patterns, vec!["/internal/*".to_string()]);
    }

    #[test]
    fn should_display_locations() {
        let url = SourceLocation::Url(Url::parse("https://orders.internal/openapi.json").unwrap());
        assert_eq!(url.to_string(), "https://orders.internal/openapi.json");

        let file = SourceLocation::File(PathBuf::from("specs/orders.yaml"));
        assert_eq!(file.to_string(), "specs/orders.yaml");
    }

    #[test]
    fn should_deserialize_settings_with_defaults() {
        let settings: MergeSettings = serde_json::from_str(r#"{"title": "Gateway API"}"#).unwrap();

        assert_eq!(settings.title, "Gateway API");
        assert_eq!(settings.naming_pattern, DEFAULT_NAMING_PATTERN);
        assert!(settings.skip_duplicate_paths);
        assert!(!settings.require_all_sources);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn should_deserialize_source_config() {
        let source: SourceConfig = serde_json::from_str(
            r#"{
                "name": "orders",
                "location": {"url": "https://orders.internal/openapi.json"},
                "path_prefix": "/orders"
            }"#,
        )
        .unwrap();

        assert_eq!(source.name, "orders");
        assert!(matches!(source.location, SourceLocation::Url(_)));
        assert_eq!(source.path_prefix.as_deref(), Some("/orders"));
        assert!(source.exclude_patterns.is_empty());
    }
}
