use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{MergeSettings, SourceConfig};
use crate::merge::strategy::{ConflictResolutionStrategy, PrefixAwareResolution};
use crate::merge::{naming, paths, MergeError, SpecMerger};

/// Builder for [`SpecMerger`] instances.
///
/// Configuration is validated once in [`build`](Self::build): the naming
/// pattern must carry both placeholders and every exclusion pattern must
/// compile, so a merger that exists is a merger that can run.
///
/// # Example
///
/// ```rust
/// use specfuse_core::{SourceConfig, SpecMerger};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let merger = SpecMerger::builder()
///     .with_title("Gateway API")
///     .add_source(SourceConfig::from_file("orders", "specs/orders.json"))
///     .add_source(
///         SourceConfig::from_file("inventory", "specs/inventory.yaml")
///             .with_path_prefix("/inventory"),
///     )
///     .skip_duplicate_paths(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SpecMergerBuilder {
    client: Option<reqwest::Client>,
    sources: Vec<SourceConfig>,
    settings: MergeSettings,
    strategy: Option<Arc<dyn ConflictResolutionStrategy>>,
}

impl SpecMergerBuilder {
    /// Adds one source. Sources are folded in the order they were added.
    #[must_use]
    pub fn add_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds several sources, preserving their order.
    #[must_use]
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceConfig>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Replaces the whole settings block, e.g. one deserialized from a
    /// configuration file.
    #[must_use]
    pub fn with_settings(mut self, settings: MergeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the title of the merged document.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.settings.title = title.into();
        self
    }

    /// Sets the version of the merged document.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.settings.version = version.into();
        self
    }

    /// Sets the conflict naming pattern; it must contain `{prefix}` and
    /// `{name}`.
    #[must_use]
    pub fn with_naming_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.settings.naming_pattern = pattern.into();
        self
    }

    /// Sets the gateway base URL. The gateway becomes the single server entry
    /// and per-source server information is suppressed.
    #[must_use]
    pub fn with_gateway_url(mut self, url: Url) -> Self {
        self.settings.gateway_url = Some(url);
        self
    }

    /// Sets the per-source fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.settings.fetch_timeout = timeout;
        self
    }

    /// Selects whether duplicate path keys are skipped (`true`, default) or
    /// abort the merge (`false`).
    #[must_use]
    pub fn skip_duplicate_paths(mut self, skip: bool) -> Self {
        self.settings.skip_duplicate_paths = skip;
        self
    }

    /// Selects whether an unreachable source aborts the merge.
    #[must_use]
    pub fn require_all_sources(mut self, require: bool) -> Self {
        self.settings.require_all_sources = require;
        self
    }

    /// Injects an alternate conflict-resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl ConflictResolutionStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Uses a preconfigured HTTP client for fetching remote sources.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the merger.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidNamingPattern`] when the naming pattern
    /// is missing a placeholder, and
    /// [`MergeError::InvalidExclusionPattern`] when an exclusion pattern
    /// cannot be compiled.
    pub fn build(self) -> Result<SpecMerger, MergeError> {
        let Self {
            client,
            sources,
            settings,
            strategy,
        } = self;

        naming::validate_pattern(&settings.naming_pattern)?;
        for source in &sources {
            for pattern in &source.exclude_patterns {
                paths::compile_exclusion(pattern)?;
            }
        }

        Ok(SpecMerger {
            client: client.unwrap_or_default(),
            sources,
            settings,
            strategy: strategy.unwrap_or_else(|| Arc::new(PrefixAwareResolution)),
        })
    }
}
