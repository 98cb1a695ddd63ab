//! Bookkeeping of which source introduced each component of the target.
//!
//! The origin map exists only to drive conflict resolution: when a name
//! collides, the policy needs to know whether the source that introduced the
//! existing entry had opted into namespacing. It is constructed inside each
//! merge invocation and discarded with it, never stored on the engine and
//! never part of the output.

use indexmap::IndexMap;

use crate::config::SourceConfig;

/// Name → origin for components currently in the target document.
pub(crate) type ComponentOrigins = IndexMap<String, ComponentOrigin>;

/// The `(api, virtual prefix)` pair that introduced a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComponentOrigin {
    pub(crate) api: String,
    pub(crate) prefix: Option<String>,
}

impl ComponentOrigin {
    pub(crate) fn new(config: &SourceConfig) -> Self {
        Self {
            api: config.name.clone(),
            prefix: config.path_prefix.clone(),
        }
    }
}

/// Re-keys origins after a batch of target renames.
pub(crate) fn rekey_origins(origins: &mut ComponentOrigins, renames: &IndexMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    let moved = std::mem::take(origins);
    *origins = moved
        .into_iter()
        .map(|(name, origin)| match renames.get(&name) {
            Some(new_name) => (new_name.clone(), origin),
            None => (name, origin),
        })
        .collect();
}
