//! Pluggable conflict-resolution policy.
//!
//! The engine consults a [`ConflictResolutionStrategy`] for every component
//! name collision. One concrete implementation ships with the crate; callers
//! inject alternates through the builder instead of subclassing anything.

use std::fmt;

/// How a name collision between the merged document and an incoming source
/// is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// The definitions are interchangeable: keep the existing entry, drop the
    /// incoming copy, and let incoming references resolve to the survivor.
    KeepExisting,
    /// Rename the incoming component; the existing entry keeps its name.
    RenameIncoming,
    /// Rename the existing entry; the incoming component takes over the slot.
    RenameExisting,
    /// Rename both components.
    RenameBoth,
}

/// One component-name collision, as presented to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct NameConflict<'a> {
    /// The colliding name.
    pub name: &'a str,
    /// Whether the two definitions are equivalent: structural equality for
    /// schemas, semantic equality for security schemes.
    pub equivalent: bool,
    /// Api that introduced the existing entry.
    pub existing_api: &'a str,
    /// Virtual prefix of the source that introduced the existing entry.
    pub existing_prefix: Option<&'a str>,
    /// Api of the incoming source.
    pub incoming_api: &'a str,
    /// Virtual prefix of the incoming source.
    pub incoming_prefix: Option<&'a str>,
}

/// Decides how component name collisions are resolved.
///
/// Implementations must be deterministic: the same conflict always yields the
/// same action, or re-running a merge would produce a different document.
pub trait ConflictResolutionStrategy: fmt::Debug + Send + Sync {
    /// Picks the action for one collision.
    fn resolve(&self, conflict: &NameConflict<'_>) -> ConflictAction;
}

/// Default policy: deduplicate equivalent definitions, otherwise let virtual
/// prefixes decide who gets renamed.
///
/// - both sources declared a prefix → rename both;
/// - only the existing entry's source declared one → rename the existing
///   entry (it opted into namespacing) and hand the slot to the incoming
///   component;
/// - otherwise → rename the incoming component. An incoming component never
///   clobbers an un-prefixed existing name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixAwareResolution;

impl ConflictResolutionStrategy for PrefixAwareResolution {
    fn resolve(&self, conflict: &NameConflict<'_>) -> ConflictAction {
        if conflict.equivalent {
            return ConflictAction::KeepExisting;
        }
        match (
            conflict.existing_prefix.is_some(),
            conflict.incoming_prefix.is_some(),
        ) {
            (true, true) => ConflictAction::RenameBoth,
            (true, false) => ConflictAction::RenameExisting,
            _ => ConflictAction::RenameIncoming,
        }
    }
}
