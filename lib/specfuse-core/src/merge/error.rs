use super::loader::LoadError;

/// Errors that abort a merge.
///
/// Only two runtime conditions are fatal, and both are opt-in strictness:
/// an unreachable source under `require_all_sources`, and a duplicate path
/// key with `skip_duplicate_paths` turned off. Name collisions are never
/// fatal: the coordinators always resolve them deterministically.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub enum MergeError {
    /// A source could not be loaded while `require_all_sources` is set.
    #[display("source '{api}' at {location} could not be loaded: {source}")]
    SourceUnavailable {
        /// Configured api name of the failing source.
        api: String,
        /// URL or file path of the failing source.
        location: String,
        /// The underlying load failure.
        source: LoadError,
    },

    /// A merged path key appeared twice while `skip_duplicate_paths` is off.
    #[display("path '{path}' from source '{api}' already exists in the merged document")]
    DuplicatePath {
        /// The colliding path key.
        path: String,
        /// Source that produced the collision.
        api: String,
    },

    /// The conflict naming pattern is missing a required placeholder.
    #[display("naming pattern '{pattern}' must contain both {{prefix}} and {{name}}")]
    InvalidNamingPattern {
        /// The rejected pattern.
        pattern: String,
    },

    /// An exclusion pattern cannot be compiled.
    #[display("invalid exclusion pattern '{pattern}': {reason}")]
    InvalidExclusionPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_colliding_path_and_api() {
        let error = MergeError::DuplicatePath {
            path: "/api/widgets".to_string(),
            api: "widgets-v2".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/api/widgets"));
        assert!(message.contains("widgets-v2"));
    }

    #[test]
    fn should_spell_out_required_placeholders() {
        let error = MergeError::InvalidNamingPattern {
            pattern: "{prefix}".to_string(),
        };
        assert!(error.to_string().contains("{name}"));
    }
}
