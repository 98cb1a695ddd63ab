//! Rename-pattern expansion and prefix sanitization.

use cruet::*;

use crate::config::{NAME_PLACEHOLDER, PREFIX_PLACEHOLDER};
use crate::merge::error::MergeError;

/// Turns a virtual prefix or api name into a Pascal-cased token.
///
/// Non-alphanumeric characters act as word boundaries: `/inventory` becomes
/// `Inventory`, `pet-store api` becomes `PetStoreApi`. Inputs with no usable
/// characters fall back to `Api` so a token is always produced.
pub(crate) fn prefix_token(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                ' '
            }
        })
        .collect();
    let token = spaced.trim().to_pascal_case();
    if token.is_empty() {
        "Api".to_string()
    } else {
        token
    }
}

/// Expands a naming pattern with the given prefix token and component name.
pub(crate) fn apply_pattern(pattern: &str, prefix: &str, name: &str) -> String {
    pattern
        .replace(PREFIX_PLACEHOLDER, prefix)
        .replace(NAME_PLACEHOLDER, name)
}

/// Checks that a naming pattern carries both required placeholders.
pub(crate) fn validate_pattern(pattern: &str) -> Result<(), MergeError> {
    if pattern.contains(PREFIX_PLACEHOLDER) && pattern.contains(NAME_PLACEHOLDER) {
        Ok(())
    } else {
        Err(MergeError::InvalidNamingPattern {
            pattern: pattern.to_string(),
        })
    }
}

/// Produces a unique rename for `name`.
///
/// The scoped candidate is tried first; on collision the fully-qualified
/// token takes over, and numeric suffixes settle whatever is left. The last
/// step cannot fail to terminate: the taken set is finite.
pub(crate) fn unique_rename(
    pattern: &str,
    scope_token: &str,
    qualified_token: &str,
    name: &str,
    is_taken: &dyn Fn(&str) -> bool,
) -> String {
    let candidate = apply_pattern(pattern, scope_token, name);
    if !is_taken(&candidate) {
        return candidate;
    }
    let qualified = apply_pattern(pattern, qualified_token, name);
    disambiguate(qualified, is_taken)
}

fn disambiguate(candidate: String, is_taken: &dyn Fn(&str) -> bool) -> String {
    if !is_taken(&candidate) {
        return candidate;
    }
    let mut counter = 1usize;
    loop {
        let attempt = format!("{candidate}_{counter}");
        if !is_taken(&attempt) {
            return attempt;
        }
        counter += 1;
    }
}
