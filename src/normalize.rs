//! Shared message normalization.
//!
//! The response cache and the raid detector both key on a fingerprint of the
//! message text. They MUST agree on what "the same message" means, so both
//! go through this one function.

/// Maximum fingerprint length in characters.
const FINGERPRINT_MAX_LEN: usize = 50;

/// Normalize message text into a fingerprint: lowercase, alphanumerics only,
/// truncated to a bounded length.
pub fn fingerprint(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .take(FINGERPRINT_MAX_LEN)
        .collect()
}
