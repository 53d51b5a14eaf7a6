//! Version ordering policy
//!
//! Versions are compared as plain strings, code point by code point. This is
//! not Alpine's version grammar: `"9"` sorts above `"10"` and `"1.2_rc1"`
//! above `"1.2"`. Everything that decides whether a bump happens goes through
//! [`is_newer`], so the policy lives in one place.

/// Whether `candidate` orders strictly after `current`
pub fn is_newer(candidate: &str, current: &str) -> bool {
    candidate > current
}
