//! Identifiers and content-addressing helpers shared across crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Timestamp type used throughout the engine.
pub type Timestamp = DateTime<Utc>;

/// Project identifier. Projects are human-assigned slugs, not
/// database-generated surrogate keys, so this wraps a plain `String`
/// rather than a UUID newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Computes the lowercase hex SHA-256 digest of `data`.
///
/// Used for keyword-extraction query hashes, the response-cache key, and
/// description-summarization cache keys — every `contentHash` in the
/// data model is one of these.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Sorts `a` and `b` lexicographically and joins them with `::`.
///
/// Used both for relation deduplication and for lock acquisition
/// ordering (§4.2): two writers touching the same pair always compute
/// the same key regardless of which side they started from.
pub fn normalize_pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}::{b}")
    } else {
        format!("{b}::{a}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_displays_as_inner_string() {
        let id = ProjectId::new("acme-corp");
        assert_eq!(id.to_string(), "acme-corp");
        assert_eq!(id.as_str(), "acme-corp");
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex(b"hello"), sha256_hex(b"hello"));
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }

    #[test]
    fn sha256_hex_matches_known_digest() {
        // echo -n "" | sha256sum
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn normalize_pair_key_is_order_independent() {
        assert_eq!(normalize_pair_key("a", "b"), normalize_pair_key("b", "a"));
        assert_eq!(normalize_pair_key("a", "b"), "a::b");
    }

    #[test]
    fn normalize_pair_key_handles_equal_ids() {
        assert_eq!(normalize_pair_key("x", "x"), "x::x");
    }

    mod prop_tests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_pair_key_round_trip(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
                prop_assert_eq!(normalize_pair_key(&a, &b), normalize_pair_key(&b, &a));
            }
        }
    }
}
