//! C3: classifies storage errors as retryable (transient) vs permanent.

use crate::error::{StorageError, StorageErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQLSTATE classes (first two characters) treated as transient:
/// connection exception, transaction rollback, insufficient resources,
/// operator intervention.
const TRANSIENT_SQLSTATE_CLASSES: [&str; 4] = ["08", "40", "53", "57"];

static TRANSIENT_MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)connection (refused|reset|closed|timed out)|pool exhausted|deadlock detected|serialization failure|server (shutdown|restart)|out of (memory|disk)|try again|temporarily unavailable",
    )
    .expect("transient message regex is valid")
});

/// Returns true if `err`, or any error in its source chain, matches one
/// of the transient conditions in §4.3: a native transient/timeout
/// classification, a transient SQLSTATE class, or the transient message
/// regex. Explicit-permanent SQLSTATE classes (`23`, `42`) never match;
/// they simply fall through without short-circuiting the rest of the
/// chain.
pub fn is_transient(err: &StorageError) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if matches!(
            e.kind,
            StorageErrorKind::TransientConnection | StorageErrorKind::Timeout
        ) {
            return true;
        }

        if let Some(sqlstate) = &e.sqlstate {
            if sqlstate.len() >= 2 && TRANSIENT_SQLSTATE_CLASSES.contains(&&sqlstate[0..2]) {
                return true;
            }
        }

        if TRANSIENT_MESSAGE_RE.is_match(&e.message) {
            return true;
        }

        current = e.source.as_deref();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_sqlstate_classes_are_transient() {
        for sqlstate in ["08000", "40P01", "53300", "57P01"] {
            let err = StorageError::new("deadlock detected").with_sqlstate(sqlstate);
            assert!(is_transient(&err), "{sqlstate} should be transient");
        }
    }

    #[test]
    fn permanent_sqlstate_classes_are_permanent() {
        for sqlstate in ["23505", "42P01"] {
            let err = StorageError::new("constraint violated").with_sqlstate(sqlstate);
            assert!(!is_transient(&err), "{sqlstate} should be permanent");
        }
    }

    #[test]
    fn transient_message_without_sqlstate() {
        let err = StorageError::new("connection reset by peer");
        assert!(is_transient(&err));
    }

    #[test]
    fn native_kind_overrides_message() {
        let err = StorageError::new("unrelated").with_kind(StorageErrorKind::Timeout);
        assert!(is_transient(&err));
    }

    #[test]
    fn walks_error_chain() {
        let inner = StorageError::new("deadlock detected").with_sqlstate("40P01");
        let outer = StorageError::new("wrapped").with_source(inner);
        assert!(is_transient(&outer));
    }

    #[test]
    fn chain_with_only_permanent_links_is_permanent() {
        let inner = StorageError::new("unique violation").with_sqlstate("23505");
        let outer = StorageError::new("wrapped").with_sqlstate("42P01");
        let outer = outer.with_source(inner);
        assert!(!is_transient(&outer));
    }
}
