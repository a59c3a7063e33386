//! Error types for plist canonicalization and reconciliation.
//!
//! Every error is fatal for the operation that produced it. Nothing in this
//! crate retries or downgrades an error to a warning; callers decide how to
//! present them.

use crate::profile::Issue;
use crate::reconcile::Mismatch;
use thiserror::Error;

/// Errors that can occur while processing configuration profile plists.
#[derive(Debug, Error)]
pub enum Error {
    /// Input is not well-formed plist XML
    #[error("failed to decode plist: {source}")]
    Decode {
        #[source]
        source: plist::Error,
    },

    /// Input parsed, but its root is not a dictionary
    #[error("expected a plist dictionary at the root, found {found}")]
    NotADictionary {
        /// Kind of the value found at the root
        found: &'static str,
    },

    /// Tree could not be serialized back to plist XML
    #[error("failed to encode plist: {source}")]
    Encode {
        #[source]
        source: plist::Error,
    },

    /// Encoded output was not valid UTF-8
    #[error("encoded plist is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Leaf type with no XML representation (keyed-archiver UIDs)
    #[error("unsupported plist value: {kind}")]
    UnsupportedValue {
        /// Name of the unsupported value kind
        kind: &'static str,
    },

    /// Identifiers still diverge after reconciliation
    #[error("{}", describe_mismatches(.mismatches))]
    StructuralMismatch {
        /// Every path whose identifiers differ between the two trees
        mismatches: Vec<Mismatch>,
    },

    /// Profile failed validation
    #[error("{}", describe_issues(.issues))]
    InvalidProfile {
        /// Error-severity issues found during validation
        issues: Vec<Issue>,
    },
}

impl Error {
    /// Whether this error came from malformed input rather than a
    /// structural problem with otherwise valid trees.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::NotADictionary { .. })
    }
}

fn describe_mismatches(mismatches: &[Mismatch]) -> String {
    let mut out = format!(
        "configuration profile identifier mismatch found ({} path{}):",
        mismatches.len(),
        if mismatches.len() == 1 { "" } else { "s" }
    );
    for mismatch in mismatches {
        out.push_str("\n  ");
        out.push_str(&mismatch.to_string());
    }
    out
}

fn describe_issues(issues: &[Issue]) -> String {
    let mut out = String::from("invalid configuration profile:");
    for issue in issues {
        out.push_str("\n  ");
        out.push_str(&issue.to_string());
    }
    out
}

/// Result type for plistkit operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_mismatch_lists_every_path() {
        let err = Error::StructuralMismatch {
            mismatches: vec![
                Mismatch {
                    path: "Payload.PayloadUUID".into(),
                    trusted: "A".into(),
                    candidate: "B".into(),
                },
                Mismatch {
                    path: "Payload.PayloadContent[0].PayloadIdentifier".into(),
                    trusted: "com.example.a".into(),
                    candidate: "com.example.b".into(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("2 paths"));
        assert!(msg.contains("Payload.PayloadUUID (server: A, request: B)"));
        assert!(msg.contains("Payload.PayloadContent[0].PayloadIdentifier"));
    }

    #[test]
    fn test_unsupported_value_is_not_decode() {
        let err = Error::UnsupportedValue { kind: "uid" };
        assert!(!err.is_decode());
        assert_eq!(err.to_string(), "unsupported plist value: uid");
    }
}
