//! Canonicalization and identifier reconciliation for configuration profile
//! plists.
//!
//! A management server reformats profile payloads on every round trip: keys
//! are reordered, base64 is re-wrapped, tag spacing changes and the root
//! identifiers are reassigned. This crate provides the two operations a
//! declarative client needs to live with that:
//!
//! - [`canonicalize`]: a deterministic normal form, so that payloads differing
//!   only in serialization compare equal ([`oracle`]).
//! - [`reconcile_identifiers`]: copy server-assigned `PayloadUUID` and
//!   `PayloadIdentifier` values into a desired payload before it is sent,
//!   reporting any identifier the join couldn't line up.
//!
//! # Example
//!
//! ```
//! let a = r#"<plist version="1.0"><dict><key>b</key><true /><key>a</key><string>x</string></dict></plist>"#;
//! let b = r#"<plist version="1.0"><dict><key>a</key><string>x</string><key>b</key><true/></dict></plist>"#;
//!
//! let fields = plistkit::StripFields::none();
//! assert!(plistkit::equal_under_canonicalization(a, b, &fields));
//! ```

pub mod canonical;
pub mod codec;
pub mod error;
pub mod oracle;
pub mod profile;
pub mod reconcile;
pub mod value;

pub use canonical::{Canonicalizer, StripFields};
pub use codec::Indent;
pub use error::{Error, Result};
pub use oracle::{ContentHash, content_hash, equal_under_canonicalization};
pub use profile::{ConfigurationProfile, Issue, PayloadScope, Severity, ValidationReport};
pub use reconcile::{
    DisplayNameJoiner, DisplayNameTypeJoiner, IdentifierJoiner, JoinKey, Mismatch, Reconciler,
    Reconciliation,
};
pub use value::{Dictionary, PlistValue};

/// Canonicalize plist XML, stripping `fields` from every dictionary.
pub fn canonicalize<S: AsRef<str>>(xml: &str, fields: &[S]) -> Result<String> {
    Canonicalizer::new(StripFields::new(fields)).canonicalize_str(xml)
}

/// Inject identifiers from `trusted_xml` into `candidate_xml` using
/// display-name joins.
///
/// Mismatches are returned, not raised; call
/// [`Reconciliation::into_verified`] to turn them into an error.
pub fn reconcile_identifiers(trusted_xml: &str, candidate_xml: &str) -> Result<Reconciliation> {
    Reconciler::default().reconcile(trusted_xml, candidate_xml)
}
