//! Content-equality oracle for diff suppression.
//!
//! Two payloads are "the same" when their canonical encodings hash to the
//! same BLAKE3 digest.

use crate::canonical::{Canonicalizer, StripFields};
use crate::error::Result;
use log::warn;
use std::fmt;

/// BLAKE3 digest of a canonical plist encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Hash already-canonical text.
    pub fn of_canonical(canonical: &str) -> Self {
        Self(blake3::hash(canonical.as_bytes()))
    }

    /// Full lowercase hex digest.
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// First 12 hex digits, for display.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Canonicalize `xml` and hash the result.
pub fn content_hash(xml: &str, fields: &StripFields) -> Result<ContentHash> {
    let canonical = Canonicalizer::new(fields.clone()).canonicalize_str(xml)?;
    Ok(ContentHash::of_canonical(&canonical))
}

/// Whether two payloads are equal once canonicalized with the same field set.
///
/// Never fails: a payload that cannot be decoded or re-encoded compares as
/// different, so a broken payload can never hide a pending change.
pub fn equal_under_canonicalization(a: &str, b: &str, fields: &StripFields) -> bool {
    let canonicalizer = Canonicalizer::new(fields.clone());
    let hash = |label: &str, xml: &str| match canonicalizer.canonicalize_str(xml) {
        Ok(canonical) => Some(ContentHash::of_canonical(&canonical)),
        Err(e) => {
            warn!("treating {label} payload as different: {e}");
            None
        }
    };

    match (hash("first", a), hash("second", b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(enabled: &str, blob: &str, nested_uuid: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>PayloadDisplayName</key>
    <string>Restrictions</string>
    <key>PayloadContent</key>
    <array>
        <dict>
            <key>PayloadUUID</key>
            <string>{nested_uuid}</string>
            <key>allowCamera</key>
            {enabled}
            <key>Certificate</key>
            <data>{blob}</data>
        </dict>
    </array>
</dict>
</plist>"#
        )
    }

    #[test]
    fn test_tag_spacing_and_wrap_width_are_equal() {
        let a = profile("<true />", "\n    AAECAwQFBgcICQoL\n    DA0ODxAREhMUFRYX\n    ", "A");
        let b = profile(
            "<true/>",
            "\n\tAAECAwQFBgcICQoLDA0O\n\tDxAREhMUFRYX\n\t",
            "A",
        );
        assert!(equal_under_canonicalization(&a, &b, &StripFields::none()));
    }

    #[test]
    fn test_stripped_nested_uuid_is_equal() {
        let a = profile("<true/>", "AAEC", "A");
        let b = profile("<true/>", "AAEC", "B");
        let fields = StripFields::new(["PayloadUUID"]);
        assert!(equal_under_canonicalization(&a, &b, &fields));
        assert!(!equal_under_canonicalization(&a, &b, &StripFields::none()));
    }

    #[test]
    fn test_real_change_is_different() {
        let a = profile("<true/>", "AAEC", "A");
        let b = profile("<false/>", "AAEC", "A");
        assert!(!equal_under_canonicalization(&a, &b, &StripFields::none()));
    }

    #[test]
    fn test_malformed_payload_is_different() {
        let a = profile("<true/>", "AAEC", "A");
        assert!(!equal_under_canonicalization(&a, "<plist><dict>", &StripFields::none()));
        assert!(!equal_under_canonicalization("not xml", "not xml", &StripFields::none()));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = profile("<true />", "AAEC", "A");
        let b = profile("<true/>", "AAEC", "A");
        let fields = StripFields::none();
        let left = content_hash(&a, &fields).unwrap();
        assert_eq!(left, content_hash(&b, &fields).unwrap());
        assert_eq!(left.to_hex().len(), 64);
        assert_eq!(left.short().len(), 12);
        assert!(left.to_string().starts_with(&left.short()));
    }
}
