//! Canonical form of plist trees.
//!
//! Two payloads that differ only in how a server happened to serialize them
//! (key order, base64 wrap width, tag spacing, one layer of entity escaping,
//! whitespace-only values) canonicalize to the same text. The pipeline runs
//! these stages in order, each over the whole tree:
//!
//! 1. strip volatile fields (case-insensitive key match)
//! 2. prune blank string entries from arrays
//! 3. unwrap base64 in string leaves and embedded `<data>` fragments
//! 4. collapse self-closing tag spacing inside string leaves
//! 5. unescape entities once
//! 6. collapse whitespace-only strings to empty
//! 7. sort dictionary keys and all-string arrays
//!
//! followed by tab-indented encoding and a per-line trailing whitespace trim.

mod text;

use crate::codec::{self, Indent};
use crate::error::Result;
use crate::value::PlistValue;
use log::{debug, trace};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// Set of dictionary keys removed before comparison.
///
/// Matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripFields {
    folded: BTreeSet<String>,
}

impl StripFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            folded: fields
                .into_iter()
                .map(|field| field.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Strip nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.folded.contains(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.folded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for StripFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for StripFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.folded.iter().map(String::as_str).collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// Runs the canonicalization pipeline with a fixed set of stripped fields.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    strip: StripFields,
}

impl Canonicalizer {
    pub fn new(strip: StripFields) -> Self {
        Self { strip }
    }

    pub fn strip_fields(&self) -> &StripFields {
        &self.strip
    }

    /// Transform a tree into its canonical tree. Pure and idempotent.
    pub fn canonicalize_value(&self, mut value: PlistValue) -> PlistValue {
        if !self.strip.is_empty() {
            strip_fields(&mut value, &self.strip, "");
        }
        prune_blank_entries(&mut value);
        for_each_string(&mut value, &mut normalize_blobs);
        for_each_string(&mut value, &mut |s| {
            if let Some(normalized) = changed(text::normalize_tag_spacing(s)) {
                *s = normalized;
            }
        });
        for_each_string(&mut value, &mut |s| {
            if let Some(unescaped) = changed(text::unescape_once(s)) {
                trace!("unescaped entities in {s:?}");
                *s = unescaped;
            }
        });
        for_each_string(&mut value, &mut |s| {
            if !s.is_empty() && s.trim().is_empty() {
                s.clear();
            }
        });
        sort_recursive(&mut value);
        value
    }

    /// Decode, canonicalize and re-encode plist XML.
    pub fn canonicalize_str(&self, xml: &str) -> Result<String> {
        let value = codec::decode(xml)?;
        let canonical = self.canonicalize_value(value);
        let encoded = codec::encode(&canonical, Indent::Tab)?;
        Ok(codec::trim_trailing_whitespace(&encoded))
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn strip_fields(value: &mut PlistValue, fields: &StripFields, path: &str) {
    match value {
        PlistValue::Dict(dict) => {
            dict.retain(|key, _| {
                let strip = fields.contains(key);
                if strip {
                    debug!("stripping {}", child_path(path, key));
                }
                !strip
            });
            for (key, child) in dict.iter_mut() {
                strip_fields(child, fields, &child_path(path, key));
            }
        }
        PlistValue::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                strip_fields(item, fields, &format!("{path}[{index}]"));
            }
        }
        _ => {}
    }
}

fn prune_blank_entries(value: &mut PlistValue) {
    match value {
        PlistValue::Dict(dict) => dict.values_mut().for_each(prune_blank_entries),
        PlistValue::Array(items) => {
            items.retain(|item| !matches!(item, PlistValue::String(s) if s.trim().is_empty()));
            items.iter_mut().for_each(prune_blank_entries);
        }
        _ => {}
    }
}

fn normalize_blobs(s: &mut String) {
    if let Some(unwrapped) = text::unwrap_base64(s) {
        trace!("unwrapped {} byte base64 string", s.len());
        *s = unwrapped;
    } else if let Some(compacted) = changed(text::compact_data_fragments(s)) {
        *s = compacted;
    }
}

fn changed(text: Cow<'_, str>) -> Option<String> {
    match text {
        Cow::Owned(owned) => Some(owned),
        Cow::Borrowed(_) => None,
    }
}

/// Visit every string leaf. Dictionary keys are not visited.
fn for_each_string(value: &mut PlistValue, f: &mut impl FnMut(&mut String)) {
    match value {
        PlistValue::Dict(dict) => {
            for child in dict.values_mut() {
                for_each_string(child, f);
            }
        }
        PlistValue::Array(items) => {
            for item in items {
                for_each_string(item, f);
            }
        }
        PlistValue::String(s) => f(s),
        PlistValue::Integer(_)
        | PlistValue::Real(_)
        | PlistValue::Boolean(_)
        | PlistValue::Data(_)
        | PlistValue::Date(_) => {}
    }
}

fn sort_recursive(value: &mut PlistValue) {
    match value {
        PlistValue::Dict(dict) => {
            dict.sort_keys();
            dict.values_mut().for_each(sort_recursive);
        }
        PlistValue::Array(items) => {
            if items.iter().all(|item| matches!(item, PlistValue::String(_))) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            } else {
                // Element order is meaningful here; only containers are descended.
                items
                    .iter_mut()
                    .filter(|item| item.is_container())
                    .for_each(sort_recursive);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dictionary;

    const PROFILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>PayloadUUID</key>
    <string>5A1B-ROOT</string>
    <key>PayloadDisplayName</key>
    <string>Corporate Wi-Fi</string>
    <key>PayloadContent</key>
    <array>
        <dict>
            <key>PayloadType</key>
            <string>com.apple.wifi.managed</string>
            <key>PayloadDisplayName</key>
            <string>Wi-Fi</string>
            <key>AutoJoin</key>
            <true/>
            <key>SSID_STR</key>
            <string>R&amp;amp;D Network</string>
        </dict>
        <dict>
            <key>PayloadType</key>
            <string>com.apple.security.root</string>
            <key>PayloadDisplayName</key>
            <string>Root CA</string>
            <key>PayloadContent</key>
            <data>
            SGVsbG8s
            IFdvcmxk
            </data>
        </dict>
    </array>
    <key>Domains</key>
    <array>
        <string>b.example.com</string>
        <string>   </string>
        <string>a.example.com</string>
    </array>
</dict>
</plist>"#;

    fn canonicalizer(fields: &[&str]) -> Canonicalizer {
        Canonicalizer::new(fields.iter().collect())
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let c = canonicalizer(&["PayloadUUID"]);
        let once = c.canonicalize_str(PROFILE).unwrap();
        let twice = c.canonicalize_str(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_indentation_does_not_matter() {
        let c = canonicalizer(&[]);
        let flattened: String = PROFILE
            .lines()
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            c.canonicalize_str(PROFILE).unwrap(),
            c.canonicalize_str(&flattened).unwrap()
        );
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let c = canonicalizer(&[]);
        let mut forward = Dictionary::new();
        forward.insert("b".into(), "2".into());
        forward.insert("a".into(), "1".into());
        let mut reverse = Dictionary::new();
        reverse.insert("a".into(), "1".into());
        reverse.insert("b".into(), "2".into());

        let encode = |dict: Dictionary| {
            codec::encode(&c.canonicalize_value(dict.into()), Indent::Tab).unwrap()
        };
        assert_eq!(encode(forward), encode(reverse));
    }

    #[test]
    fn test_payload_order_matters() {
        let payload = |name: &str| {
            let mut dict = Dictionary::new();
            dict.insert("PayloadDisplayName".into(), name.into());
            PlistValue::Dict(dict)
        };
        let profile = |content: Vec<PlistValue>| {
            let mut dict = Dictionary::new();
            dict.insert("PayloadContent".into(), content.into());
            PlistValue::Dict(dict)
        };

        let c = canonicalizer(&[]);
        let forward = c.canonicalize_value(profile(vec![payload("Wi-Fi"), payload("VPN")]));
        let reversed = c.canonicalize_value(profile(vec![payload("VPN"), payload("Wi-Fi")]));
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_strips_fields_at_every_depth_case_insensitively() {
        let c = canonicalizer(&["payloaddisplayname", "PayloadUUID"]);
        let out = c.canonicalize_str(PROFILE).unwrap();
        assert!(!out.contains("PayloadDisplayName"));
        assert!(!out.contains("PayloadUUID"));
        assert!(out.contains("<key>PayloadType</key>"));
    }

    #[test]
    fn test_stripping_keeps_emptied_containers() {
        let mut inner = Dictionary::new();
        inner.insert("PayloadUUID".into(), "x".into());
        let mut root = Dictionary::new();
        root.insert("Inner".into(), inner.into());

        let out = canonicalizer(&["PayloadUUID"]).canonicalize_value(root.into());
        let inner = out.as_dict().and_then(|d| d.get("Inner")).unwrap();
        assert_eq!(inner, &PlistValue::Dict(Dictionary::new()));
    }

    #[test]
    fn test_double_escaped_leaf_survives() {
        let out = canonicalizer(&[]).canonicalize_value("&amp;amp;data".into());
        assert_eq!(out, PlistValue::String("&amp;amp;data".into()));
    }

    #[test]
    fn test_single_escaped_leaf_is_unescaped() {
        let out = canonicalizer(&[]).canonicalize_str(PROFILE).unwrap();
        assert!(out.contains("<string>R&amp;D Network</string>"));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_mixed_array_is_untouched() {
        let mixed = PlistValue::Array(vec![
            PlistValue::Integer(1),
            "b".into(),
            PlistValue::Real(3.14),
            "a".into(),
        ]);
        let out = canonicalizer(&[]).canonicalize_value(mixed.clone());
        assert_eq!(out, mixed);
    }

    #[test]
    fn test_string_arrays_are_sorted_and_blank_entries_dropped() {
        let out = canonicalizer(&[]).canonicalize_str(PROFILE).unwrap();
        let a = out.find("a.example.com").unwrap();
        let b = out.find("b.example.com").unwrap();
        assert!(a < b);
        assert!(!out.contains("<string>   </string>"));
    }

    #[test]
    fn test_whitespace_only_string_collapses() {
        let mut dict = Dictionary::new();
        dict.insert("PayloadDescription".into(), "\n\t \n".into());
        let out = canonicalizer(&[]).canonicalize_value(dict.into());
        assert_eq!(
            out.as_dict().and_then(|d| d.get("PayloadDescription")),
            Some(&PlistValue::String(String::new()))
        );
    }

    #[test]
    fn test_embedded_fragments_are_normalized() {
        let fragment = "<dict><key>On</key><true   /><key>Blob</key><data>\n  SGVs\n  bG8=\n</data></dict>";
        let out = canonicalizer(&[]).canonicalize_value(fragment.into());
        assert_eq!(
            out.as_str(),
            Some("<dict><key>On</key><true/><key>Blob</key><data>SGVsbG8=</data></dict>")
        );
    }

    #[test]
    fn test_output_has_no_trailing_whitespace() {
        let out = canonicalizer(&[]).canonicalize_str(PROFILE).unwrap();
        assert!(out.lines().all(|line| !line.ends_with([' ', '\t'])));
    }

    #[test]
    fn test_strip_fields_display() {
        let fields: StripFields = ["PayloadUUID", "PayloadEnabled"].into_iter().collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.to_string(), "payloadenabled, payloaduuid");
    }
}
