//! Identifier reconciliation between a trusted (server) profile tree and a
//! candidate (desired) tree.
//!
//! The server assigns `PayloadUUID` and `PayloadIdentifier` values that the
//! local payload does not know about. Before an update is sent, those values
//! are copied from the trusted tree into the candidate, matching dictionaries
//! by join key, and the result is checked for residual divergence.

mod joiner;

pub use joiner::{DisplayNameJoiner, DisplayNameTypeJoiner, IdentifierJoiner, JoinKey};

use crate::codec::{self, Indent};
use crate::error::{Error, Result};
use crate::profile::{PAYLOAD_IDENTIFIER, PAYLOAD_UUID};
use crate::value::{Dictionary, PlistValue, dict_get_str};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// Root segment of every mismatch path.
pub const ROOT_PATH: &str = "Payload";

/// An identifier that differs between the two trees at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Dotted/indexed location, e.g. `Payload.PayloadContent[1].PayloadUUID`
    pub path: String,
    /// Value in the trusted tree
    pub trusted: String,
    /// Value in the candidate tree
    pub candidate: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (server: {}, request: {})",
            self.path, self.trusted, self.candidate
        )
    }
}

/// Join-keyed identifiers extracted from a trusted tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMaps {
    pub uuids: IndexMap<JoinKey, String>,
    pub identifiers: IndexMap<JoinKey, String>,
}

impl IdentifierMaps {
    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty() && self.identifiers.is_empty()
    }

    fn record(&mut self, key: &JoinKey, dict: &Dictionary) {
        for (field, map) in [
            (PAYLOAD_UUID, &mut self.uuids),
            (PAYLOAD_IDENTIFIER, &mut self.identifiers),
        ] {
            let Some(value) = dict_get_str(dict, field) else {
                continue;
            };
            if let Some(existing) = map.get(key) {
                warn!("duplicate join key {key} for {field}: keeping {existing}, ignoring {value}");
                continue;
            }
            map.insert(key.clone(), value.to_string());
        }
    }
}

/// Collect `PayloadUUID` and `PayloadIdentifier` values by join key.
///
/// Walks depth-first in document order; on duplicate keys the first
/// occurrence wins.
pub fn extract_joined_identifiers(tree: &Dictionary, joiner: &dyn IdentifierJoiner) -> IdentifierMaps {
    let mut maps = IdentifierMaps::default();
    extract_dict(tree, true, joiner, &mut maps);
    maps
}

fn extract_dict(dict: &Dictionary, is_root: bool, joiner: &dyn IdentifierJoiner, maps: &mut IdentifierMaps) {
    if let Some(key) = joiner.join_key(dict, is_root) {
        maps.record(&key, dict);
    }
    for child in dict.values() {
        extract_value(child, joiner, maps);
    }
}

fn extract_value(value: &PlistValue, joiner: &dyn IdentifierJoiner, maps: &mut IdentifierMaps) {
    match value {
        PlistValue::Dict(dict) => extract_dict(dict, false, joiner, maps),
        PlistValue::Array(items) => {
            for item in items {
                extract_value(item, joiner, maps);
            }
        }
        _ => {}
    }
}

/// Overwrite candidate identifiers with the trusted ones.
///
/// The root always receives the trusted root identifiers. A nested
/// dictionary is only updated for identifier keys it already carries, and
/// only when its join key exists in the maps; anything else keeps its local
/// values. Returns the number of values replaced.
pub fn inject(tree: &mut Dictionary, maps: &IdentifierMaps, joiner: &dyn IdentifierJoiner) -> usize {
    inject_dict(tree, true, maps, joiner)
}

fn inject_dict(
    dict: &mut Dictionary,
    is_root: bool,
    maps: &IdentifierMaps,
    joiner: &dyn IdentifierJoiner,
) -> usize {
    let mut replaced = 0;

    if let Some(key) = joiner.join_key(dict, is_root) {
        for (field, map) in [(PAYLOAD_UUID, &maps.uuids), (PAYLOAD_IDENTIFIER, &maps.identifiers)] {
            let Some(trusted) = map.get(&key) else {
                continue;
            };
            if !is_root && !dict.contains_key(field) {
                continue;
            }
            if dict_get_str(dict, field) != Some(trusted.as_str()) {
                debug!("injecting {field} for {key}");
                dict.insert(field.to_string(), trusted.clone().into());
                replaced += 1;
            }
        }
    }

    for child in dict.values_mut() {
        replaced += inject_value(child, maps, joiner);
    }
    replaced
}

fn inject_value(value: &mut PlistValue, maps: &IdentifierMaps, joiner: &dyn IdentifierJoiner) -> usize {
    match value {
        PlistValue::Dict(dict) => inject_dict(dict, false, maps, joiner),
        PlistValue::Array(items) => items
            .iter_mut()
            .map(|item| inject_value(item, maps, joiner))
            .sum(),
        _ => 0,
    }
}

/// Walk both trees in lock-step and report identifier values that differ.
///
/// Dictionaries are matched by key and arrays by index, bounded to the
/// shorter array.
pub fn validate_parity(trusted: &PlistValue, candidate: &PlistValue, path: &str) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    walk_parity(trusted, candidate, path, &mut mismatches);
    mismatches
}

fn walk_parity(trusted: &PlistValue, candidate: &PlistValue, path: &str, out: &mut Vec<Mismatch>) {
    match (trusted, candidate) {
        (PlistValue::Dict(left), PlistValue::Dict(right)) => walk_dict_parity(left, right, path, out),
        (PlistValue::Array(left), PlistValue::Array(right)) => {
            for (index, (a, b)) in left.iter().zip(right).enumerate() {
                walk_parity(a, b, &format!("{path}[{index}]"), out);
            }
        }
        _ => {}
    }
}

fn walk_dict_parity(left: &Dictionary, right: &Dictionary, path: &str, out: &mut Vec<Mismatch>) {
    for (key, left_value) in left {
        let Some(right_value) = right.get(key) else {
            continue;
        };
        let child = format!("{path}.{key}");
        let is_identifier = key == PAYLOAD_UUID || key == PAYLOAD_IDENTIFIER;
        match (left_value, right_value) {
            (PlistValue::String(a), PlistValue::String(b)) if is_identifier => {
                if a != b {
                    out.push(Mismatch {
                        path: child,
                        trusted: a.clone(),
                        candidate: b.clone(),
                    });
                }
            }
            _ => walk_parity(left_value, right_value, &child, out),
        }
    }
}

/// Outcome of reconciling a candidate payload against a trusted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Candidate payload with trusted identifiers injected, four-space indented
    pub resolved: String,
    pub mismatches: Vec<Mismatch>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// The resolved payload, or `StructuralMismatch` if any identifier still
    /// diverges.
    pub fn into_verified(self) -> Result<String> {
        if self.mismatches.is_empty() {
            Ok(self.resolved)
        } else {
            Err(Error::StructuralMismatch {
                mismatches: self.mismatches,
            })
        }
    }
}

/// Reconciles identifiers using a fixed join strategy.
pub struct Reconciler {
    joiner: Box<dyn IdentifierJoiner>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DisplayNameJoiner)
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("joiner", &self.joiner.name())
            .finish()
    }
}

impl Reconciler {
    pub fn new(joiner: impl IdentifierJoiner + 'static) -> Self {
        Self {
            joiner: Box::new(joiner),
        }
    }

    pub fn joiner(&self) -> &dyn IdentifierJoiner {
        self.joiner.as_ref()
    }

    /// Inject trusted identifiers into `candidate` and validate the result.
    pub fn reconcile_trees(&self, trusted: &Dictionary, mut candidate: Dictionary) -> (Dictionary, Vec<Mismatch>) {
        let maps = extract_joined_identifiers(trusted, self.joiner());
        let replaced = inject(&mut candidate, &maps, self.joiner());
        debug!(
            "joined {} uuid(s) and {} identifier(s) with {} joiner, replaced {replaced} value(s)",
            maps.uuids.len(),
            maps.identifiers.len(),
            self.joiner.name()
        );

        let mut mismatches = Vec::new();
        walk_dict_parity(trusted, &candidate, ROOT_PATH, &mut mismatches);
        (candidate, mismatches)
    }

    /// Reconcile plist XML payloads.
    pub fn reconcile(&self, trusted_xml: &str, candidate_xml: &str) -> Result<Reconciliation> {
        let trusted = codec::decode_dict(trusted_xml)?;
        let candidate = codec::decode_dict(candidate_xml)?;
        let (resolved, mismatches) = self.reconcile_trees(&trusted, candidate);
        for mismatch in &mismatches {
            debug!("identifier mismatch at {mismatch}");
        }
        Ok(Reconciliation {
            resolved: codec::encode_dict(&resolved, Indent::Spaces(4))?,
            mismatches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str, uuid: &str) -> PlistValue {
        let mut dict = Dictionary::new();
        dict.insert("PayloadDisplayName".into(), name.into());
        dict.insert(PAYLOAD_UUID.into(), uuid.into());
        dict.insert(PAYLOAD_IDENTIFIER.into(), format!("com.example.{uuid}").into());
        dict.insert("PayloadType".into(), "com.apple.wifi.managed".into());
        PlistValue::Dict(dict)
    }

    fn profile(root_uuid: &str, content: Vec<PlistValue>) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert(PAYLOAD_UUID.into(), root_uuid.into());
        dict.insert(PAYLOAD_IDENTIFIER.into(), root_uuid.into());
        dict.insert("PayloadContent".into(), content.into());
        dict
    }

    fn nested(tree: &Dictionary, index: usize) -> &Dictionary {
        tree.get("PayloadContent")
            .and_then(PlistValue::as_array)
            .and_then(|items| items.get(index))
            .and_then(PlistValue::as_dict)
            .unwrap()
    }

    #[test]
    fn test_trusted_identifiers_are_injected() {
        let trusted = profile("root-1", vec![payload("X", "nested-1")]);
        let candidate = profile("local-root", vec![payload("X", "local-nested")]);

        let (resolved, mismatches) = Reconciler::default().reconcile_trees(&trusted, candidate);

        assert_eq!(dict_get_str(&resolved, PAYLOAD_UUID), Some("root-1"));
        assert_eq!(dict_get_str(nested(&resolved, 0), PAYLOAD_UUID), Some("nested-1"));
        assert_eq!(
            dict_get_str(nested(&resolved, 0), PAYLOAD_IDENTIFIER),
            Some("com.example.nested-1")
        );
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_extra_candidate_payload_keeps_its_identifiers() {
        let trusted = profile("root-1", vec![payload("X", "nested-1")]);
        let candidate = profile(
            "local-root",
            vec![payload("X", "local-x"), payload("New", "local-new")],
        );

        let (resolved, mismatches) = Reconciler::default().reconcile_trees(&trusted, candidate);

        assert_eq!(dict_get_str(nested(&resolved, 0), PAYLOAD_UUID), Some("nested-1"));
        assert_eq!(dict_get_str(nested(&resolved, 1), PAYLOAD_UUID), Some("local-new"));
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_renamed_payload_is_reported() {
        let trusted = profile("root-1", vec![payload("X", "nested-1")]);
        let candidate = profile("local-root", vec![payload("Y", "local-y")]);

        let (resolved, mismatches) = Reconciler::default().reconcile_trees(&trusted, candidate);

        assert_eq!(dict_get_str(nested(&resolved, 0), PAYLOAD_UUID), Some("local-y"));
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].path, "Payload.PayloadContent[0].PayloadUUID");
        assert_eq!(mismatches[0].trusted, "nested-1");
        assert_eq!(mismatches[0].candidate, "local-y");
        assert_eq!(mismatches[1].path, "Payload.PayloadContent[0].PayloadIdentifier");
    }

    #[test]
    fn test_root_identifiers_are_always_set() {
        let trusted = profile("root-1", vec![]);
        let mut candidate = Dictionary::new();
        candidate.insert("PayloadContent".into(), PlistValue::Array(vec![]));

        let maps = extract_joined_identifiers(&trusted, &DisplayNameJoiner);
        assert_eq!(inject(&mut candidate, &maps, &DisplayNameJoiner), 2);
        assert_eq!(dict_get_str(&candidate, PAYLOAD_UUID), Some("root-1"));
        assert_eq!(dict_get_str(&candidate, PAYLOAD_IDENTIFIER), Some("root-1"));
    }

    #[test]
    fn test_nested_dict_without_identifier_key_is_not_extended() {
        let trusted = profile("root-1", vec![payload("X", "nested-1")]);
        let mut bare = Dictionary::new();
        bare.insert("PayloadDisplayName".into(), "X".into());
        let mut candidate = profile("root-1", vec![PlistValue::Dict(bare)]);

        let maps = extract_joined_identifiers(&trusted, &DisplayNameJoiner);
        inject(&mut candidate, &maps, &DisplayNameJoiner);
        assert!(!nested(&candidate, 0).contains_key(PAYLOAD_UUID));
    }

    #[test]
    fn test_duplicate_join_keys_keep_first() {
        let trusted = profile("root-1", vec![payload("X", "first"), payload("X", "second")]);
        let maps = extract_joined_identifiers(&trusted, &DisplayNameJoiner);
        assert_eq!(
            maps.uuids.get(&JoinKey::Name("X".into())).map(String::as_str),
            Some("first")
        );
        assert_eq!(maps.uuids.get(&JoinKey::Root).map(String::as_str), Some("root-1"));
    }

    #[test]
    fn test_type_joiner_separates_shared_names() {
        let mut vpn = payload("Network", "vpn-1");
        if let PlistValue::Dict(dict) = &mut vpn {
            dict.insert("PayloadType".into(), "com.apple.vpn.managed".into());
        }
        let trusted = profile("root-1", vec![payload("Network", "wifi-1"), vpn]);

        let name_only = extract_joined_identifiers(&trusted, &DisplayNameJoiner);
        let typed = extract_joined_identifiers(&trusted, &DisplayNameTypeJoiner);
        assert_eq!(name_only.uuids.len(), 2);
        assert_eq!(typed.uuids.len(), 3);
    }

    #[test]
    fn test_parity_compares_arrays_up_to_shorter_length() {
        let trusted = PlistValue::Dict(profile("r", vec![payload("A", "1"), payload("B", "2")]));
        let candidate = PlistValue::Dict(profile("r", vec![payload("A", "1")]));
        assert!(validate_parity(&trusted, &candidate, ROOT_PATH).is_empty());
    }

    #[test]
    fn test_reconcile_xml_and_verify() {
        let trusted = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>PayloadUUID</key><string>root-1</string>
	<key>PayloadIdentifier</key><string>root-1</string>
	<key>PayloadContent</key>
	<array>
		<dict>
			<key>PayloadDisplayName</key><string>X</string>
			<key>PayloadUUID</key><string>nested-1</string>
		</dict>
	</array>
</dict>
</plist>"#;
        let candidate = trusted
            .replace("root-1", "local-root")
            .replace("nested-1", "local-nested");

        let reconciliation = Reconciler::default().reconcile(trusted, &candidate).unwrap();
        assert!(reconciliation.is_consistent());
        let resolved = reconciliation.into_verified().unwrap();
        assert!(resolved.contains("<string>root-1</string>"));
        assert!(resolved.contains("<string>nested-1</string>"));
        assert!(!resolved.contains("local-"));
        assert!(resolved.contains("\n    <key>PayloadUUID</key>"));
    }

    #[test]
    fn test_unverified_reconciliation_is_an_error() {
        let reconciliation = Reconciliation {
            resolved: String::new(),
            mismatches: vec![Mismatch {
                path: "Payload.PayloadUUID".into(),
                trusted: "a".into(),
                candidate: "b".into(),
            }],
        };
        assert!(matches!(
            reconciliation.into_verified(),
            Err(Error::StructuralMismatch { mismatches }) if mismatches.len() == 1
        ));
    }

    #[test]
    fn test_reconcile_rejects_malformed_input() {
        let err = Reconciler::default().reconcile("<plist>", "<plist>").unwrap_err();
        assert!(err.is_decode());
    }
}
