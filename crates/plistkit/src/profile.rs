//! Typed view over a configuration profile plist.
//!
//! The view is read-only: canonicalization and reconciliation always work on
//! the raw [`Dictionary`], so keys this view doesn't know about are never
//! lost. Unknown root keys land in `extra`, type-specific payload keys in
//! `settings`.

use crate::codec;
use crate::error::{Error, Result};
use crate::value::{Dictionary, PlistValue, dict_get_str};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const PAYLOAD_CONTENT: &str = "PayloadContent";
pub const PAYLOAD_DESCRIPTION: &str = "PayloadDescription";
pub const PAYLOAD_DISPLAY_NAME: &str = "PayloadDisplayName";
pub const PAYLOAD_ENABLED: &str = "PayloadEnabled";
pub const PAYLOAD_IDENTIFIER: &str = "PayloadIdentifier";
pub const PAYLOAD_ORGANIZATION: &str = "PayloadOrganization";
pub const PAYLOAD_REMOVAL_DISALLOWED: &str = "PayloadRemovalDisallowed";
pub const PAYLOAD_SCOPE: &str = "PayloadScope";
pub const PAYLOAD_TYPE: &str = "PayloadType";
pub const PAYLOAD_UUID: &str = "PayloadUUID";
pub const PAYLOAD_VERSION: &str = "PayloadVersion";

/// `PayloadType` of every profile root.
pub const CONFIGURATION_TYPE: &str = "Configuration";

const ROOT: &str = "Payload";

const HEADER_KEYS: [&str; 10] = [
    PAYLOAD_DESCRIPTION,
    PAYLOAD_DISPLAY_NAME,
    PAYLOAD_ENABLED,
    PAYLOAD_IDENTIFIER,
    PAYLOAD_ORGANIZATION,
    PAYLOAD_REMOVAL_DISALLOWED,
    PAYLOAD_SCOPE,
    PAYLOAD_TYPE,
    PAYLOAD_UUID,
    PAYLOAD_VERSION,
];

/// Where a profile is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadScope {
    System,
    User,
    Computer,
}

impl PayloadScope {
    pub const ALL: [Self; 3] = [Self::System, Self::User, Self::Computer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Computer => "Computer",
        }
    }
}

impl fmt::Display for PayloadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payload scope '{s}' (expected System, User or Computer)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl Issue {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result of [`ConfigurationProfile::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Fail with `InvalidProfile` if there are errors, otherwise hand back
    /// the warnings.
    pub fn into_result(self) -> Result<Vec<Issue>> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(Error::InvalidProfile { issues: errors })
        }
    }
}

/// One element of `PayloadContent`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub display_name: Option<String>,
    pub identifier: Option<String>,
    pub uuid: Option<String>,
    pub payload_type: Option<String>,
    pub version: Option<i128>,
    /// Type-specific keys
    pub settings: Dictionary,
}

impl Payload {
    pub fn from_dict(dict: &Dictionary) -> Self {
        let mut settings = dict.clone();
        let mut take_str = |key: &str| {
            settings
                .shift_remove(key)
                .and_then(|v| v.as_str().map(str::to_string))
        };
        let display_name = take_str(PAYLOAD_DISPLAY_NAME);
        let identifier = take_str(PAYLOAD_IDENTIFIER);
        let uuid = take_str(PAYLOAD_UUID);
        let payload_type = take_str(PAYLOAD_TYPE);
        let version = settings
            .shift_remove(PAYLOAD_VERSION)
            .and_then(|v| v.as_integer());

        Self {
            display_name,
            identifier,
            uuid,
            payload_type,
            version,
            settings,
        }
    }
}

/// Typed view over a profile root dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationProfile {
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub identifier: Option<String>,
    pub organization: Option<String>,
    pub removal_disallowed: Option<bool>,
    /// Raw scope string; see [`ConfigurationProfile::scope`]
    pub scope: Option<String>,
    pub payload_type: Option<String>,
    pub uuid: Option<String>,
    pub version: Option<i128>,
    /// `None` when `PayloadContent` is absent or not an array
    pub content: Option<Vec<Payload>>,
    /// Indexes of `PayloadContent` entries that aren't dictionaries
    pub malformed_entries: Vec<usize>,
    pub extra: Dictionary,
}

impl ConfigurationProfile {
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(Self::from_dict(&codec::decode_dict(xml)?))
    }

    pub fn from_dict(dict: &Dictionary) -> Self {
        let str_of = |key: &str| dict_get_str(dict, key).map(str::to_string);
        let bool_of = |key: &str| dict.get(key).and_then(PlistValue::as_bool);

        let mut content = None;
        let mut malformed_entries = Vec::new();
        if let Some(items) = dict.get(PAYLOAD_CONTENT).and_then(PlistValue::as_array) {
            let mut payloads = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match item.as_dict() {
                    Some(payload) => payloads.push(Payload::from_dict(payload)),
                    None => malformed_entries.push(index),
                }
            }
            content = Some(payloads);
        }

        let extra = dict
            .iter()
            .filter(|(key, _)| !HEADER_KEYS.contains(&key.as_str()) && key.as_str() != PAYLOAD_CONTENT)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            description: str_of(PAYLOAD_DESCRIPTION),
            display_name: str_of(PAYLOAD_DISPLAY_NAME),
            enabled: bool_of(PAYLOAD_ENABLED),
            identifier: str_of(PAYLOAD_IDENTIFIER),
            organization: str_of(PAYLOAD_ORGANIZATION),
            removal_disallowed: bool_of(PAYLOAD_REMOVAL_DISALLOWED),
            scope: str_of(PAYLOAD_SCOPE),
            payload_type: str_of(PAYLOAD_TYPE),
            uuid: str_of(PAYLOAD_UUID),
            version: dict.get(PAYLOAD_VERSION).and_then(PlistValue::as_integer),
            content,
            malformed_entries,
            extra,
        }
    }

    /// Parsed `PayloadScope`, if present and recognized.
    pub fn scope(&self) -> Option<PayloadScope> {
        self.scope.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn payloads(&self) -> &[Payload] {
        self.content.as_deref().unwrap_or_default()
    }

    /// Check structure and required keys.
    ///
    /// A root whose identifier differs from its UUID is only a warning here:
    /// locally authored payloads get both reassigned on first upload. Use
    /// [`Self::check_root_identity`] on payloads that came back from a store.
    pub fn validate(&self) -> ValidationReport {
        let mut issues = Vec::new();
        let root = |key: &str| format!("{ROOT}.{key}");

        let required: [(&str, bool, &str); 10] = [
            (PAYLOAD_DESCRIPTION, self.description.is_some(), "string"),
            (PAYLOAD_DISPLAY_NAME, self.display_name.is_some(), "string"),
            (PAYLOAD_ENABLED, self.enabled.is_some(), "boolean"),
            (PAYLOAD_IDENTIFIER, self.identifier.is_some(), "string"),
            (PAYLOAD_ORGANIZATION, self.organization.is_some(), "string"),
            (PAYLOAD_REMOVAL_DISALLOWED, self.removal_disallowed.is_some(), "boolean"),
            (PAYLOAD_SCOPE, self.scope.is_some(), "string"),
            (PAYLOAD_TYPE, self.payload_type.is_some(), "string"),
            (PAYLOAD_UUID, self.uuid.is_some(), "string"),
            (PAYLOAD_VERSION, self.version.is_some(), "integer"),
        ];
        for (key, present, kind) in required {
            if !present {
                issues.push(Issue::error(root(key), format!("missing or not a {kind}")));
            }
        }

        if let Some(payload_type) = self.payload_type.as_deref()
            && payload_type != CONFIGURATION_TYPE
        {
            issues.push(Issue::error(
                root(PAYLOAD_TYPE),
                format!("expected '{CONFIGURATION_TYPE}', found '{payload_type}'"),
            ));
        }

        if let Some(scope) = self.scope.as_deref()
            && let Err(message) = scope.parse::<PayloadScope>()
        {
            issues.push(Issue::error(root(PAYLOAD_SCOPE), message));
        }

        if let (Some(identifier), Some(uuid)) = (&self.identifier, &self.uuid)
            && identifier != uuid
        {
            issues.push(Issue::warning(
                root(PAYLOAD_IDENTIFIER),
                format!("'{identifier}' differs from PayloadUUID '{uuid}' and will be reassigned"),
            ));
        }

        match &self.content {
            None => issues.push(Issue::error(root(PAYLOAD_CONTENT), "missing or not an array")),
            Some(payloads) => {
                for index in &self.malformed_entries {
                    issues.push(Issue::error(
                        format!("{ROOT}.{PAYLOAD_CONTENT}[{index}]"),
                        "not a dictionary",
                    ));
                }
                self.validate_payloads(payloads, &mut issues);
            }
        }

        ValidationReport { issues }
    }

    fn validate_payloads(&self, payloads: &[Payload], issues: &mut Vec<Issue>) {
        // Indexes in the raw array skip over malformed entries.
        let raw_indexes = (0..).filter(|i| !self.malformed_entries.contains(i));
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (payload, index) in payloads.iter().zip(raw_indexes) {
            let path = |key: &str| format!("{ROOT}.{PAYLOAD_CONTENT}[{index}].{key}");

            for (key, present) in [
                (PAYLOAD_IDENTIFIER, payload.identifier.is_some()),
                (PAYLOAD_UUID, payload.uuid.is_some()),
                (PAYLOAD_TYPE, payload.payload_type.is_some()),
            ] {
                if !present {
                    issues.push(Issue::error(path(key), "missing or not a string"));
                }
            }

            match payload.display_name.as_deref() {
                None => issues.push(Issue::warning(
                    path(PAYLOAD_DISPLAY_NAME),
                    "missing; identifiers of this payload cannot be reconciled",
                )),
                Some(name) => {
                    if let Some(first) = seen.insert(name, index) {
                        issues.push(Issue::warning(
                            path(PAYLOAD_DISPLAY_NAME),
                            format!("'{name}' is also used by PayloadContent[{first}]; only the first is reconciled"),
                        ));
                        seen.insert(name, first);
                    }
                }
            }
        }
    }

    /// Root identity of a store-assigned payload: `PayloadIdentifier` must
    /// equal `PayloadUUID`.
    pub fn check_root_identity(&self) -> Result<()> {
        match (&self.identifier, &self.uuid) {
            (Some(identifier), Some(uuid)) if identifier == uuid => Ok(()),
            (identifier, uuid) => Err(Error::InvalidProfile {
                issues: vec![Issue::error(
                    format!("{ROOT}.{PAYLOAD_IDENTIFIER}"),
                    format!(
                        "must equal PayloadUUID (identifier: {}, uuid: {})",
                        identifier.as_deref().unwrap_or("<none>"),
                        uuid.as_deref().unwrap_or("<none>")
                    ),
                )],
            }),
        }
    }

    /// The level a profile is deployed at must match its declared scope.
    pub fn check_scope(&self, level: PayloadScope) -> Result<()> {
        match self.scope() {
            Some(scope) if scope == level => Ok(()),
            declared => Err(Error::InvalidProfile {
                issues: vec![Issue::error(
                    format!("{ROOT}.{PAYLOAD_SCOPE}"),
                    format!(
                        "declared scope {} does not match deployment level {level}",
                        declared.map_or("<none>", |s| s.as_str())
                    ),
                )],
            }),
        }
    }
}
