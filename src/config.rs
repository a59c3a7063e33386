//! profilesync configuration
//!
//! Loaded once at startup from `~/.config/profilesync/config.toml` (or
//! `--config`). The per-kind comparison settings are resolved into an
//! immutable [`KindSettings`] shared with every resource.

use anyhow::{Context, Result, bail};
use plistkit::profile::{
    PAYLOAD_DESCRIPTION, PAYLOAD_DISPLAY_NAME, PAYLOAD_ENABLED, PAYLOAD_IDENTIFIER,
    PAYLOAD_ORGANIZATION, PAYLOAD_REMOVAL_DISALLOWED, PAYLOAD_UUID, PAYLOAD_VERSION,
};
use plistkit::{PayloadScope, StripFields};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("profilesync"))
}

/// Default location of the profile store
pub fn default_store_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("share").join("profilesync").join("store"))
}

// ============================================================================
// Profile Kinds
// ============================================================================

/// The two profile families a management server keeps apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Macos,
    MobileDevice,
}

impl ProfileKind {
    pub const ALL: [Self; 2] = [Self::Macos, Self::MobileDevice];

    /// Directory and config key name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::MobileDevice => "mobile_device",
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Macos => "macos_configuration_profile",
            Self::MobileDevice => "mobile_device_configuration_profile",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Macos => "macOS",
            Self::MobileDevice => "mobile device",
        }
    }

    /// Fields the server rewrites on every round trip
    pub fn builtin_strip_fields(&self) -> Vec<&'static str> {
        match self {
            Self::Macos => vec![
                PAYLOAD_UUID,
                PAYLOAD_IDENTIFIER,
                PAYLOAD_ORGANIZATION,
                PAYLOAD_DISPLAY_NAME,
                PAYLOAD_DESCRIPTION,
                PAYLOAD_ENABLED,
                PAYLOAD_VERSION,
            ],
            Self::MobileDevice => vec![
                PAYLOAD_UUID,
                PAYLOAD_IDENTIFIER,
                PAYLOAD_ORGANIZATION,
                PAYLOAD_DISPLAY_NAME,
                PAYLOAD_DESCRIPTION,
                PAYLOAD_REMOVAL_DISALLOWED,
            ],
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "macos" => Ok(Self::Macos),
            "mobile_device" | "mobile-device" | "mobile" => Ok(Self::MobileDevice),
            _ => bail!("Unknown profile kind '{s}' (expected macos or mobile_device)"),
        }
    }
}

// ============================================================================
// Config Schema
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory of the profile store
    #[serde(default)]
    pub store: Option<String>,

    #[serde(default)]
    pub kinds: KindsConfig,

    #[serde(default)]
    pub profiles: Vec<ProfileEntry>,

    /// Directory relative profile paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KindsConfig {
    #[serde(default)]
    pub macos: KindConfig,
    #[serde(default)]
    pub mobile_device: KindConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KindConfig {
    /// Replaces the built-in ignore list when set
    #[serde(default)]
    pub strip_fields: Option<Vec<String>>,

    /// Refuse to push a payload whose identifiers could not be lined up
    #[serde(default = "default_true")]
    pub strict_parity: bool,
}

impl Default for KindConfig {
    fn default() -> Self {
        Self {
            strip_fields: None,
            strict_parity: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    pub kind: ProfileKind,
    /// Payload file
    pub path: String,
    /// Required PayloadScope
    #[serde(default)]
    pub level: Option<PayloadScope>,
}

impl Config {
    /// Load from an explicit path, or the default location if there is one
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = config_dir()?.join("config.toml");
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format in config")?;
        config.validate()?;
        Ok(config)
    }

    /// Profile names must be unique per kind and usable as file names
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            validate_name(&profile.name)
                .with_context(|| format!("Invalid profile entry '{}'", profile.name))?;
            if !seen.insert((profile.kind, profile.name.as_str())) {
                bail!("Duplicate {} profile '{}'", profile.kind, profile.name);
            }
        }
        Ok(())
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store {
            Some(dir) => Ok(expand(dir)),
            None => default_store_dir(),
        }
    }

    /// Resolve a profile's payload path
    pub fn profile_path(&self, entry: &ProfileEntry) -> PathBuf {
        let path = expand(&entry.path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    pub fn kind_settings(&self) -> Arc<KindSettings> {
        Arc::new(KindSettings {
            macos: KindPolicy::resolve(ProfileKind::Macos, &self.kinds.macos),
            mobile_device: KindPolicy::resolve(ProfileKind::MobileDevice, &self.kinds.mobile_device),
        })
    }
}

/// Names end up as file names in the store
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Profile name cannot be empty");
    }
    if name.starts_with('.') || name.contains(['/', '\\']) {
        bail!("Profile name '{name}' cannot start with '.' or contain path separators");
    }
    Ok(())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Comparison policy for one profile kind
#[derive(Debug, Clone)]
pub struct KindPolicy {
    pub strip: StripFields,
    pub strict_parity: bool,
}

impl KindPolicy {
    fn resolve(kind: ProfileKind, config: &KindConfig) -> Self {
        let strip = match &config.strip_fields {
            Some(fields) => StripFields::new(fields),
            None => StripFields::new(kind.builtin_strip_fields()),
        };
        Self {
            strip,
            strict_parity: config.strict_parity,
        }
    }
}

/// Immutable per-kind settings, built once at startup
#[derive(Debug, Clone)]
pub struct KindSettings {
    macos: KindPolicy,
    mobile_device: KindPolicy,
}

impl KindSettings {
    pub fn for_kind(&self, kind: ProfileKind) -> &KindPolicy {
        match kind {
            ProfileKind::Macos => &self.macos,
            ProfileKind::MobileDevice => &self.mobile_device,
        }
    }
}

impl Default for KindSettings {
    fn default() -> Self {
        Self {
            macos: KindPolicy::resolve(ProfileKind::Macos, &KindConfig::default()),
            mobile_device: KindPolicy::resolve(ProfileKind::MobileDevice, &KindConfig::default()),
        }
    }
}
