//! Profile store client
//!
//! [`ProfileStore`] is the surface the resource layer talks to. The
//! directory-backed implementation behaves like a management server: on
//! create it assigns the root `PayloadUUID`/`PayloadIdentifier`, and every
//! write reformats the payload.

use crate::config::{ProfileKind, validate_name};
use log::debug;
use plistkit::profile::{PAYLOAD_IDENTIFIER, PAYLOAD_UUID};
use plistkit::{Indent, PlistValue, codec};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const EXTENSION: &str = "mobileconfig";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} profile '{name}' not found")]
    NotFound { kind: ProfileKind, name: String },

    #[error("{kind} profile '{name}' already exists")]
    AlreadyExists { kind: ProfileKind, name: String },

    #[error("invalid profile name '{name}'")]
    InvalidName { name: String },

    #[error("payload rejected")]
    Rejected {
        #[source]
        source: plistkit::Error,
    },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Typed client for wherever profiles are kept
pub trait ProfileStore: Send + Sync + fmt::Debug {
    /// Stored payload, or `None` if there is no profile by that name
    fn fetch(&self, kind: ProfileKind, name: &str) -> StoreResult<Option<String>>;

    fn create(&self, kind: ProfileKind, name: &str, payload: &str) -> StoreResult<()>;

    fn update(&self, kind: ProfileKind, name: &str, payload: &str) -> StoreResult<()>;

    /// Names of stored profiles, sorted
    fn list(&self, kind: ProfileKind) -> StoreResult<Vec<String>>;
}

/// Store laid out as `<root>/<kind>/<name>.mobileconfig`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, kind: ProfileKind, name: &str) -> StoreResult<PathBuf> {
        if validate_name(name).is_err() {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self
            .root
            .join(kind.as_str())
            .join(format!("{name}.{EXTENSION}")))
    }

    fn write(&self, path: &Path, payload: &str) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, payload).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ProfileStore for DirectoryStore {
    fn fetch(&self, kind: ProfileKind, name: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(kind, name)?;
        match fs::read_to_string(&path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn create(&self, kind: ProfileKind, name: &str, payload: &str) -> StoreResult<()> {
        let path = self.path_for(kind, name)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                kind,
                name: name.to_string(),
            });
        }

        let id = assign_identifier(kind, name);
        debug!("Assigned {id} to {kind} profile '{name}'");
        let stored = reformat(payload, Some(&id)).map_err(|source| StoreError::Rejected { source })?;
        self.write(&path, &stored)
    }

    fn update(&self, kind: ProfileKind, name: &str, payload: &str) -> StoreResult<()> {
        let path = self.path_for(kind, name)?;
        if !path.exists() {
            return Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        let stored = reformat(payload, None).map_err(|source| StoreError::Rejected { source })?;
        self.write(&path, &stored)
    }

    fn list(&self, kind: ProfileKind) -> StoreResult<Vec<String>> {
        let dir = self.root.join(kind.as_str());
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io {
                path: dir.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == EXTENSION)
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Server-side rewrite: new root identity on create, two-space layout always
fn reformat(payload: &str, root_id: Option<&str>) -> plistkit::Result<String> {
    let mut dict = codec::decode_dict(payload)?;
    if let Some(id) = root_id {
        dict.insert(PAYLOAD_UUID.to_string(), PlistValue::from(id));
        dict.insert(PAYLOAD_IDENTIFIER.to_string(), PlistValue::from(id));
    }
    codec::encode_dict(&dict, Indent::Spaces(2))
}

/// Uppercase UUID-shaped identifier derived from the profile's address
fn assign_identifier(kind: ProfileKind, name: &str) -> String {
    let hash = blake3::hash(format!("{kind}/{name}").as_bytes());
    let hex = hash.to_hex().to_uppercase();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
