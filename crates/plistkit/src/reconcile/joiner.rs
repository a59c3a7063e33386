//! Join strategies for matching payload dictionaries across two trees.

use crate::profile::{PAYLOAD_DISPLAY_NAME, PAYLOAD_TYPE};
use crate::value::{Dictionary, dict_get_str};
use std::fmt;

/// Key under which a dictionary's identifiers are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinKey {
    /// The profile root, which has no reliable display name
    Root,
    Name(String),
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "<root>"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Decides which dictionaries of a profile tree can be matched between the
/// trusted and the candidate tree.
///
/// Dictionaries without a key are never joined: they contribute nothing to
/// the identifier maps and injection leaves them alone.
pub trait IdentifierJoiner: Send + Sync {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    fn join_key(&self, dict: &Dictionary, is_root: bool) -> Option<JoinKey>;
}

/// Joins by `PayloadDisplayName`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayNameJoiner;

impl IdentifierJoiner for DisplayNameJoiner {
    fn name(&self) -> &'static str {
        "name"
    }

    fn join_key(&self, dict: &Dictionary, is_root: bool) -> Option<JoinKey> {
        if is_root {
            return Some(JoinKey::Root);
        }
        dict_get_str(dict, PAYLOAD_DISPLAY_NAME).map(|name| JoinKey::Name(name.to_string()))
    }
}

/// Joins by `PayloadType` and `PayloadDisplayName` together.
///
/// For profiles that reuse one display name across payloads of different
/// types. A payload without a type falls back to its name alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayNameTypeJoiner;

impl IdentifierJoiner for DisplayNameTypeJoiner {
    fn name(&self) -> &'static str {
        "name-type"
    }

    fn join_key(&self, dict: &Dictionary, is_root: bool) -> Option<JoinKey> {
        if is_root {
            return Some(JoinKey::Root);
        }
        let name = dict_get_str(dict, PAYLOAD_DISPLAY_NAME)?;
        let key = match dict_get_str(dict, PAYLOAD_TYPE) {
            Some(payload_type) => format!("{payload_type}/{name}"),
            None => name.to_string(),
        };
        Some(JoinKey::Name(key))
    }
}
