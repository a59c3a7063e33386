//! In-memory plist tree model.
//!
//! A parsed plist is a tree of dictionaries, arrays and scalar leaves.
//! Dictionaries keep insertion order so that a tree written back out keeps
//! the author's key layout, but equality between dictionaries ignores order:
//! key order in a plist is a serialization artifact, not meaning. Array order
//! is significant.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::time::SystemTime;

/// String-keyed plist dictionary.
pub type Dictionary = IndexMap<String, PlistValue>;

/// Any plist value.
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    Dict(Dictionary),
    Array(Vec<PlistValue>),
    String(String),
    /// Wide enough for both signed and unsigned 64-bit plist integers
    Integer(i128),
    Real(f64),
    Boolean(bool),
    /// Decoded bytes of a `<data>` element
    Data(Vec<u8>),
    Date(SystemTime),
}

impl PlistValue {
    /// Short name of this value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dict(_) => "dict",
            Self::Array(_) => "array",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Boolean(_) => "boolean",
            Self::Data(_) => "data",
            Self::Date(_) => "date",
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this value is a dictionary or an array.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Dict(_) | Self::Array(_))
    }
}

/// Get a string value for a key.
pub fn dict_get_str<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(PlistValue::as_str)
}

/// Get an array value for a key.
pub fn dict_get_array<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a [PlistValue]> {
    dict.get(key).and_then(PlistValue::as_array)
}

impl From<&str> for PlistValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PlistValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PlistValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PlistValue {
    fn from(value: i64) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<Dictionary> for PlistValue {
    fn from(value: Dictionary) -> Self {
        Self::Dict(value)
    }
}

impl From<Vec<PlistValue>> for PlistValue {
    fn from(value: Vec<PlistValue>) -> Self {
        Self::Array(value)
    }
}

impl TryFrom<plist::Value> for PlistValue {
    type Error = Error;

    fn try_from(value: plist::Value) -> Result<Self> {
        #[allow(unreachable_patterns)]
        let converted = match value {
            plist::Value::Dictionary(dict) => {
                let mut out = Dictionary::with_capacity(dict.len());
                for (key, value) in dict {
                    out.insert(key, Self::try_from(value)?);
                }
                Self::Dict(out)
            }
            plist::Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            plist::Value::String(s) => Self::String(s),
            plist::Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
                (Some(signed), _) => Self::Integer(i128::from(signed)),
                (None, Some(unsigned)) => Self::Integer(i128::from(unsigned)),
                (None, None) => return Err(Error::UnsupportedValue { kind: "integer" }),
            },
            plist::Value::Real(r) => Self::Real(r),
            plist::Value::Boolean(b) => Self::Boolean(b),
            plist::Value::Data(bytes) => Self::Data(bytes),
            plist::Value::Date(date) => Self::Date(date.into()),
            plist::Value::Uid(_) => return Err(Error::UnsupportedValue { kind: "uid" }),
            _ => return Err(Error::UnsupportedValue { kind: "unknown" }),
        };
        Ok(converted)
    }
}

impl TryFrom<&PlistValue> for plist::Value {
    type Error = Error;

    fn try_from(value: &PlistValue) -> Result<Self> {
        let converted = match value {
            PlistValue::Dict(dict) => {
                let mut out = plist::Dictionary::new();
                for (key, value) in dict {
                    out.insert(key.clone(), Self::try_from(value)?);
                }
                Self::Dictionary(out)
            }
            PlistValue::Array(items) => Self::Array(
                items
                    .iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            PlistValue::String(s) => Self::String(s.clone()),
            PlistValue::Integer(i) => {
                if let Ok(signed) = i64::try_from(*i) {
                    Self::Integer(signed.into())
                } else if let Ok(unsigned) = u64::try_from(*i) {
                    Self::Integer(unsigned.into())
                } else {
                    return Err(Error::UnsupportedValue { kind: "integer" });
                }
            }
            PlistValue::Real(r) => Self::Real(*r),
            PlistValue::Boolean(b) => Self::Boolean(*b),
            PlistValue::Data(bytes) => Self::Data(bytes.clone()),
            PlistValue::Date(date) => Self::Date((*date).into()),
        };
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_equality_ignores_key_order() {
        let mut a = Dictionary::new();
        a.insert("b".into(), PlistValue::Integer(2));
        a.insert("a".into(), PlistValue::Integer(1));

        let mut b = Dictionary::new();
        b.insert("a".into(), PlistValue::Integer(1));
        b.insert("b".into(), PlistValue::Integer(2));

        assert_eq!(PlistValue::Dict(a), PlistValue::Dict(b));
    }

    #[test]
    fn test_array_equality_respects_order() {
        let a = PlistValue::Array(vec!["x".into(), "y".into()]);
        let b = PlistValue::Array(vec!["y".into(), "x".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_roundtrip_through_plist_value_keeps_large_unsigned() {
        let original = PlistValue::Integer(i128::from(u64::MAX));
        let raw = plist::Value::try_from(&original).unwrap();
        assert_eq!(PlistValue::try_from(raw).unwrap(), original);
    }

    #[test]
    fn test_out_of_range_integer_is_unsupported() {
        let value = PlistValue::Integer(i128::from(u64::MAX) + 1);
        assert!(plist::Value::try_from(&value).is_err());
    }

    #[test]
    fn test_dict_helpers() {
        let mut dict = Dictionary::new();
        dict.insert("PayloadType".into(), "Configuration".into());
        dict.insert("PayloadContent".into(), PlistValue::Array(vec![]));
        dict.insert("PayloadVersion".into(), PlistValue::Integer(1));

        assert_eq!(dict_get_str(&dict, "PayloadType"), Some("Configuration"));
        assert_eq!(dict_get_str(&dict, "PayloadVersion"), None);
        assert_eq!(dict_get_array(&dict, "PayloadContent").map(<[_]>::len), Some(0));
    }
}
