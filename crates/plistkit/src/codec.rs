//! Plist XML decoding and deterministic encoding.
//!
//! Parsing and serialization are delegated to the `plist` crate; this module
//! only pins the output layout (indentation, quote handling) so that the same
//! tree always produces byte-identical text.

use crate::error::{Error, Result};
use crate::value::{Dictionary, PlistValue};
use plist::XmlWriteOptions;
use std::io::Cursor;

/// Indentation used when writing plist XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indent {
    /// One tab per level (canonical form)
    #[default]
    Tab,
    /// N spaces per level (request payloads)
    Spaces(usize),
}

impl Indent {
    fn options(self) -> XmlWriteOptions {
        match self {
            Self::Tab => XmlWriteOptions::default().indent(b'\t', 1),
            Self::Spaces(count) => XmlWriteOptions::default().indent(b' ', count),
        }
    }
}

/// Parse plist XML into a tree.
pub fn decode(xml: &str) -> Result<PlistValue> {
    let raw = plist::Value::from_reader_xml(Cursor::new(xml.as_bytes()))
        .map_err(|source| Error::Decode { source })?;
    PlistValue::try_from(raw)
}

/// Parse plist XML whose root must be a dictionary.
pub fn decode_dict(xml: &str) -> Result<Dictionary> {
    match decode(xml)? {
        PlistValue::Dict(dict) => Ok(dict),
        other => Err(Error::NotADictionary { found: other.kind() }),
    }
}

/// Serialize a tree to plist XML.
pub fn encode(value: &PlistValue, indent: Indent) -> Result<String> {
    let raw = plist::Value::try_from(value)?;

    let mut buffer = Vec::new();
    raw.to_writer_xml_with_options(&mut buffer, &indent.options())
        .map_err(|source| Error::Encode { source })?;

    let mut xml = String::from_utf8(buffer)?;
    if !xml.ends_with('\n') {
        xml.push('\n');
    }
    Ok(unescape_quotes(&xml))
}

/// Serialize a dictionary root to plist XML.
pub fn encode_dict(dict: &Dictionary, indent: Indent) -> Result<String> {
    encode(&PlistValue::Dict(dict.clone()), indent)
}

/// Quotes never need escaping in element content; the only attribute in a
/// plist document is the literal `version="1.0"`.
fn unescape_quotes(xml: &str) -> String {
    xml.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
}

/// Trim trailing spaces and tabs from every line.
pub fn trim_trailing_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}
