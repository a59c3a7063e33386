//! String-leaf normalizations.
//!
//! Some payloads carry already-serialized plist fragments or line-wrapped
//! base64 inside `<string>` leaves, so part of canonicalization has to work on
//! text rather than on parsed values.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static SELF_CLOSING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\s*(\w+)\s*/>").expect("failed to compile self-closing tag regex")
});

static DATA_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<data>(.*?)</data>").expect("failed to compile data fragment regex")
});

static ENTITY_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:[a-zA-Z][a-zA-Z0-9]*|#[0-9]+|#[xX][0-9a-fA-F]+);")
        .expect("failed to compile entity regex")
});

/// Longest entity body we try to resolve, `#x10FFFF` included.
const MAX_ENTITY_LEN: usize = 10;

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_base64_alphabet(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

/// Unwrap a line-wrapped base64 string.
///
/// Only strings spanning several lines qualify: short single-line values
/// such as `"Allow"` are valid base64 too and must be left alone.
pub fn unwrap_base64(s: &str) -> Option<String> {
    if !s.contains('\n') {
        return None;
    }
    let stripped = strip_whitespace(s);
    if stripped.is_empty() || !stripped.chars().all(is_base64_alphabet) {
        return None;
    }
    STANDARD.decode(stripped.as_bytes()).ok().map(|_| stripped)
}

/// Remove whitespace inside `<data>` fragments embedded in text.
pub fn compact_data_fragments(s: &str) -> Cow<'_, str> {
    if !s.contains("<data>") {
        return Cow::Borrowed(s);
    }
    DATA_FRAGMENT.replace_all(s, |caps: &regex::Captures<'_>| {
        format!("<data>{}</data>", strip_whitespace(&caps[1]))
    })
}

/// Collapse whitespace in self-closing tags: `<true   />` becomes `<true/>`.
pub fn normalize_tag_spacing(s: &str) -> Cow<'_, str> {
    SELF_CLOSING_TAG.replace_all(s, "<$1/>")
}

/// Whether the text contains something that reads as an entity reference.
pub fn has_entity(s: &str) -> bool {
    ENTITY_LIKE.is_match(s)
}

/// Unescape entities at most once.
///
/// The unescaped form replaces the original only when the original holds an
/// escaped ampersand and the result is plain text: no markup and nothing that
/// a second pass would unescape again. `&amp;amp;` marks deliberately
/// double-escaped content and is never touched.
pub fn unescape_once(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    let unescaped = unescape_entities(s);
    if unescaped.contains('<') || unescaped.contains('>') || has_entity(&unescaped) {
        return Cow::Borrowed(s);
    }
    if s.contains("&amp;") && !s.contains("&amp;amp;") {
        Cow::Owned(unescaped)
    } else {
        Cow::Borrowed(s)
    }
}

/// Resolve XML and common HTML entity references in a single pass.
///
/// Unknown names and references without a terminating `;` are copied through.
pub fn unescape_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];

        let resolved = tail
            .char_indices()
            .take(MAX_ENTITY_LEN + 1)
            .find(|&(_, c)| c == ';')
            .and_then(|(end, _)| resolve_entity(&tail[..end]).map(|c| (c, end)));

        match resolved {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

fn resolve_entity(body: &str) -> Option<char> {
    if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        _ => return None,
    };
    Some(c)
}
