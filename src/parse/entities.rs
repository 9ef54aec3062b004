//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - Internal general entities declared in the DTD
//!
//! Uses Cow for zero-copy when nothing needs replacing.

use memchr::{memchr, memchr3};
use std::borrow::Cow;
use std::collections::HashMap;

/// Nesting limit for entities whose replacement text references entities
const MAX_ENTITY_DEPTH: usize = 8;

/// Decode entity and character references in text content.
///
/// Unknown or malformed references are kept as written.
#[inline]
pub fn decode<'a>(input: &'a str, entities: &HashMap<String, String>) -> Cow<'a, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    decode_into(input, entities, &mut out, 0);
    Cow::Owned(out)
}

fn decode_into(input: &str, entities: &HashMap<String, String>, out: &mut String, depth: usize) {
    let bytes = input.as_bytes();
    let mut pos = 0;
    while let Some(offset) = memchr(b'&', &bytes[pos..]) {
        let amp = pos + offset;
        out.push_str(&input[pos..amp]);
        let Some(semi) = memchr(b';', &bytes[amp..]).map(|o| amp + o) else {
            out.push('&');
            pos = amp + 1;
            continue;
        };
        let name = &input[amp + 1..semi];
        if let Some(c) = name.strip_prefix('#').and_then(decode_char_ref) {
            out.push(c);
        } else if let Some(s) = predefined(name) {
            out.push_str(s);
        } else if let Some(text) = entities.get(name).filter(|_| depth < MAX_ENTITY_DEPTH) {
            decode_into(text, entities, out, depth + 1);
        } else {
            out.push('&');
            pos = amp + 1;
            continue;
        }
        pos = semi + 1;
    }
    out.push_str(&input[pos..]);
}

fn predefined(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Decode the body of a character reference (after `&#`)
fn decode_char_ref(body: &str) -> Option<char> {
    let codepoint = match body.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u32>().ok()?,
    };
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Normalize line endings: `\r\n` and lone `\r` become `\n`
pub fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if memchr(b'\r', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization: literal tab, newline and carriage
/// return become spaces. Character references are decoded afterwards, so
/// `&#10;` still yields a newline.
pub fn normalize_attribute(input: &str) -> Cow<'_, str> {
    if memchr3(b'\t', b'\n', b'\r', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    let value = input.replace("\r\n", " ");
    Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_no_entities_borrows() {
        assert!(matches!(decode("plain text", &none()), Cow::Borrowed(_)));
    }

    #[test]
    fn test_predefined_and_numeric() {
        assert_eq!(decode("a &lt; b &amp;&amp; &#65;&#x42;", &none()), "a < b && AB");
    }

    #[test]
    fn test_unknown_and_malformed_kept() {
        assert_eq!(decode("&nbsp; & x &#0;", &none()), "&nbsp; & x &#0;");
    }

    #[test]
    fn test_declared_entities() {
        let mut entities = none();
        entities.insert("co".into(), "Acme &amp; Sons".into());
        entities.insert("loop".into(), "&loop;".into());
        assert_eq!(decode("&co; Ltd", &entities), "Acme & Sons Ltd");
        assert!(decode("&loop;", &entities).ends_with("&loop;"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_newlines("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalize_attribute("a\tb\r\nc"), "a b c");
        assert!(matches!(normalize_attribute("ab"), Cow::Borrowed(_)));
    }
}
