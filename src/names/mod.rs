//! Names Module - integer name codes for nodes
//!
//! The tree never compares names as strings. Every element, attribute and
//! processing-instruction name is interned once in the [`NamePool`] and
//! stored as a 32-bit name code:
//!
//! ```text
//! bit 31..30   unused (keeps NO_NAME distinct)
//! bit 29..20   prefix index
//! bit 19..0    fingerprint (namespace URI + local name)
//! ```

pub mod namespace;
pub mod pool;

pub use namespace::{NamespaceBinding, NamespaceResolver};
pub use pool::NamePool;

/// Interned name, including its prefix
pub type NameCode = u32;

/// Name code with the prefix stripped: identifies (uri, local name)
pub type Fingerprint = u32;

/// Interned namespace URI
pub type UriCode = u32;

/// Sentinel name code for unnamed nodes (text, comments, documents)
pub const NO_NAME: NameCode = u32::MAX;

/// Mask selecting the fingerprint bits of a name code
pub const FP_MASK: u32 = 0x000F_FFFF;

pub(crate) const PREFIX_SHIFT: u32 = 20;

/// URI code of the empty (null) namespace
pub const NULL_URI: UriCode = 0;

/// Fingerprint of `xml:id`, reserved by every pool at construction
pub const XML_ID: Fingerprint = 1;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
    pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
}

/// Strip the prefix bits from a name code
#[inline]
pub fn fingerprint(code: NameCode) -> Fingerprint {
    code & FP_MASK
}

/// Prefix index held in a name code
#[inline]
pub fn prefix_index(code: NameCode) -> u32 {
    code >> PREFIX_SHIFT
}

/// Check whether `name` matches the XML `NCName` production
pub fn is_valid_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Trim XML whitespace (space, tab, CR, LF) from both ends
#[inline]
pub fn trim_whitespace(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}
