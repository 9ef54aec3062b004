//! Internal DTD Subset Declarations
//!
//! The tokenizer reports internal entity declarations but skips attribute
//! list declarations. This module scans the raw internal subset for
//! `<!ATTLIST ...>` so that DTD-declared ID and IDREF attributes, and
//! attribute defaults, reach the tree.

use crate::tree::properties;
use memchr::memmem;
use std::collections::HashMap;

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation,
    Enumeration,
}

impl AttType {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "ID" => AttType::Id,
            "IDREF" => AttType::IdRef,
            "IDREFS" => AttType::IdRefs,
            "ENTITY" => AttType::Entity,
            "ENTITIES" => AttType::Entities,
            "NMTOKEN" => AttType::NmToken,
            "NMTOKENS" => AttType::NmTokens,
            "NOTATION" => AttType::Notation,
            k if k.starts_with('(') => AttType::Enumeration,
            _ => AttType::CData,
        }
    }

    /// Construction properties implied by this type
    pub fn properties(&self) -> u32 {
        match self {
            AttType::Id => properties::IS_ID,
            AttType::IdRef | AttType::IdRefs => properties::IS_IDREF,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

impl AttDefault {
    /// Value supplied when the attribute is absent
    pub fn value(&self) -> Option<&str> {
        match self {
            AttDefault::Fixed(v) | AttDefault::Default(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttDef {
    pub name: String,
    pub att_type: AttType,
    pub default: AttDefault,
}

/// Attribute lists and internal entities declared in a DTD
#[derive(Debug, Default)]
pub struct DtdDeclarations {
    /// Element name -> attribute definitions
    attlists: HashMap<String, Vec<AttDef>>,
    /// Internal general entities: name -> replacement text
    entities: HashMap<String, String>,
}

impl DtdDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan an internal subset for attribute-list declarations
    pub fn add_declarations(&mut self, subset: &str) {
        let mut rest = subset;
        while let Some(pos) = memmem::find(rest.as_bytes(), b"<!") {
            rest = &rest[pos..];
            if let Some(body) = rest.strip_prefix("<!--") {
                rest = match memmem::find(body.as_bytes(), b"-->") {
                    Some(end) => &body[end + 3..],
                    None => "",
                };
                continue;
            }
            let end = declaration_end(rest);
            if let Some(body) = rest[2..end].strip_prefix("ATTLIST") {
                self.add_attlist(body);
            }
            rest = &rest[(end + 1).min(rest.len())..];
        }
    }

    fn add_attlist(&mut self, body: &str) {
        let mut tokens = Tokens { rest: body };
        let Some(element) = tokens.next() else {
            return;
        };
        let defs = self.attlists.entry(element.to_string()).or_default();
        while let Some(name) = tokens.next() {
            let Some(keyword) = tokens.next() else {
                break;
            };
            let att_type = AttType::from_keyword(keyword);
            if att_type == AttType::Notation {
                tokens.next();
            }
            let default = match tokens.next() {
                Some("#REQUIRED") => AttDefault::Required,
                Some("#IMPLIED") => AttDefault::Implied,
                Some("#FIXED") => AttDefault::Fixed(unquote(tokens.next().unwrap_or_default())),
                Some(literal) => AttDefault::Default(unquote(literal)),
                None => break,
            };
            // The first declaration of an attribute is binding
            if defs.iter().all(|d| d.name != name) {
                defs.push(AttDef {
                    name: name.to_string(),
                    att_type,
                    default,
                });
            }
        }
    }

    pub fn add_entity(&mut self, name: &str, value: &str) {
        self.entities
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn entities(&self) -> &HashMap<String, String> {
        &self.entities
    }

    /// Attributes declared for an element (by qualified name)
    pub fn attributes(&self, element: &str) -> &[AttDef] {
        self.attlists.get(element).map_or(&[], Vec::as_slice)
    }

    pub fn attribute(&self, element: &str, name: &str) -> Option<&AttDef> {
        self.attributes(element).iter().find(|d| d.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.attlists.is_empty() && self.entities.is_empty()
    }
}

/// Index of the `>` closing the declaration at the start of `decl`
fn declaration_end(decl: &str) -> usize {
    let mut quote = None;
    for (i, b) in decl.bytes().enumerate().skip(2) {
        match (quote, b) {
            (None, b'"' | b'\'') => quote = Some(b),
            (Some(q), _) if q == b => quote = None,
            (None, b'>') => return i,
            _ => {}
        }
    }
    decl.len()
}

fn unquote(literal: &str) -> String {
    literal
        .strip_prefix(['"', '\''])
        .and_then(|s| s.strip_suffix(['"', '\'']))
        .unwrap_or(literal)
        .to_string()
}

/// Words, quoted literals and parenthesized groups of a declaration body
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        let first = s.bytes().next()?;
        let len = match first {
            b'"' | b'\'' => s[1..].find(first as char).map_or(s.len(), |i| i + 2),
            b'(' => s.find(')').map_or(s.len(), |i| i + 1),
            _ => s
                .find(|c: char| c.is_ascii_whitespace() || c == '(' || c == '"' || c == '\'')
                .unwrap_or(s.len()),
        };
        let len = len.max(1);
        self.rest = &s[len..];
        Some(&s[..len])
    }
}
