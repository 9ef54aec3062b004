//! Type Registry - schema types and atomization
//!
//! A small stand-in for a schema component model: the built-in hierarchy
//! the tree cares about (string-derived name types, ID/IDREF/IDREFS,
//! numerics, anyURI) plus user types registered as atomic restrictions,
//! lists, unions or complex types.
//!
//! The registry never validates documents. It only answers hierarchy
//! questions and turns already-valid lexical content into typed values.

use super::value::{AtomicSequence, AtomicValue};
use super::*;
use crate::error::{TreeError, TreeResult};
use crate::names::is_valid_ncname;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Content model of a complex type, as far as atomization is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// No content: typed value is the empty sequence
    Empty,
    /// Mixed content: typed value is the untyped string value
    Mixed,
    /// Element-only content: there is no typed value
    ElementOnly,
    /// Simple content of the given simple type
    Simple(TypeCode),
}

/// How a type is built from others
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variety {
    /// Restriction of another atomic type (anyAtomicType for primitives)
    Atomic { base: TypeCode },
    /// Whitespace-separated list of an atomic item type
    List { item: TypeCode },
    /// Union of member types, tried in order
    Union { members: Vec<TypeCode> },
    /// Complex type
    Complex { content: ContentType },
}

/// A registered schema type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    pub code: TypeCode,
    pub name: Arc<str>,
    pub variety: Variety,
}

impl SchemaType {
    pub fn is_atomic(&self) -> bool {
        matches!(self.variety, Variety::Atomic { .. })
    }
}

/// Thread-safe registry of schema types keyed by fingerprint
#[derive(Debug)]
pub struct TypeRegistry {
    types: RwLock<HashMap<TypeCode, Arc<SchemaType>>>,
    next_code: AtomicU32,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let registry = TypeRegistry {
            types: RwLock::new(HashMap::new()),
            next_code: AtomicU32::new(FIRST_USER_TYPE),
        };
        let complex = |content| Variety::Complex { content };
        let atomic = |base| Variety::Atomic { base };
        let builtins = [
            (XS_ANY_TYPE, "xs:anyType", complex(ContentType::Mixed)),
            (XS_UNTYPED, "xs:untyped", complex(ContentType::Mixed)),
            (XS_ANY_SIMPLE_TYPE, "xs:anySimpleType", atomic(XS_ANY_TYPE)),
            (XS_ANY_ATOMIC_TYPE, "xs:anyAtomicType", atomic(XS_ANY_SIMPLE_TYPE)),
            (XS_UNTYPED_ATOMIC, "xs:untypedAtomic", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_STRING, "xs:string", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_BOOLEAN, "xs:boolean", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_DECIMAL, "xs:decimal", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_DOUBLE, "xs:double", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_ANY_URI, "xs:anyURI", atomic(XS_ANY_ATOMIC_TYPE)),
            (XS_INTEGER, "xs:integer", atomic(XS_DECIMAL)),
            (XS_NORMALIZED_STRING, "xs:normalizedString", atomic(XS_STRING)),
            (XS_TOKEN, "xs:token", atomic(XS_NORMALIZED_STRING)),
            (XS_NAME, "xs:Name", atomic(XS_TOKEN)),
            (XS_NCNAME, "xs:NCName", atomic(XS_NAME)),
            (XS_ID, "xs:ID", atomic(XS_NCNAME)),
            (XS_IDREF, "xs:IDREF", atomic(XS_NCNAME)),
            (XS_IDREFS, "xs:IDREFS", Variety::List { item: XS_IDREF }),
            (XS_NMTOKEN, "xs:NMTOKEN", atomic(XS_TOKEN)),
            (XS_NMTOKENS, "xs:NMTOKENS", Variety::List { item: XS_NMTOKEN }),
        ];
        {
            let mut types = registry.types.write();
            for (code, name, variety) in builtins {
                types.insert(
                    code,
                    Arc::new(SchemaType {
                        code,
                        name: Arc::from(name),
                        variety,
                    }),
                );
            }
        }
        registry
    }

    fn register(&self, name: &str, variety: Variety) -> TypeCode {
        let code = self.next_code.fetch_add(1, Ordering::Relaxed);
        assert!(code <= TYPE_MASK, "type registry fingerprint space is exhausted");
        self.types.write().insert(
            code,
            Arc::new(SchemaType {
                code,
                name: Arc::from(name),
                variety,
            }),
        );
        code
    }

    /// Register an atomic type restricting `base`
    pub fn register_atomic(&self, name: &str, base: TypeCode) -> TypeCode {
        self.register(name, Variety::Atomic { base })
    }

    /// Register a list type over `item`
    pub fn register_list(&self, name: &str, item: TypeCode) -> TypeCode {
        self.register(name, Variety::List { item })
    }

    /// Register a union type
    pub fn register_union(&self, name: &str, members: Vec<TypeCode>) -> TypeCode {
        self.register(name, Variety::Union { members })
    }

    /// Register a complex type
    pub fn register_complex(&self, name: &str, content: ContentType) -> TypeCode {
        self.register(name, Variety::Complex { content })
    }

    /// Look up a type by code (flag bits are ignored)
    pub fn schema_type(&self, code: TypeCode) -> Option<Arc<SchemaType>> {
        self.types.read().get(&type_fingerprint(code)).cloned()
    }

    /// Display name of a type, or its numeric code when unknown
    pub fn type_name(&self, code: TypeCode) -> String {
        match self.schema_type(code) {
            Some(t) => t.name.to_string(),
            None => format!("#{}", type_fingerprint(code)),
        }
    }

    /// Is `sub` the same as, or derived by restriction from, atomic type `sup`?
    pub fn is_subtype(&self, sub: TypeCode, sup: TypeCode) -> bool {
        let sup = type_fingerprint(sup);
        let mut current = type_fingerprint(sub);
        loop {
            if current == sup {
                return true;
            }
            match self.schema_type(current).map(|t| t.variety.clone()) {
                Some(Variety::Atomic { base }) if base != current => current = base,
                _ => return false,
            }
        }
    }

    /// Is this an ID type: xs:ID, a restriction of it, or a list/union whose
    /// item type is one?
    pub fn is_id_code(&self, code: TypeCode) -> bool {
        let code = type_fingerprint(code);
        if code == XS_ID {
            return true;
        }
        if code < FIRST_USER_TYPE {
            return false;
        }
        match self.schema_type(code).map(|t| t.variety.clone()) {
            Some(Variety::Atomic { .. }) => self.is_subtype(code, XS_ID),
            Some(Variety::List { item }) => self.is_subtype(item, XS_ID),
            Some(Variety::Union { members }) => members.iter().any(|&m| self.is_id_code(m)),
            _ => false,
        }
    }

    /// Can values of this type contain ID references?
    pub fn is_idref_type(&self, code: TypeCode) -> bool {
        let code = type_fingerprint(code);
        match self.schema_type(code).map(|t| t.variety.clone()) {
            Some(Variety::Atomic { .. }) => self.is_subtype(code, XS_IDREF),
            Some(Variety::List { item }) => self.is_idref_type(item),
            Some(Variety::Union { members }) => members.iter().any(|&m| self.is_idref_type(m)),
            _ => false,
        }
    }

    /// The built-in primitive an atomic type derives from
    fn primitive(&self, code: TypeCode) -> TypeCode {
        let mut current = type_fingerprint(code);
        loop {
            match self.schema_type(current).map(|t| t.variety.clone()) {
                Some(Variety::Atomic { base }) if base != XS_ANY_ATOMIC_TYPE && base != current => {
                    current = base
                }
                _ => return current,
            }
        }
    }

    /// Turn lexical content of type `code` into its typed value
    pub fn atomize(&self, code: TypeCode, lexical: &str) -> TreeResult<AtomicSequence> {
        let stype = self
            .schema_type(code)
            .ok_or_else(|| TreeError::UnknownTypeAnnotation {
                type_name: format!("#{}", type_fingerprint(code)),
                type_code: code,
            })?;
        match &stype.variety {
            Variety::Atomic { .. } => Ok(AtomicSequence::singleton(self.cast_atomic(&stype, lexical)?)),
            Variety::List { item } => {
                let mut values = Vec::new();
                for token in lexical.split_ascii_whitespace() {
                    values.extend(self.atomize(*item, token)?.iter().cloned());
                }
                Ok(AtomicSequence::from(values))
            }
            Variety::Union { members } => members
                .iter()
                .find_map(|&m| self.atomize(m, lexical).ok())
                .ok_or_else(|| self.invalid(&stype, lexical)),
            Variety::Complex { content } => match content {
                ContentType::Empty => Ok(AtomicSequence::empty()),
                ContentType::Mixed => Ok(AtomicSequence::untyped(lexical)),
                ContentType::ElementOnly => Err(TreeError::ElementOnlyContent {
                    type_name: stype.name.to_string(),
                }),
                ContentType::Simple(simple) => self.atomize(*simple, lexical),
            },
        }
    }

    fn invalid(&self, stype: &SchemaType, lexical: &str) -> TreeError {
        TreeError::InvalidLexicalValue {
            lexical: lexical.to_string(),
            type_name: stype.name.to_string(),
        }
    }

    fn cast_atomic(&self, stype: &SchemaType, lexical: &str) -> TreeResult<AtomicValue> {
        let code = stype.code;
        let trimmed = lexical.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        let value = match self.primitive(code) {
            XS_UNTYPED_ATOMIC => AtomicValue::UntypedAtomic(Arc::from(lexical)),
            XS_STRING => {
                let value = if self.is_subtype(code, XS_TOKEN) {
                    trimmed.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
                } else if self.is_subtype(code, XS_NORMALIZED_STRING) {
                    lexical.replace(['\t', '\n', '\r'], " ")
                } else {
                    lexical.to_string()
                };
                if self.is_subtype(code, XS_NCNAME) && !is_valid_ncname(&value) {
                    return Err(self.invalid(stype, lexical));
                }
                AtomicValue::String {
                    type_code: code,
                    value: Arc::from(value),
                }
            }
            XS_BOOLEAN => match trimmed {
                "true" | "1" => AtomicValue::Boolean(true),
                "false" | "0" => AtomicValue::Boolean(false),
                _ => return Err(self.invalid(stype, lexical)),
            },
            XS_DECIMAL if self.is_subtype(code, XS_INTEGER) => {
                let value = trimmed
                    .strip_prefix('+')
                    .unwrap_or(trimmed)
                    .parse::<i64>()
                    .map_err(|_| self.invalid(stype, lexical))?;
                AtomicValue::Integer {
                    type_code: code,
                    value,
                }
            }
            XS_DECIMAL | XS_DOUBLE => {
                let value = match trimmed {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NaN" => f64::NAN,
                    _ => trimmed.parse::<f64>().map_err(|_| self.invalid(stype, lexical))?,
                };
                AtomicValue::Double {
                    type_code: code,
                    value,
                }
            }
            XS_ANY_URI => AtomicValue::AnyUri(Arc::from(trimmed)),
            _ => return Err(self.invalid(stype, lexical)),
        };
        Ok(value)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
