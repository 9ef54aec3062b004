//! Atomic value types
//!
//! A typed value is a sequence of atomic values. Sequences are reference
//! counted so a cached value can be handed to many readers without copying.

use super::{TypeCode, XS_ANY_URI, XS_BOOLEAN, XS_UNTYPED_ATOMIC};
use std::fmt;
use std::sync::Arc;

/// A single atomic value, tagged with its item type
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    /// xs:untypedAtomic, the typed value of unvalidated content
    UntypedAtomic(Arc<str>),
    /// xs:string or any type derived from it (token, NCName, ID, IDREF...)
    String { type_code: TypeCode, value: Arc<str> },
    /// xs:anyURI
    AnyUri(Arc<str>),
    /// xs:boolean
    Boolean(bool),
    /// xs:integer or a type derived from it
    Integer { type_code: TypeCode, value: i64 },
    /// xs:decimal, xs:double, or a type derived from them
    Double { type_code: TypeCode, value: f64 },
}

impl AtomicValue {
    /// The type fingerprint of this item
    pub fn item_type(&self) -> TypeCode {
        match self {
            AtomicValue::UntypedAtomic(_) => XS_UNTYPED_ATOMIC,
            AtomicValue::String { type_code, .. } => *type_code,
            AtomicValue::AnyUri(_) => XS_ANY_URI,
            AtomicValue::Boolean(_) => XS_BOOLEAN,
            AtomicValue::Integer { type_code, .. } => *type_code,
            AtomicValue::Double { type_code, .. } => *type_code,
        }
    }

    /// Canonical-ish string form
    pub fn string_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicValue::UntypedAtomic(s) | AtomicValue::AnyUri(s) => f.write_str(s),
            AtomicValue::String { value, .. } => f.write_str(value),
            AtomicValue::Boolean(b) => write!(f, "{b}"),
            AtomicValue::Integer { value, .. } => write!(f, "{value}"),
            AtomicValue::Double { value, .. } => write!(f, "{value}"),
        }
    }
}

/// An immutable, cheaply clonable sequence of atomic values
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicSequence(Arc<[AtomicValue]>);

impl AtomicSequence {
    /// The empty sequence
    pub fn empty() -> Self {
        AtomicSequence(Arc::from(Vec::new()))
    }

    /// A sequence of one item
    pub fn singleton(value: AtomicValue) -> Self {
        AtomicSequence(Arc::from(vec![value]))
    }

    /// An xs:untypedAtomic singleton
    pub fn untyped(text: &str) -> Self {
        Self::singleton(AtomicValue::UntypedAtomic(Arc::from(text)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AtomicValue> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtomicValue> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[AtomicValue] {
        &self.0
    }
}

impl From<Vec<AtomicValue>> for AtomicSequence {
    fn from(values: Vec<AtomicValue>) -> Self {
        AtomicSequence(Arc::from(values))
    }
}

impl<'a> IntoIterator for &'a AtomicSequence {
    type Item = &'a AtomicValue;
    type IntoIter = std::slice::Iter<'a, AtomicValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
