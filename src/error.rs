//! Error handling for tree construction and typed-value access
//!
//! Only data errors live here. Contract violations (appending while the
//! sibling index is being built, materializing a marker node, indexing past
//! the live node count) panic instead.

use crate::types::TypeCode;

/// A result type for tree operations
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// An error raised while building a tree or computing a typed value
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A node carries a type annotation the registry does not know
    #[error("Unknown type annotation {type_name} in document instance")]
    UnknownTypeAnnotation {
        /// Display form of the annotation (the raw code when unnamed)
        type_name: String,
        /// The raw annotation
        type_code: TypeCode,
    },

    /// A lexical value does not conform to its declared type
    #[error("Value {lexical:?} is not a valid instance of {type_name}")]
    InvalidLexicalValue {
        /// The offending content
        lexical: String,
        /// Name of the declared type
        type_name: String,
    },

    /// An element whose type has element-only content has no typed value
    #[error("Element of type {type_name} has element-only content and no typed value")]
    ElementOnlyContent {
        /// Name of the complex type
        type_name: String,
    },

    /// XML tokenization failed
    #[error("XML parser error: {0}")]
    Xml(#[from] xmlparser::Error),

    /// A prefix was used without an in-scope declaration
    #[error("Namespace prefix {0:?} is not declared")]
    UnboundPrefix(String),

    /// An end tag did not match the open element
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        /// Name of the element left open
        expected: String,
        /// Name in the end tag
        found: String,
    },

    /// Input ended with elements still open
    #[error("Unclosed tag: {0}")]
    UnclosedTag(String),

    /// The same attribute name appeared twice on one element
    #[error("Duplicate attribute {0}")]
    DuplicateAttribute(String),

    /// Elements nested past the deepest level a tree can record
    #[error("Element nesting exceeds {0} levels")]
    NestingTooDeep(u16),
}
