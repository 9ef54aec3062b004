//! Types Module - type annotations and atomic values
//!
//! Type annotations are 32-bit codes. The low 20 bits are the type
//! fingerprint; three high bits carry per-node flags the tree records at
//! construction time:
//!
//! ```text
//! bit 30       TYPECODE_NILLED  (element was xsi:nil)
//! bit 29       TYPECODE_IDREF   (node was reported as IDREF/IDREFS)
//! bit 28       TYPECODE_ID      (node was reported as ID and registered)
//! bit 19..0    type fingerprint
//! ```
//!
//! Built-in types use fingerprints below [`FIRST_USER_TYPE`]; types added to
//! a [`TypeRegistry`] are numbered from there.

pub mod registry;
pub mod value;

pub use registry::{ContentType, SchemaType, TypeRegistry, Variety};
pub use value::{AtomicSequence, AtomicValue};

/// A type annotation, possibly carrying flag bits
pub type TypeCode = u32;

/// Set on a type code when the node carries the is-idref property
pub const TYPECODE_IDREF: u32 = 1 << 29;

/// Set on a type code when the node was registered as an ID
pub const TYPECODE_ID: u32 = 1 << 28;

/// Set on an element's type code when it was nilled
pub const TYPECODE_NILLED: u32 = 1 << 30;

/// Mask selecting the type fingerprint
pub const TYPE_MASK: u32 = 0x000F_FFFF;

/// First fingerprint handed out to registered types
pub const FIRST_USER_TYPE: TypeCode = 1024;

pub const XS_ANY_TYPE: TypeCode = 1;
pub const XS_UNTYPED: TypeCode = 2;
pub const XS_ANY_SIMPLE_TYPE: TypeCode = 3;
pub const XS_ANY_ATOMIC_TYPE: TypeCode = 4;
pub const XS_UNTYPED_ATOMIC: TypeCode = 5;
pub const XS_STRING: TypeCode = 6;
pub const XS_BOOLEAN: TypeCode = 7;
pub const XS_DECIMAL: TypeCode = 8;
pub const XS_DOUBLE: TypeCode = 9;
pub const XS_ANY_URI: TypeCode = 10;
pub const XS_INTEGER: TypeCode = 11;
pub const XS_NORMALIZED_STRING: TypeCode = 12;
pub const XS_TOKEN: TypeCode = 13;
pub const XS_NAME: TypeCode = 14;
pub const XS_NCNAME: TypeCode = 15;
pub const XS_ID: TypeCode = 16;
pub const XS_IDREF: TypeCode = 17;
pub const XS_IDREFS: TypeCode = 18;
pub const XS_NMTOKEN: TypeCode = 19;
pub const XS_NMTOKENS: TypeCode = 20;

/// Strip the flag bits from a type code
#[inline]
pub fn type_fingerprint(code: TypeCode) -> TypeCode {
    code & TYPE_MASK
}
