//! Tree Module - compact array-based node storage
//!
//! Provides the [`TinyTree`] arena and everything that reads or builds it:
//! - Node handles and per-kind views (`handle`)
//! - Attribute scans (`attributes`)
//! - Event-driven construction (`builder`)
//! - Sizing hints, ID tables, lazy caches, compressed whitespace

pub mod attributes;
pub mod builder;
pub mod cache;
pub mod document;
pub mod handle;
pub mod kind;
pub mod parallel;
pub mod statistics;
pub mod tiny;
pub mod whitespace;

pub use attributes::{AtomizingAttributeScan, AttributeScan, AttributeTest, NameTest};
pub use builder::TinyBuilder;
pub use document::{DocumentInfo, IdTable};
pub use handle::{AttributeHandle, NamespaceHandle, NodeHandle, NodeView};
pub use kind::{NodeKind, NodeNr, NO_NODE};
pub use statistics::Statistics;
pub use tiny::{Next, TinyTree};

/// Bit-significant properties passed with construction events
pub mod properties {
    /// Attribute or element is an ID
    pub const IS_ID: u32 = 1 << 0;
    /// Attribute or element holds ID references
    pub const IS_IDREF: u32 = 1 << 1;
    /// Element was nilled (`xsi:nil="true"`)
    pub const NILLED: u32 = 1 << 2;
    /// Character data is the complete content of one text node
    pub const WHOLE_TEXT_NODE: u32 = 1 << 3;
}
