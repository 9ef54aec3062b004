//! Node kinds and node numbers
//!
//! Uses NodeNr (u32) for compact, cache-friendly node references.

/// Node number: index into the node arrays of a tree
pub type NodeNr = u32;

/// Sentinel value for "no node"
pub const NO_NODE: NodeNr = u32::MAX;

/// Kind of an entry in the node arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    /// Document root
    Document = 9,
    /// Element node
    Element = 1,
    /// Text content
    Text = 3,
    /// Whitespace-only text held in compressed form
    WhitespaceText = 4,
    /// Comment
    Comment = 8,
    /// Processing instruction
    ProcessingInstruction = 7,
    /// Pseudo-node in a long sibling chain whose `alpha` is the parent
    ParentPointer = 12,
    /// End-of-tree marker
    Stopper = 11,
}

impl NodeKind {
    /// Kind as seen by readers: compressed whitespace is still text
    #[inline]
    pub fn public_kind(self) -> NodeKind {
        match self {
            NodeKind::WhitespaceText => NodeKind::Text,
            other => other,
        }
    }

    /// Internal bookkeeping entries that never become nodes
    #[inline]
    pub fn is_marker(self) -> bool {
        matches!(self, NodeKind::ParentPointer | NodeKind::Stopper)
    }

    /// Kinds that can have children
    #[inline]
    pub fn is_parent(self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element)
    }

    /// Kinds whose string value is held in the character buffer
    #[inline]
    pub fn is_text(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::WhitespaceText)
    }
}
