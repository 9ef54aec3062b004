//! Node, attribute and namespace handles
//!
//! A handle is a `(tree, index)` pair. It owns nothing, costs two words, and
//! is `Copy`; every accessor is a lookup in the tree's arrays. Handles are
//! the read API for code outside the tree module.

use super::attributes::{AttributeScan, NameTest};
use super::document::DocumentInfo;
use super::kind::{NodeKind, NodeNr};
use super::tiny::TinyTree;
use crate::error::TreeResult;
use crate::names::{NameCode, NamespaceBinding, NO_NAME};
use crate::types::{AtomicSequence, TypeCode};
use std::borrow::Cow;
use std::fmt;

impl TinyTree {
    /// Handle for node `nr`
    ///
    /// # Panics
    ///
    /// If `nr` is not below the live node count.
    pub fn node(&self, nr: NodeNr) -> NodeHandle<'_> {
        assert!(
            (nr as usize) < self.node_count(),
            "node {nr} is beyond the {} nodes of this tree",
            self.node_count()
        );
        NodeHandle { tree: self, nr }
    }

    /// Handle for attribute `index`
    pub fn attribute(&self, index: usize) -> AttributeHandle<'_> {
        assert!(
            index < self.attribute_count(),
            "attribute {index} is beyond the {} attributes of this tree",
            self.attribute_count()
        );
        AttributeHandle { tree: self, index }
    }

    /// Top-level nodes of the forest
    pub fn roots(&self) -> impl Iterator<Item = NodeHandle<'_>> {
        self.root_index().iter().map(|&nr| NodeHandle { tree: self, nr })
    }

    /// Element holding the given ID value in the document containing `nr`
    pub fn element_by_id(&self, nr: NodeNr, id: &str) -> Option<NodeHandle<'_>> {
        let element = self.document_of(nr)?.ids().lookup(id)?;
        Some(NodeHandle {
            tree: self,
            nr: element,
        })
    }
}

/// A node of a [`TinyTree`]
#[derive(Clone, Copy)]
pub struct NodeHandle<'t> {
    tree: &'t TinyTree,
    nr: NodeNr,
}

impl PartialEq for NodeHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.nr == other.nr
    }
}

impl Eq for NodeHandle<'_> {}

impl fmt::Debug for NodeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("tree", &self.tree.document_number())
            .field("nr", &self.nr)
            .field("kind", &self.tree.kind(self.nr))
            .finish()
    }
}

impl<'t> NodeHandle<'t> {
    #[inline]
    fn at(&self, nr: NodeNr) -> NodeHandle<'t> {
        NodeHandle { tree: self.tree, nr }
    }

    #[inline]
    pub fn nr(&self) -> NodeNr {
        self.nr
    }

    #[inline]
    pub fn tree(&self) -> &'t TinyTree {
        self.tree
    }

    /// Node kind; compressed whitespace reports as text
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.tree.node_kind(self.nr)
    }

    #[inline]
    pub fn name_code(&self) -> NameCode {
        self.tree.name_code(self.nr)
    }

    /// Lexical QName, or None for unnamed kinds
    pub fn display_name(&self) -> Option<String> {
        let code = self.name_code();
        (code != NO_NAME).then(|| self.tree.names().display_name(code))
    }

    pub fn local_name(&self) -> Option<String> {
        let code = self.name_code();
        (code != NO_NAME).then(|| self.tree.names().local_name(code).to_string())
    }

    pub fn namespace_uri(&self) -> Option<String> {
        let code = self.name_code();
        (code != NO_NAME).then(|| self.tree.names().uri(code).to_string())
    }

    #[inline]
    pub fn depth(&self) -> u16 {
        self.tree.depth(self.nr)
    }

    pub fn parent(&self) -> Option<NodeHandle<'t>> {
        self.tree.parent(self.nr).map(|p| self.at(p))
    }

    pub fn next_sibling(&self) -> Option<NodeHandle<'t>> {
        self.tree.next_sibling(self.nr).map(|s| self.at(s))
    }

    pub fn previous_sibling(&self) -> Option<NodeHandle<'t>> {
        self.tree.previous_sibling(self.nr).map(|s| self.at(s))
    }

    pub fn first_child(&self) -> Option<NodeHandle<'t>> {
        self.tree.first_child(self.nr).map(|c| self.at(c))
    }

    pub fn has_children(&self) -> bool {
        self.tree.first_child(self.nr).is_some()
    }

    pub fn children(&self) -> Children<'t> {
        Children {
            tree: self.tree,
            next: self.tree.first_child(self.nr),
        }
    }

    /// Descendants in document order
    pub fn descendants(&self) -> Descendants<'t> {
        Descendants {
            tree: self.tree,
            next: self.nr as usize + 1,
            level: self.depth(),
        }
    }

    /// Ancestors, nearest first
    pub fn ancestors(&self) -> Ancestors<'t> {
        Ancestors {
            tree: self.tree,
            next: self.tree.parent(self.nr),
        }
    }

    /// Root of the tree containing this node
    pub fn root(&self) -> NodeHandle<'t> {
        self.at(self.tree.root_of(self.nr))
    }

    pub fn string_value(&self) -> Cow<'t, str> {
        self.tree.string_value(self.nr)
    }

    pub fn typed_value(&self) -> TreeResult<AtomicSequence> {
        self.tree.typed_value(self.nr)
    }

    pub fn type_annotation(&self) -> TypeCode {
        self.tree.type_annotation(self.nr)
    }

    /// All attributes of an element
    pub fn attributes(&self) -> AttributeScan<'t, NameTest> {
        AttributeScan::new(self.tree, self.nr, NameTest::Any)
    }

    /// Attribute with the given fingerprint
    pub fn attribute(&self, fingerprint: u32) -> Option<AttributeHandle<'t>> {
        AttributeScan::new(self.tree, self.nr, NameTest::Name(fingerprint)).next()
    }

    /// Namespace declarations made on this element
    pub fn declared_namespaces(&self) -> impl Iterator<Item = NamespaceHandle<'t>> {
        let tree = self.tree;
        let start = tree.beta(self.nr) as usize;
        let count = tree.declared_namespaces(self.nr).len();
        (start..start + count).map(move |index| NamespaceHandle { tree, index })
    }

    pub fn in_scope_namespaces(&self) -> Vec<NamespaceBinding> {
        self.tree.in_scope_namespaces(self.nr)
    }

    pub fn line_number(&self) -> Option<u32> {
        self.tree.line_number(self.nr)
    }

    pub fn column_number(&self) -> Option<u32> {
        self.tree.column_number(self.nr)
    }

    pub fn system_id(&self) -> Option<&'t str> {
        self.tree.system_id(self.nr)
    }

    pub fn is_id(&self) -> bool {
        self.kind() == NodeKind::Element && self.tree.is_id_element(self.nr)
    }

    pub fn is_idref(&self) -> bool {
        self.kind() == NodeKind::Element && self.tree.is_idref_element(self.nr)
    }

    pub fn is_nilled(&self) -> bool {
        self.kind() == NodeKind::Element && self.tree.is_nilled(self.nr)
    }

    /// Per-kind view of the node
    ///
    /// # Panics
    ///
    /// On parent-pointer and stopper entries, which are not nodes.
    pub fn materialize(&self) -> NodeView<'t> {
        let tree = self.tree;
        let node = *self;
        match tree.kind(self.nr) {
            NodeKind::Document => match tree.document_info(self.nr) {
                Some(info) => NodeView::Document { node, info },
                None => panic!("document node {} has no document record", self.nr),
            },
            NodeKind::Element => NodeView::Element {
                node,
                name_code: tree.name_code(self.nr),
            },
            NodeKind::Text => NodeView::Text {
                node,
                content: node.string_value(),
            },
            NodeKind::WhitespaceText => NodeView::WhitespaceText {
                node,
                content: node.string_value(),
            },
            NodeKind::Comment => NodeView::Comment {
                node,
                content: node.string_value(),
            },
            NodeKind::ProcessingInstruction => NodeView::ProcessingInstruction {
                node,
                target: tree.name_code(self.nr),
                data: node.string_value(),
            },
            NodeKind::ParentPointer => panic!("Attempting to treat a parent pointer as a node"),
            NodeKind::Stopper => panic!("Attempting to treat the end-of-tree marker as a node"),
        }
    }
}

/// A materialized node, by kind
#[derive(Debug, Clone)]
pub enum NodeView<'t> {
    Document {
        node: NodeHandle<'t>,
        info: &'t DocumentInfo,
    },
    Element {
        node: NodeHandle<'t>,
        name_code: NameCode,
    },
    Text {
        node: NodeHandle<'t>,
        content: Cow<'t, str>,
    },
    /// Whitespace-only text stored in compressed form
    WhitespaceText {
        node: NodeHandle<'t>,
        content: Cow<'t, str>,
    },
    Comment {
        node: NodeHandle<'t>,
        content: Cow<'t, str>,
    },
    ProcessingInstruction {
        node: NodeHandle<'t>,
        target: NameCode,
        data: Cow<'t, str>,
    },
}

impl<'t> NodeView<'t> {
    pub fn node(&self) -> NodeHandle<'t> {
        match self {
            NodeView::Document { node, .. }
            | NodeView::Element { node, .. }
            | NodeView::Text { node, .. }
            | NodeView::WhitespaceText { node, .. }
            | NodeView::Comment { node, .. }
            | NodeView::ProcessingInstruction { node, .. } => *node,
        }
    }
}

/// Children of a node
pub struct Children<'t> {
    tree: &'t TinyTree,
    next: Option<NodeNr>,
}

impl<'t> Iterator for Children<'t> {
    type Item = NodeHandle<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let nr = self.next?;
        self.next = self.tree.next_sibling(nr);
        Some(NodeHandle {
            tree: self.tree,
            nr,
        })
    }
}

/// Descendants of a node, in document order
pub struct Descendants<'t> {
    tree: &'t TinyTree,
    next: usize,
    level: u16,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = NodeHandle<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let nr = self.next;
            if nr >= self.tree.node_count() || self.tree.depth(nr as NodeNr) <= self.level {
                return None;
            }
            self.next += 1;
            if !self.tree.kind(nr as NodeNr).is_marker() {
                return Some(NodeHandle {
                    tree: self.tree,
                    nr: nr as NodeNr,
                });
            }
        }
    }
}

/// Ancestors of a node, nearest first
pub struct Ancestors<'t> {
    tree: &'t TinyTree,
    next: Option<NodeNr>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = NodeHandle<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let nr = self.next?;
        self.next = self.tree.parent(nr);
        Some(NodeHandle {
            tree: self.tree,
            nr,
        })
    }
}

/// An attribute of a [`TinyTree`]
#[derive(Clone, Copy)]
pub struct AttributeHandle<'t> {
    pub(crate) tree: &'t TinyTree,
    pub(crate) index: usize,
}

impl PartialEq for AttributeHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

impl Eq for AttributeHandle<'_> {}

impl fmt::Debug for AttributeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeHandle")
            .field("index", &self.index)
            .field("parent", &self.tree.attribute_parent(self.index))
            .field("value", &self.string_value())
            .finish()
    }
}

impl<'t> AttributeHandle<'t> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent(&self) -> NodeHandle<'t> {
        NodeHandle {
            tree: self.tree,
            nr: self.tree.attribute_parent(self.index),
        }
    }

    pub fn name_code(&self) -> NameCode {
        self.tree.attribute_name_code(self.index)
    }

    pub fn display_name(&self) -> String {
        self.tree.names().display_name(self.name_code())
    }

    pub fn local_name(&self) -> String {
        self.tree.names().local_name(self.name_code()).to_string()
    }

    pub fn string_value(&self) -> &'t str {
        self.tree.attribute_string_value(self.index)
    }

    pub fn type_annotation(&self) -> TypeCode {
        self.tree.attribute_annotation(self.index)
    }

    pub fn typed_value(&self) -> TreeResult<AtomicSequence> {
        self.tree.typed_value_of_attribute(self.index)
    }

    pub fn is_id(&self) -> bool {
        self.tree.is_id_attribute(self.index)
    }

    pub fn is_idref(&self) -> bool {
        self.tree.is_idref_attribute(self.index)
    }
}

/// A namespace declaration of a [`TinyTree`]
#[derive(Debug, Clone, Copy)]
pub struct NamespaceHandle<'t> {
    tree: &'t TinyTree,
    index: usize,
}

impl<'t> NamespaceHandle<'t> {
    pub fn parent(&self) -> NodeHandle<'t> {
        NodeHandle {
            tree: self.tree,
            nr: self.tree.namespace_parent(self.index),
        }
    }

    pub fn binding(&self) -> &'t NamespaceBinding {
        self.tree.namespace_binding(self.index)
    }

    pub fn prefix(&self) -> &'t str {
        self.binding().prefix()
    }

    pub fn uri(&self) -> &'t str {
        self.binding().uri()
    }
}
