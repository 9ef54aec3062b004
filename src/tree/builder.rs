//! Tree Builder - builds a TinyTree from construction events
//!
//! Receives start/end events in document order and appends nodes to a
//! [`TinyTree`]. For each depth it remembers the most recent node, so that
//! a new node can be linked in as the `next` of its preceding sibling, and
//! writes the parent into `next` of the newest child. Long sibling chains
//! get a parent-pointer pseudo-node every few siblings so that finding the
//! parent never walks more than a handful of siblings.
//!
//! Several documents or root elements can be fed to one builder; they form
//! a forest in one tree.

use super::document::DocumentInfo;
use super::kind::{NodeKind, NodeNr, NO_NODE};
use super::properties;
use super::tiny::TinyTree;
use super::whitespace;
use crate::config::{Configuration, TreeFamily};
use crate::names::{NameCode, NamespaceBinding, NO_NAME};
use crate::types::{type_fingerprint, TypeCode, TYPECODE_IDREF, XS_UNTYPED};
use std::sync::Arc;
use tracing::debug;

/// Siblings after which a parent-pointer pseudo-node is inserted
pub const PARENT_POINTER_INTERVAL: u32 = 10;

/// Builds a [`TinyTree`] from construction events
#[derive(Debug)]
pub struct TinyBuilder {
    tree: TinyTree,
    family: TreeFamily,
    system_id: Option<String>,
    base_uri: Option<String>,
    /// Depth the next node is added at
    current_depth: u16,
    /// Most recent node at each depth, NO_NODE if none yet
    prev_at_depth: Vec<NodeNr>,
    siblings_at_depth: Vec<u32>,
    /// Whether each open element must be indexed as an ID at its end
    id_elements: Vec<bool>,
    /// Element receiving attributes and namespaces
    current_element: NodeNr,
    current_root: NodeNr,
    in_start_tag: bool,
    nested_documents: u32,
    location: (u32, u32),
}

impl TinyBuilder {
    /// Builder for a source document
    pub fn new(config: Arc<Configuration>) -> Self {
        Self::with_family(config, TreeFamily::Source)
    }

    /// Builder whose tree is sized from, and reported to, `family`'s hints
    pub fn with_family(config: Arc<Configuration>, family: TreeFamily) -> Self {
        let line_numbering = config.line_numbering();
        let mut tree = TinyTree::new(config, family);
        if line_numbering {
            tree.set_line_numbering();
        }
        TinyBuilder {
            tree,
            family,
            system_id: None,
            base_uri: None,
            current_depth: 0,
            prev_at_depth: vec![NO_NODE; 16],
            siblings_at_depth: vec![0; 16],
            id_elements: Vec::new(),
            current_element: NO_NODE,
            current_root: NO_NODE,
            in_start_tag: false,
            nested_documents: 0,
            location: (0, 0),
        }
    }

    /// The tree built so far
    pub fn tree(&self) -> &TinyTree {
        &self.tree
    }

    /// System id recorded for documents and root elements started after this
    pub fn set_system_id(&mut self, system_id: &str) {
        self.system_id = Some(system_id.to_string());
    }

    pub fn set_base_uri(&mut self, base_uri: &str) {
        self.base_uri = Some(base_uri.to_string());
    }

    /// Location applied to the next node, when line numbering is on
    pub fn set_location(&mut self, line: u32, column: u32) {
        self.location = (line, column);
    }

    pub fn current_depth(&self) -> u16 {
        self.current_depth
    }

    pub fn start_document(&mut self) {
        if self.current_depth > 0 {
            self.nested_documents += 1;
            return;
        }
        let mut info = DocumentInfo::new(self.system_id.as_deref());
        if let Some(base) = &self.base_uri {
            info.set_base_uri(base);
        }
        let nr = self.tree.add_document_node(info);
        if let Some(system_id) = &self.system_id {
            self.tree.set_system_id(nr, system_id);
        }
        self.prev_at_depth[0] = nr;
        self.prev_at_depth[1] = NO_NODE;
        self.siblings_at_depth[0] = 0;
        self.siblings_at_depth[1] = 0;
        self.current_root = nr;
        self.current_depth = 1;
    }

    pub fn end_document(&mut self) {
        if self.nested_documents > 0 {
            self.nested_documents -= 1;
            return;
        }
        if self.current_depth != 1 {
            return;
        }
        self.prev_at_depth[1] = NO_NODE;
        self.current_depth = 0;
    }

    /// Start an element. Attributes and namespaces follow, then
    /// [`start_content`](Self::start_content).
    ///
    /// # Panics
    ///
    /// When the element would sit deeper than `u16::MAX` levels.
    pub fn start_element(&mut self, name_code: NameCode, type_code: TypeCode, props: u32) -> NodeNr {
        assert!(
            self.current_depth < u16::MAX,
            "element nesting exceeds {} levels",
            u16::MAX
        );
        let depth = self.current_depth as usize;
        if depth > 0 && self.siblings_at_depth[depth] > PARENT_POINTER_INTERVAL {
            let parent = self.prev_at_depth[depth - 1];
            let pp = self
                .tree
                .add_node(NodeKind::ParentPointer, self.current_depth, parent, 0, 0);
            let prev = self.prev_at_depth[depth];
            if prev != NO_NODE {
                self.tree.set_next(prev, pp);
            }
            self.tree.set_next(pp, parent);
            self.prev_at_depth[depth] = pp;
            self.siblings_at_depth[depth] = 0;
        }

        let nr = self
            .tree
            .add_node(NodeKind::Element, self.current_depth, NO_NODE, NO_NODE, name_code);

        let mut is_id = props & properties::IS_ID != 0;
        let mut annotation = type_code;
        if props & properties::IS_IDREF != 0 {
            annotation |= TYPECODE_IDREF;
        }
        if type_fingerprint(type_code) != XS_UNTYPED || annotation != type_code {
            self.tree.set_element_annotation(nr, annotation);
            if !is_id && self.tree.config().types().is_id_code(type_code) {
                is_id = true;
            }
        }
        if props & properties::NILLED != 0 {
            self.tree.set_nilled(nr);
        }
        self.id_elements.push(is_id);

        self.link(nr);
        if depth == 0 {
            self.current_root = nr;
        }
        self.current_depth += 1;
        let next = self.current_depth as usize;
        if next >= self.prev_at_depth.len() {
            self.prev_at_depth.resize(next * 2, NO_NODE);
            self.siblings_at_depth.resize(next * 2, 0);
        }
        self.prev_at_depth[next] = NO_NODE;
        self.siblings_at_depth[next] = 0;

        if self.current_depth == 1 {
            if let Some(system_id) = &self.system_id {
                self.tree.set_system_id(nr, system_id);
            }
        }
        self.record_location(nr);
        self.current_element = nr;
        self.in_start_tag = true;
        nr
    }

    /// Declare a namespace on the element just started
    pub fn namespace(&mut self, binding: NamespaceBinding) {
        debug_assert!(self.in_start_tag, "namespace outside a start tag");
        self.tree.add_namespace(self.current_element, binding);
    }

    /// Add an attribute to the element just started
    pub fn attribute(&mut self, name_code: NameCode, type_code: TypeCode, value: &str, props: u32) {
        debug_assert!(self.in_start_tag, "attribute outside a start tag");
        self.tree.add_attribute(
            self.current_root,
            self.current_element,
            name_code,
            type_code,
            value,
            props,
        );
    }

    /// End of the attributes and namespaces of the current element
    pub fn start_content(&mut self) {
        self.in_start_tag = false;
    }

    pub fn end_element(&mut self) {
        self.in_start_tag = false;
        let depth = self.current_depth as usize;
        self.prev_at_depth[depth] = NO_NODE;
        self.siblings_at_depth[depth] = 0;
        self.current_depth -= 1;
        if self.id_elements.pop() == Some(true) {
            let element = self.prev_at_depth[self.current_depth as usize];
            self.tree.index_id_element(self.current_root, element);
        }
    }

    /// Character data. Adjacent text is merged into one node; a whole
    /// whitespace-only text node is stored compressed when it fits.
    pub fn characters(&mut self, text: &str, props: u32) {
        self.in_start_tag = false;
        if text.is_empty() {
            return;
        }
        if props & properties::WHOLE_TEXT_NODE != 0 {
            if let Some(packed) = whitespace::compress(text) {
                let (alpha, beta) = whitespace::split(packed);
                let nr = self.tree.add_node(
                    NodeKind::WhitespaceText,
                    self.current_depth,
                    alpha,
                    beta,
                    NO_NAME,
                );
                self.link(nr);
                self.record_location(nr);
                return;
            }
        }
        let (start, len) = self.tree.append_chars(text);
        let count = self.tree.node_count();
        if count > 0 {
            let last = (count - 1) as NodeNr;
            if self.tree.kind(last) == NodeKind::Text && self.tree.depth(last) == self.current_depth {
                self.tree.extend_text_node(last, len);
                return;
            }
        }
        let nr = self
            .tree
            .add_node(NodeKind::Text, self.current_depth, start, len, NO_NAME);
        self.link(nr);
        self.record_location(nr);
    }

    pub fn comment(&mut self, text: &str) {
        self.in_start_tag = false;
        let (start, len) = self.tree.append_comment_text(text);
        let nr = self
            .tree
            .add_node(NodeKind::Comment, self.current_depth, start, len, NO_NAME);
        self.link(nr);
        self.record_location(nr);
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) {
        self.in_start_tag = false;
        let name_code = self.tree.names().allocate("", "", target);
        let (start, len) = self.tree.append_comment_text(data);
        let nr = self.tree.add_node(
            NodeKind::ProcessingInstruction,
            self.current_depth,
            start,
            len,
            name_code,
        );
        self.link(nr);
        if let Some(system_id) = &self.system_id {
            self.tree.set_system_id(nr, system_id);
        }
        self.record_location(nr);
    }

    /// Append the stopper, condense, and hand over the tree
    pub fn close(mut self) -> TinyTree {
        self.tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);
        self.tree.condense(self.family);
        debug!(
            nodes = self.tree.node_count(),
            attributes = self.tree.attribute_count(),
            namespaces = self.tree.namespace_count(),
            roots = self.tree.root_index().len(),
            "tree built"
        );
        self.tree
    }

    /// Link a new node in as the last child of the current parent
    fn link(&mut self, nr: NodeNr) {
        let depth = self.current_depth as usize;
        if depth == 0 {
            self.prev_at_depth[0] = nr;
            self.current_root = nr;
            return;
        }
        let prev = self.prev_at_depth[depth];
        if prev != NO_NODE {
            self.tree.set_next(prev, nr);
        }
        self.tree.set_next(nr, self.prev_at_depth[depth - 1]);
        self.prev_at_depth[depth] = nr;
        self.siblings_at_depth[depth] += 1;
    }

    fn record_location(&mut self, nr: NodeNr) {
        let (line, column) = self.location;
        if line > 0 {
            self.tree.set_line_number(nr, line, column);
        }
    }
}
