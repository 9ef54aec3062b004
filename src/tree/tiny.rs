//! TinyTree - node arena
//!
//! A tree is a set of parallel arrays indexed by node number. Navigation is
//! array indexing: there are no per-node heap objects.
//!
//! Memory layout per node: 1 byte kind, 2 bytes depth, 4 × u32 (next,
//! alpha, beta, name code). Attributes and namespaces live in their own
//! arrays, each with a `parent` column; the run belonging to one element is
//! contiguous and starts at the element's `alpha` (attributes) or `beta`
//! (namespaces).
//!
//! `next` is overloaded: it holds the next sibling when one exists, and
//! otherwise the parent. The overload is only visible through
//! [`TinyTree::next_link`].

use super::cache::SlotCache;
use super::document::DocumentInfo;
use super::kind::{NodeKind, NodeNr, NO_NODE};
use super::properties;
use super::whitespace;
use crate::config::{Configuration, TreeFamily};
use crate::error::{TreeError, TreeResult};
use crate::names::{self, NameCode, NamePool, NamespaceBinding, NO_NAME, XML_ID};
use crate::types::{
    type_fingerprint, AtomicSequence, AtomicValue, TypeCode, FIRST_USER_TYPE, TYPECODE_ID,
    TYPECODE_IDREF, TYPECODE_NILLED, XS_ANY_TYPE, XS_ANY_URI, XS_ID, XS_IDREF, XS_IDREFS,
    XS_STRING, XS_UNTYPED, XS_UNTYPED_ATOMIC,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::borrow::Cow;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Node arrays never grow to fewer than this many slots
const MIN_NODE_CAPACITY: usize = 16;

/// First allocation for the attribute and namespace arrays
const INITIAL_SECONDARY_CAPACITY: usize = 10;

/// Wasted node slots that justify condensing regardless of ratio
const NODE_WASTE_LIMIT: usize = 20_000;

/// Wasted attribute or namespace slots that justify condensing
const SECONDARY_WASTE_LIMIT: usize = 1_000;

/// Where a node's `next` field points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// A following sibling (or a parent-pointer pseudo-node in the chain)
    Sibling(NodeNr),
    /// No following sibling; this is the parent
    Parent(NodeNr),
    /// Unset: roots and the stopper
    None,
}

/// System ids attached to ranges of nodes
///
/// Entries are (first node, uri) in node order; a node's system id is that
/// of the last entry starting at or before it.
#[derive(Debug, Default)]
struct SystemIdMap {
    entries: Vec<(NodeNr, Arc<str>)>,
}

impl SystemIdMap {
    fn set(&mut self, nr: NodeNr, uri: &str) {
        if let Some((start, last)) = self.entries.last_mut() {
            if last.as_ref() == uri {
                return;
            }
            if *start == nr {
                *last = Arc::from(uri);
                return;
            }
        }
        self.entries.push((nr, Arc::from(uri)));
    }

    fn get(&self, nr: NodeNr) -> Option<&str> {
        let i = self.entries.partition_point(|(start, _)| *start <= nr);
        i.checked_sub(1).map(|i| self.entries[i].1.as_ref())
    }
}

/// A compact, append-only tree (or forest of trees)
#[derive(Debug)]
pub struct TinyTree {
    config: Arc<Configuration>,
    documents: Vec<DocumentInfo>,
    document_number: u64,

    /// Text node content
    chars: String,
    /// Comment and processing-instruction content
    comments: String,

    kind: Vec<NodeKind>,
    depth: Vec<u16>,
    next: Vec<NodeNr>,
    alpha: Vec<u32>,
    beta: Vec<u32>,
    name_code: Vec<NameCode>,
    /// Allocated on the first annotation other than xs:untyped
    type_codes: Option<Vec<TypeCode>>,
    typed_values: SlotCache<AtomicSequence>,

    prior: RwLock<Vec<NodeNr>>,
    writing_prior: AtomicBool,

    att_parent: Vec<NodeNr>,
    att_code: Vec<NameCode>,
    att_value: Vec<Box<str>>,
    /// Allocated on the first attribute annotation other than xs:untypedAtomic
    att_types: Option<Vec<TypeCode>>,
    att_typed_values: SlotCache<AtomicSequence>,

    ns_parent: Vec<NodeNr>,
    ns_binding: Vec<NamespaceBinding>,

    root_index: Vec<NodeNr>,
    /// (line, column) per node; 0 means unknown
    line_numbers: Option<Vec<(u32, u32)>>,
    system_ids: SystemIdMap,
    uses_namespaces: bool,
}

impl TinyTree {
    /// Create an empty tree pre-sized from the family's sizing hints
    pub fn new(config: Arc<Configuration>, family: TreeFamily) -> Self {
        let (nodes, attributes, namespaces, chars) =
            config.statistics(family).lock().initial_capacities();
        Self::with_capacity(config, nodes, attributes, namespaces, chars)
    }

    /// Create an empty tree with explicit initial capacities
    pub fn with_capacity(
        config: Arc<Configuration>,
        nodes: usize,
        attributes: usize,
        namespaces: usize,
        chars: usize,
    ) -> Self {
        TinyTree {
            config,
            documents: Vec::new(),
            document_number: 0,
            chars: String::with_capacity(chars),
            comments: String::new(),
            kind: Vec::with_capacity(nodes),
            depth: Vec::with_capacity(nodes),
            next: Vec::with_capacity(nodes),
            alpha: Vec::with_capacity(nodes),
            beta: Vec::with_capacity(nodes),
            name_code: Vec::with_capacity(nodes),
            type_codes: None,
            typed_values: SlotCache::new(),
            prior: RwLock::new(Vec::new()),
            writing_prior: AtomicBool::new(false),
            att_parent: Vec::with_capacity(attributes),
            att_code: Vec::with_capacity(attributes),
            att_value: Vec::with_capacity(attributes),
            att_types: None,
            att_typed_values: SlotCache::new(),
            ns_parent: Vec::with_capacity(namespaces),
            ns_binding: Vec::with_capacity(namespaces),
            root_index: Vec::with_capacity(5),
            line_numbers: None,
            system_ids: SystemIdMap::default(),
            uses_namespaces: false,
        }
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn names(&self) -> &NamePool {
        self.config.names()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Append a node. Returns its node number.
    ///
    /// # Panics
    ///
    /// If the preceding-sibling index is being built.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        depth: u16,
        alpha: u32,
        beta: u32,
        name_code: NameCode,
    ) -> NodeNr {
        assert!(
            !*self.writing_prior.get_mut(),
            "Adding new node while writing prior index"
        );
        self.ensure_node_capacity(kind);
        let nr = self.kind.len() as NodeNr;
        self.kind.push(kind);
        self.depth.push(depth);
        self.next.push(NO_NODE);
        self.alpha.push(alpha);
        self.beta.push(beta);
        self.name_code.push(name_code);
        if self.type_codes.is_some() {
            self.node_types_mut();
        }
        if let Some(lines) = &mut self.line_numbers {
            lines.push((0, 0));
        }
        if nr == 0 {
            self.document_number = self.config.allocate_document_number();
        }
        if depth == 0 && kind != NodeKind::Stopper {
            self.root_index.push(nr);
        }
        self.typed_values.invalidate_below(self.kind.len());
        nr
    }

    /// Append a document node owning `info`
    pub fn add_document_node(&mut self, info: DocumentInfo) -> NodeNr {
        self.documents.push(info);
        let index = (self.documents.len() - 1) as u32;
        self.add_node(NodeKind::Document, 0, index, 0, NO_NAME)
    }

    /// Append an attribute to `parent`.
    ///
    /// Attributes of one element must be added in one unbroken run. When
    /// `root` is a document node, ID attributes are trimmed, checked and
    /// registered in that document's ID table; IDREF attributes get the
    /// IDREF flag on their type code.
    pub fn add_attribute(
        &mut self,
        root: NodeNr,
        parent: NodeNr,
        name_code: NameCode,
        type_code: TypeCode,
        value: &str,
        props: u32,
    ) {
        debug_assert!(
            self.att_parent
                .last()
                .is_none_or(|&p| p == parent || self.alpha[parent as usize] == NO_NODE),
            "attributes of element {parent} are not contiguous"
        );
        self.ensure_attribute_capacity();
        let index = self.att_parent.len();
        self.att_parent.push(parent);
        self.att_code.push(name_code);
        self.att_value.push(value.into());
        self.att_typed_values.invalidate_below(index + 1);

        if type_code != XS_UNTYPED_ATOMIC || self.att_types.is_some() {
            self.attribute_types_mut()[index] = type_code;
        }
        if self.alpha[parent as usize] == NO_NODE {
            self.alpha[parent as usize] = index as u32;
        }

        if self.kind[root as usize] != NodeKind::Document {
            return;
        }
        let is_id = props & properties::IS_ID != 0
            || names::fingerprint(name_code) == XML_ID
            || self.config.types().is_id_code(type_code);
        if is_id {
            let id = names::trim_whitespace(value);
            self.att_value[index] = id.into();
            if names::is_valid_ncname(id) {
                let doc = self.alpha[root as usize] as usize;
                self.documents[doc].ids_mut().register(id, parent);
                self.attribute_types_mut()[index] |= TYPECODE_ID;
            } else {
                debug!(value = id, "ID attribute value is not an NCName, treated as untyped");
                if let Some(types) = &mut self.att_types {
                    types[index] = XS_UNTYPED_ATOMIC;
                }
            }
        }
        if props & properties::IS_IDREF != 0 {
            self.attribute_types_mut()[index] |= TYPECODE_IDREF;
        }
    }

    /// Append a namespace declaration to `parent`
    pub fn add_namespace(&mut self, parent: NodeNr, binding: NamespaceBinding) {
        self.ensure_namespace_capacity();
        let index = self.ns_parent.len();
        if !binding.is_xml_namespace() {
            self.uses_namespaces = true;
        }
        self.ns_parent.push(parent);
        self.ns_binding.push(binding);
        if self.beta[parent as usize] == NO_NODE {
            self.beta[parent as usize] = index as u32;
        }
    }

    /// Append text to the character buffer; returns (offset, length)
    pub fn append_chars(&mut self, text: &str) -> (u32, u32) {
        let start = self.chars.len() as u32;
        self.chars.push_str(text);
        (start, text.len() as u32)
    }

    /// Append comment or PI content; returns (offset, length)
    pub fn append_comment_text(&mut self, text: &str) -> (u32, u32) {
        let start = self.comments.len() as u32;
        self.comments.push_str(text);
        (start, text.len() as u32)
    }

    /// Grow text node `nr` by `len` bytes just appended to the buffer
    pub fn extend_text_node(&mut self, nr: NodeNr, len: u32) {
        debug_assert_eq!(self.kind[nr as usize], NodeKind::Text);
        self.beta[nr as usize] += len;
    }

    /// Set a node's `next` field: a following sibling or the parent
    pub fn set_next(&mut self, nr: NodeNr, next: NodeNr) {
        self.next[nr as usize] = next;
    }

    /// Record the type annotation of an element
    pub fn set_element_annotation(&mut self, nr: NodeNr, type_code: TypeCode) {
        if type_code != XS_UNTYPED {
            self.node_types_mut()[nr as usize] = type_code;
        }
    }

    /// Mark an element as nilled
    pub fn set_nilled(&mut self, nr: NodeNr) {
        self.node_types_mut()[nr as usize] |= TYPECODE_NILLED;
    }

    /// Register an element of an ID type in its document's ID table
    pub fn index_id_element(&mut self, root: NodeNr, nr: NodeNr) {
        if self.kind[root as usize] != NodeKind::Document {
            return;
        }
        let id = names::trim_whitespace(&self.string_value(nr)).to_string();
        if names::is_valid_ncname(&id) {
            let doc = self.alpha[root as usize] as usize;
            self.documents[doc].ids_mut().register(&id, nr);
            self.node_types_mut()[nr as usize] |= TYPECODE_ID;
        }
    }

    /// Start recording line and column numbers
    pub fn set_line_numbering(&mut self) {
        if self.line_numbers.is_none() {
            let mut lines = Vec::with_capacity(self.kind.capacity());
            lines.resize(self.kind.len(), (0, 0));
            self.line_numbers = Some(lines);
        }
    }

    /// Set the location of a node. Ignored unless line numbering is on.
    pub fn set_line_number(&mut self, nr: NodeNr, line: u32, column: u32) {
        if let Some(lines) = &mut self.line_numbers {
            lines[nr as usize] = (line, column);
        }
    }

    /// Set the system id of a node and, implicitly, of the nodes after it
    pub fn set_system_id(&mut self, nr: NodeNr, uri: &str) {
        self.system_ids.set(nr, uri);
    }

    fn node_types_mut(&mut self) -> &mut Vec<TypeCode> {
        let len = self.kind.len();
        let cap = self.kind.capacity();
        let codes = self.type_codes.get_or_insert_with(|| Vec::with_capacity(cap));
        codes.resize(len, XS_UNTYPED);
        codes
    }

    fn attribute_types_mut(&mut self) -> &mut Vec<TypeCode> {
        let len = self.att_parent.len();
        let cap = self.att_parent.capacity();
        let codes = self.att_types.get_or_insert_with(|| Vec::with_capacity(cap));
        codes.resize(len, XS_UNTYPED_ATOMIC);
        codes
    }

    // ------------------------------------------------------------------
    // Growth and condensation
    // ------------------------------------------------------------------

    fn ensure_node_capacity(&mut self, kind: NodeKind) {
        let len = self.kind.len();
        if len < self.kind.capacity() {
            return;
        }
        let target = if kind == NodeKind::Stopper {
            len + 1
        } else {
            (len * 2).max(MIN_NODE_CAPACITY)
        };
        let extra = target - len;
        trace!(from = len, to = target, "growing node arrays");
        self.kind.reserve_exact(extra);
        self.depth.reserve_exact(extra);
        self.next.reserve_exact(extra);
        self.alpha.reserve_exact(extra);
        self.beta.reserve_exact(extra);
        self.name_code.reserve_exact(extra);
        if let Some(codes) = &mut self.type_codes {
            codes.reserve_exact(target.saturating_sub(codes.len()));
        }
        if let Some(lines) = &mut self.line_numbers {
            lines.reserve_exact(extra);
        }
    }

    fn ensure_attribute_capacity(&mut self) {
        let len = self.att_parent.len();
        if len < self.att_parent.capacity() {
            return;
        }
        let target = if len == 0 {
            INITIAL_SECONDARY_CAPACITY
        } else {
            len * 2
        };
        let extra = target - len;
        trace!(from = len, to = target, "growing attribute arrays");
        self.att_parent.reserve_exact(extra);
        self.att_code.reserve_exact(extra);
        self.att_value.reserve_exact(extra);
        if let Some(codes) = &mut self.att_types {
            codes.reserve_exact(target.saturating_sub(codes.len()));
        }
    }

    fn ensure_namespace_capacity(&mut self) {
        let len = self.ns_parent.len();
        if len < self.ns_parent.capacity() {
            return;
        }
        let target = if len == 0 {
            INITIAL_SECONDARY_CAPACITY
        } else {
            len * 2
        };
        trace!(from = len, to = target, "growing namespace arrays");
        self.ns_parent.reserve_exact(target - len);
        self.ns_binding.reserve_exact(target - len);
    }

    /// Release unused capacity once the tree is finished, and feed this
    /// tree's final size back into the family's sizing hints.
    ///
    /// Trees holding more than one root are left alone unless the
    /// configuration allows condensing forests.
    pub fn condense(&mut self, family: TreeFamily) {
        if self.root_index.len() > 1 && !self.config.condense_forests() {
            return;
        }
        let before = self.capacity_bytes();

        let nodes = self.kind.len();
        let cap = self.kind.capacity();
        if nodes * 3 < cap || cap - nodes > NODE_WASTE_LIMIT {
            let k = nodes + 1;
            self.kind.shrink_to(k);
            self.depth.shrink_to(k);
            self.next.shrink_to(k);
            self.alpha.shrink_to(k);
            self.beta.shrink_to(k);
            self.name_code.shrink_to(k);
            if let Some(codes) = &mut self.type_codes {
                codes.shrink_to(k);
            }
            if let Some(lines) = &mut self.line_numbers {
                lines.shrink_to(k);
            }
        }

        let atts = self.att_parent.len();
        let cap = self.att_parent.capacity();
        if atts * 3 < cap || cap - atts > SECONDARY_WASTE_LIMIT {
            self.att_parent.shrink_to_fit();
            self.att_code.shrink_to_fit();
            self.att_value.shrink_to_fit();
            if let Some(codes) = &mut self.att_types {
                codes.shrink_to_fit();
            }
        }

        let namespaces = self.ns_parent.len();
        let cap = self.ns_parent.capacity();
        if namespaces * 3 < cap || cap - namespaces > SECONDARY_WASTE_LIMIT {
            self.ns_parent.shrink_to_fit();
            self.ns_binding.shrink_to_fit();
        }

        self.config
            .statistics(family)
            .lock()
            .update(nodes, atts, namespaces, self.chars.len());
        debug!(
            nodes,
            attributes = atts,
            namespaces,
            chars = self.chars.len(),
            bytes_before = before,
            bytes_after = self.capacity_bytes(),
            "condensed tree"
        );
    }

    /// Approximate bytes held by the arrays (allocated, not used)
    pub fn capacity_bytes(&self) -> usize {
        use std::mem::size_of;
        let nodes = self.kind.capacity()
            + self.depth.capacity() * size_of::<u16>()
            + (self.next.capacity()
                + self.alpha.capacity()
                + self.beta.capacity()
                + self.name_code.capacity())
                * size_of::<u32>()
            + self.type_codes.as_ref().map_or(0, |c| c.capacity() * size_of::<u32>())
            + self
                .line_numbers
                .as_ref()
                .map_or(0, |c| c.capacity() * size_of::<(u32, u32)>());
        let attributes = (self.att_parent.capacity() + self.att_code.capacity()) * size_of::<u32>()
            + self.att_value.capacity() * size_of::<Box<str>>()
            + self.att_types.as_ref().map_or(0, |c| c.capacity() * size_of::<u32>());
        let namespaces = self.ns_parent.capacity() * size_of::<u32>()
            + self.ns_binding.capacity() * size_of::<NamespaceBinding>();
        nodes + attributes + namespaces + self.chars.capacity() + self.comments.capacity()
    }

    pub fn node_capacity(&self) -> usize {
        self.kind.capacity()
    }

    pub fn attribute_capacity(&self) -> usize {
        self.att_parent.capacity()
    }

    pub fn namespace_capacity(&self) -> usize {
        self.ns_parent.capacity()
    }

    // ------------------------------------------------------------------
    // Node arrays
    // ------------------------------------------------------------------

    /// Number of entries in the node arrays, markers included
    #[inline]
    pub fn node_count(&self) -> usize {
        self.kind.len()
    }

    #[inline]
    pub fn attribute_count(&self) -> usize {
        self.att_parent.len()
    }

    #[inline]
    pub fn namespace_count(&self) -> usize {
        self.ns_parent.len()
    }

    /// Raw kind, including whitespace-text and marker kinds
    #[inline]
    pub fn kind(&self, nr: NodeNr) -> NodeKind {
        self.kind[nr as usize]
    }

    /// Kind with compressed whitespace reported as text
    #[inline]
    pub fn node_kind(&self, nr: NodeNr) -> NodeKind {
        self.kind[nr as usize].public_kind()
    }

    #[inline]
    pub fn depth(&self, nr: NodeNr) -> u16 {
        self.depth[nr as usize]
    }

    #[inline]
    pub fn name_code(&self, nr: NodeNr) -> NameCode {
        self.name_code[nr as usize]
    }

    #[inline]
    pub fn alpha(&self, nr: NodeNr) -> u32 {
        self.alpha[nr as usize]
    }

    #[inline]
    pub fn beta(&self, nr: NodeNr) -> u32 {
        self.beta[nr as usize]
    }

    /// The `next` field, decoded
    #[inline]
    pub fn next_link(&self, nr: NodeNr) -> Next {
        match self.next[nr as usize] {
            NO_NODE => Next::None,
            n if n > nr => Next::Sibling(n),
            n => Next::Parent(n),
        }
    }

    /// Unique number of this tree within its configuration
    pub fn document_number(&self) -> u64 {
        self.document_number
    }

    /// Whether any namespace other than `xml` is declared anywhere
    pub fn uses_namespaces(&self) -> bool {
        self.uses_namespaces
    }

    /// Top-level nodes, in node order
    pub fn root_index(&self) -> &[NodeNr] {
        &self.root_index
    }

    /// Text buffer shared by all text nodes
    pub fn character_buffer(&self) -> &str {
        &self.chars
    }

    /// Owning root of a node: the last root at or before it
    pub fn root_of(&self, nr: NodeNr) -> NodeNr {
        self.root_index
            .iter()
            .rev()
            .find(|&&r| r <= nr)
            .copied()
            .unwrap_or(0)
    }

    /// Record of a document node
    pub fn document_info(&self, nr: NodeNr) -> Option<&DocumentInfo> {
        match self.kind[nr as usize] {
            NodeKind::Document => self.documents.get(self.alpha[nr as usize] as usize),
            _ => None,
        }
    }

    /// Record of the document containing a node, if its root is a document
    pub fn document_of(&self, nr: NodeNr) -> Option<&DocumentInfo> {
        self.document_info(self.root_of(nr))
    }

    pub fn documents(&self) -> &[DocumentInfo] {
        &self.documents
    }

    /// Type annotation of a node, without flag bits
    pub fn type_annotation(&self, nr: NodeNr) -> TypeCode {
        match &self.type_codes {
            Some(codes) => type_fingerprint(codes[nr as usize]),
            None => XS_UNTYPED,
        }
    }

    pub fn is_nilled(&self, nr: NodeNr) -> bool {
        self.type_codes
            .as_ref()
            .is_some_and(|codes| codes[nr as usize] & TYPECODE_NILLED != 0)
    }

    pub fn line_number(&self, nr: NodeNr) -> Option<u32> {
        self.location(nr).map(|(line, _)| line)
    }

    pub fn column_number(&self, nr: NodeNr) -> Option<u32> {
        self.location(nr).map(|(_, column)| column)
    }

    /// Location of the nearest node at or before `nr` with a known line
    fn location(&self, nr: NodeNr) -> Option<(u32, u32)> {
        let lines = self.line_numbers.as_ref()?;
        lines[..=nr as usize]
            .iter()
            .rev()
            .find(|(line, _)| *line > 0)
            .copied()
    }

    pub fn system_id(&self, nr: NodeNr) -> Option<&str> {
        self.system_ids.get(nr)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    #[inline]
    fn is_deeper(&self, nr: usize, level: u16) -> bool {
        nr < self.kind.len() && self.depth[nr] > level
    }

    /// Parent of a node, found by following the `next` chain
    pub fn parent(&self, nr: NodeNr) -> Option<NodeNr> {
        if self.depth[nr as usize] == 0 {
            return None;
        }
        let mut p = nr;
        loop {
            match self.next_link(p) {
                Next::Sibling(s) if self.kind[s as usize] == NodeKind::ParentPointer => {
                    return Some(self.alpha[s as usize]);
                }
                Next::Sibling(s) => p = s,
                Next::Parent(parent) => return Some(parent),
                Next::None => return None,
            }
        }
    }

    pub fn next_sibling(&self, nr: NodeNr) -> Option<NodeNr> {
        let mut p = nr;
        loop {
            match self.next_link(p) {
                Next::Sibling(s) if self.kind[s as usize] == NodeKind::ParentPointer => p = s,
                Next::Sibling(s) => return Some(s),
                _ => return None,
            }
        }
    }

    pub fn previous_sibling(&self, nr: NodeNr) -> Option<NodeNr> {
        if self.depth[nr as usize] == 0 {
            return None;
        }
        let prior = self.prior_index();
        let mut p = prior[nr as usize];
        while p != NO_NODE && self.kind[p as usize] == NodeKind::ParentPointer {
            p = prior[p as usize];
        }
        (p != NO_NODE).then_some(p)
    }

    pub fn first_child(&self, nr: NodeNr) -> Option<NodeNr> {
        if !self.kind[nr as usize].is_parent() {
            return None;
        }
        let child = nr as usize + 1;
        self.is_deeper(child, self.depth[nr as usize])
            .then_some(child as NodeNr)
    }

    /// Parent computed from the preceding-sibling index: the node before
    /// the first sibling
    pub fn parent_by_prior(&self, nr: NodeNr) -> Option<NodeNr> {
        if self.depth[nr as usize] == 0 {
            return None;
        }
        let prior = self.prior_index();
        let mut first = nr;
        while prior[first as usize] != NO_NODE {
            first = prior[first as usize];
        }
        Some(first - 1)
    }

    /// The preceding-sibling index, built or rebuilt if it does not cover
    /// every node
    pub fn prior_index(&self) -> RwLockReadGuard<'_, Vec<NodeNr>> {
        let count = self.kind.len();
        let prior = self.prior.read();
        if prior.len() >= count {
            return prior;
        }
        drop(prior);
        let mut prior = self.prior.write();
        if prior.len() < count {
            self.writing_prior.store(true, Ordering::Release);
            let mut index = vec![NO_NODE; count];
            for (i, &n) in self.next.iter().enumerate() {
                if n != NO_NODE && n as usize > i {
                    index[n as usize] = i as NodeNr;
                }
            }
            *prior = index;
            self.writing_prior.store(false, Ordering::Release);
            debug!(nodes = count, "built preceding-sibling index");
        }
        RwLockWriteGuard::downgrade(prior)
    }

    /// Whether the preceding-sibling index currently covers every node
    pub fn has_prior_index(&self) -> bool {
        self.prior.read().len() >= self.kind.len()
    }

    // ------------------------------------------------------------------
    // String values
    // ------------------------------------------------------------------

    fn text_slice(&self, nr: usize) -> &str {
        let start = self.alpha[nr] as usize;
        &self.chars[start..start + self.beta[nr] as usize]
    }

    fn comment_slice(&self, nr: usize) -> &str {
        let start = self.alpha[nr] as usize;
        &self.comments[start..start + self.beta[nr] as usize]
    }

    fn whitespace(&self, nr: usize) -> u64 {
        whitespace::join(self.alpha[nr], self.beta[nr])
    }

    /// String value of a node: its own text, or the concatenated text of
    /// its descendants
    ///
    /// # Panics
    ///
    /// On a marker node.
    pub fn string_value(&self, nr: NodeNr) -> Cow<'_, str> {
        let n = nr as usize;
        match self.kind[n] {
            NodeKind::Text => Cow::Borrowed(self.text_slice(n)),
            NodeKind::WhitespaceText => Cow::Owned(whitespace::expand(self.whitespace(n))),
            NodeKind::Comment | NodeKind::ProcessingInstruction => {
                Cow::Borrowed(self.comment_slice(n))
            }
            NodeKind::Element | NodeKind::Document => {
                let level = self.depth[n];
                let first = n + 1;
                if !self.is_deeper(first, level) {
                    return Cow::Borrowed("");
                }
                if !self.is_deeper(first + 1, level) {
                    match self.kind[first] {
                        NodeKind::Text => return Cow::Borrowed(self.text_slice(first)),
                        NodeKind::WhitespaceText => {
                            return Cow::Owned(whitespace::expand(self.whitespace(first)))
                        }
                        _ => {}
                    }
                }
                let mut out = String::new();
                let mut i = first;
                while self.is_deeper(i, level) {
                    match self.kind[i] {
                        NodeKind::Text => out.push_str(self.text_slice(i)),
                        NodeKind::WhitespaceText => {
                            whitespace::expand_into(self.whitespace(i), &mut out)
                        }
                        _ => {}
                    }
                    i += 1;
                }
                Cow::Owned(out)
            }
            NodeKind::ParentPointer | NodeKind::Stopper => {
                panic!("node {nr} is an internal marker and has no string value")
            }
        }
    }

    // ------------------------------------------------------------------
    // Attributes and namespaces
    // ------------------------------------------------------------------

    /// Attribute indices belonging to an element
    pub fn attribute_range(&self, element: NodeNr) -> Range<usize> {
        let n = element as usize;
        if self.kind[n] != NodeKind::Element || self.alpha[n] == NO_NODE {
            return 0..0;
        }
        let start = self.alpha[n] as usize;
        let len = self.att_parent[start..]
            .iter()
            .take_while(|&&p| p == element)
            .count();
        start..start + len
    }

    /// Namespace declarations made on an element
    pub fn declared_namespaces(&self, element: NodeNr) -> &[NamespaceBinding] {
        let n = element as usize;
        if self.kind[n] != NodeKind::Element || self.beta[n] == NO_NODE {
            return &[];
        }
        let start = self.beta[n] as usize;
        let len = self.ns_parent[start..]
            .iter()
            .take_while(|&&p| p == element)
            .count();
        &self.ns_binding[start..start + len]
    }

    /// Namespaces in scope on an element, innermost declaration first.
    /// Undeclarations hide outer bindings and are not reported.
    pub fn in_scope_namespaces(&self, element: NodeNr) -> Vec<NamespaceBinding> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        let mut current = Some(element);
        while let Some(e) = current {
            for binding in self.declared_namespaces(e) {
                if !seen.contains(&binding.prefix()) {
                    seen.push(binding.prefix());
                    if !binding.is_undeclaration() {
                        out.push(binding.clone());
                    }
                }
            }
            current = self.parent(e);
        }
        if !seen.contains(&"xml") {
            out.push(NamespaceBinding::xml());
        }
        out
    }

    pub fn namespace_parent(&self, index: usize) -> NodeNr {
        self.ns_parent[index]
    }

    pub fn namespace_binding(&self, index: usize) -> &NamespaceBinding {
        &self.ns_binding[index]
    }

    pub fn attribute_parent(&self, index: usize) -> NodeNr {
        self.att_parent[index]
    }

    pub fn attribute_name_code(&self, index: usize) -> NameCode {
        self.att_code[index]
    }

    pub fn attribute_string_value(&self, index: usize) -> &str {
        &self.att_value[index]
    }

    /// Raw attribute type code, flag bits included
    pub fn attribute_type_code(&self, index: usize) -> TypeCode {
        match &self.att_types {
            Some(codes) => codes[index],
            None => XS_UNTYPED_ATOMIC,
        }
    }

    /// Attribute type annotation, without flag bits
    pub fn attribute_annotation(&self, index: usize) -> TypeCode {
        type_fingerprint(self.attribute_type_code(index))
    }

    /// Value of the attribute with the given fingerprint on an element
    pub fn attribute_value(&self, element: NodeNr, fingerprint: u32) -> Option<&str> {
        self.attribute_range(element)
            .find(|&i| names::fingerprint(self.att_code[i]) == fingerprint)
            .map(|i| self.attribute_string_value(i))
    }

    // ------------------------------------------------------------------
    // Typed values
    // ------------------------------------------------------------------

    /// Typed value of any node
    pub fn typed_value(&self, nr: NodeNr) -> TreeResult<AtomicSequence> {
        match self.kind[nr as usize] {
            NodeKind::Element => self.typed_value_of_element(nr),
            NodeKind::Document | NodeKind::Text | NodeKind::WhitespaceText => {
                Ok(AtomicSequence::untyped(&self.string_value(nr)))
            }
            NodeKind::Comment | NodeKind::ProcessingInstruction => {
                Ok(AtomicSequence::singleton(AtomicValue::String {
                    type_code: XS_STRING,
                    value: Arc::from(self.string_value(nr).as_ref()),
                }))
            }
            NodeKind::ParentPointer | NodeKind::Stopper => {
                panic!("node {nr} is an internal marker and has no typed value")
            }
        }
    }

    /// Typed value of an element, from its annotation and string value
    pub fn typed_value_of_element(&self, nr: NodeNr) -> TreeResult<AtomicSequence> {
        if let Some(cached) = self.typed_values.get(nr as usize) {
            return Ok(cached.clone());
        }
        let annotation = self.type_annotation(nr);
        match annotation {
            XS_UNTYPED | XS_UNTYPED_ATOMIC | XS_ANY_TYPE => {
                Ok(AtomicSequence::untyped(&self.string_value(nr)))
            }
            XS_STRING | XS_ANY_URI => Ok(simple_value(annotation, &self.string_value(nr))),
            _ => {
                let types = self.config.types();
                if types.schema_type(annotation).is_none() {
                    return Err(self.unknown_annotation(annotation));
                }
                let compute = || types.atomize(annotation, &self.string_value(nr));
                if self.config.typed_value_cache() {
                    self.typed_values
                        .get_or_try_insert(nr as usize, self.kind.len(), compute)
                } else {
                    compute()
                }
            }
        }
    }

    /// Typed value of an attribute
    pub fn typed_value_of_attribute(&self, index: usize) -> TreeResult<AtomicSequence> {
        if self.att_types.is_none() {
            return Ok(AtomicSequence::untyped(&self.att_value[index]));
        }
        if let Some(cached) = self.att_typed_values.get(index) {
            return Ok(cached.clone());
        }
        let annotation = self.attribute_annotation(index);
        let value = &self.att_value[index];
        match annotation {
            XS_UNTYPED_ATOMIC => Ok(AtomicSequence::untyped(value)),
            XS_STRING | XS_ANY_URI => Ok(simple_value(annotation, value)),
            _ => {
                let types = self.config.types();
                if types.schema_type(annotation).is_none() {
                    return Err(self.unknown_annotation(annotation));
                }
                let compute = || types.atomize(annotation, value);
                if self.config.typed_value_cache() {
                    self.att_typed_values
                        .get_or_try_insert(index, self.att_parent.len(), compute)
                } else {
                    compute()
                }
            }
        }
    }

    fn unknown_annotation(&self, annotation: TypeCode) -> TreeError {
        TreeError::UnknownTypeAnnotation {
            type_name: self.config.types().type_name(annotation),
            type_code: annotation,
        }
    }

    /// Whether any typed value has been cached for node `nr`
    pub fn has_cached_typed_value(&self, nr: NodeNr) -> bool {
        self.typed_values.get(nr as usize).is_some()
    }

    // ------------------------------------------------------------------
    // ID / IDREF
    // ------------------------------------------------------------------

    /// Does the attribute carry the is-id property?
    pub fn is_id_attribute(&self, index: usize) -> bool {
        let Some(codes) = &self.att_types else {
            return false;
        };
        let tc = codes[index];
        if tc & TYPECODE_ID != 0 {
            return true;
        }
        match type_fingerprint(tc) {
            XS_UNTYPED_ATOMIC => false,
            XS_ID => true,
            fp if fp < FIRST_USER_TYPE => false,
            fp => self.config.types().is_id_code(fp),
        }
    }

    /// Does the attribute carry the is-idref property?
    ///
    /// For a reference type this atomizes the value: an `xs:IDREFS` list,
    /// or a user list or union, may hold no reference at all.
    pub fn is_idref_attribute(&self, index: usize) -> bool {
        let Some(codes) = &self.att_types else {
            return false;
        };
        let tc = codes[index];
        if tc & TYPECODE_IDREF != 0 {
            return true;
        }
        let reference_type = match type_fingerprint(tc) {
            XS_UNTYPED_ATOMIC => false,
            XS_IDREF | XS_IDREFS => true,
            fp if fp < FIRST_USER_TYPE => false,
            fp => self.config.types().is_idref_type(fp),
        };
        reference_type
            && self
                .typed_value_of_attribute(index)
                .is_ok_and(|seq| self.contains_reference(&seq))
    }

    /// Does the element carry the is-id property?
    pub fn is_id_element(&self, nr: NodeNr) -> bool {
        let Some(codes) = &self.type_codes else {
            return false;
        };
        let tc = codes[nr as usize];
        tc & TYPECODE_ID != 0 || self.config.types().is_id_code(tc)
    }

    /// Does the element carry the is-idref property?
    pub fn is_idref_element(&self, nr: NodeNr) -> bool {
        let Some(codes) = &self.type_codes else {
            return false;
        };
        let tc = codes[nr as usize];
        if tc & TYPECODE_IDREF != 0 {
            return true;
        }
        if !self.config.types().is_idref_type(tc) {
            return false;
        }
        self.typed_value_of_element(nr)
            .is_ok_and(|seq| self.contains_reference(&seq))
    }

    fn contains_reference(&self, seq: &AtomicSequence) -> bool {
        let types = self.config.types();
        seq.iter().any(|v| types.is_idref_type(v.item_type()))
    }
}

/// Typed value of xs:string or xs:anyURI content
fn simple_value(annotation: TypeCode, text: &str) -> AtomicSequence {
    let value = if annotation == XS_ANY_URI {
        AtomicValue::AnyUri(Arc::from(text))
    } else {
        AtomicValue::String {
            type_code: XS_STRING,
            value: Arc::from(text),
        }
    };
    AtomicSequence::singleton(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Variety, XS_INTEGER};

    fn new_tree(config: Configuration) -> TinyTree {
        TinyTree::new(Arc::new(config), TreeFamily::Temporary)
    }

    /// Append a node as the last child of `parent`, linking siblings by hand
    fn child(tree: &mut TinyTree, parent: NodeNr, prev: Option<NodeNr>, kind: NodeKind, name: NameCode) -> NodeNr {
        let depth = tree.depth(parent) + 1;
        let nr = tree.add_node(kind, depth, NO_NODE, NO_NODE, name);
        if let Some(p) = prev {
            tree.set_next(p, nr);
        }
        tree.set_next(nr, parent);
        nr
    }

    #[test]
    fn test_document_with_nested_element() {
        let mut tree = new_tree(Configuration::new());
        let a_name = tree.names().allocate("", "", "a");
        let b_name = tree.names().allocate("", "", "b");
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let a = child(&mut tree, doc, None, NodeKind::Element, a_name);
        let b = child(&mut tree, a, None, NodeKind::Element, b_name);
        tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);

        assert_eq!((doc, a, b), (0, 1, 2));
        assert_eq!(tree.next_link(b), Next::Parent(a));
        assert_eq!([tree.depth(doc), tree.depth(a), tree.depth(b)], [0, 1, 2]);
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(a), Some(doc));
        assert_eq!(tree.parent(doc), None);
        assert_eq!(tree.root_index(), &[0]);
    }

    #[test]
    fn test_root_element_forest_depths() {
        let mut tree = new_tree(Configuration::new());
        let a_name = tree.names().allocate("", "", "a");
        let b_name = tree.names().allocate("", "", "b");
        let a = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, a_name);
        let b = child(&mut tree, a, None, NodeKind::Element, b_name);
        assert_eq!(tree.next_link(b), Next::Parent(a));
        assert_eq!([tree.depth(a), tree.depth(b)], [0, 1]);
        assert_eq!(tree.next_link(a), Next::None);
    }

    #[test]
    fn test_forest_roots() {
        let mut tree = new_tree(Configuration::new());
        let name = tree.names().allocate("", "", "r");
        let mut roots = Vec::new();
        for _ in 0..3 {
            let r = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
            let c = child(&mut tree, r, None, NodeKind::Element, name);
            child(&mut tree, c, None, NodeKind::Element, name);
            roots.push(r);
        }
        tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);
        assert_eq!(tree.root_index().len(), 3);
        for nr in 0..tree.node_count() as NodeNr - 1 {
            let expected = *roots.iter().rev().find(|&&r| r <= nr).unwrap();
            assert_eq!(tree.root_of(nr), expected);
        }
    }

    #[test]
    fn test_id_attribute_registration() {
        let mut tree = new_tree(Configuration::new());
        let e = tree.names().allocate("", "", "e");
        let id = tree.names().allocate("", "", "id");
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e1 = child(&mut tree, doc, None, NodeKind::Element, e);
        tree.add_attribute(doc, e1, id, XS_UNTYPED_ATOMIC, "x1", properties::IS_ID);
        let e2 = child(&mut tree, doc, Some(e1), NodeKind::Element, e);
        tree.add_attribute(doc, e2, id, XS_UNTYPED_ATOMIC, " x2 ", properties::IS_ID);

        let ids = tree.document_info(doc).unwrap().ids();
        assert_eq!(ids.lookup("x1"), Some(e1));
        assert_eq!(ids.lookup("x2"), Some(e2));
        assert_eq!(ids.lookup(" x2 "), None);
        assert_eq!(tree.attribute_string_value(1), "x2");
        assert!(tree.is_id_attribute(0));
    }

    #[test]
    fn test_invalid_id_is_downgraded() {
        let mut tree = new_tree(Configuration::new());
        let e = tree.names().allocate("", "", "e");
        let id = tree.names().allocate("", "", "id");
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e1 = child(&mut tree, doc, None, NodeKind::Element, e);
        tree.add_attribute(doc, e1, id, XS_ID, "1bad", 0);

        assert_eq!(tree.attribute_count(), 1);
        assert!(tree.document_info(doc).unwrap().ids().is_empty());
        assert_eq!(tree.attribute_type_code(0), XS_UNTYPED_ATOMIC);
        assert!(!tree.is_id_attribute(0));
    }

    #[test]
    fn test_xml_id_is_registered_without_properties() {
        let mut tree = new_tree(Configuration::new());
        let e = tree.names().allocate("", "", "e");
        let xml_id = tree.names().allocate("xml", crate::names::ns::XML, "id");
        assert_eq!(names::fingerprint(xml_id), XML_ID);
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e1 = child(&mut tree, doc, None, NodeKind::Element, e);
        tree.add_attribute(doc, e1, xml_id, XS_UNTYPED_ATOMIC, "k", 0);
        assert_eq!(tree.document_of(e1).unwrap().ids().lookup("k"), Some(e1));
    }

    #[test]
    fn test_ids_ignored_without_document_root() {
        let mut tree = new_tree(Configuration::new());
        let e = tree.names().allocate("", "", "e");
        let id = tree.names().allocate("", "", "id");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, e);
        tree.add_attribute(root, root, id, XS_UNTYPED_ATOMIC, " x ", properties::IS_ID);
        assert_eq!(tree.attribute_string_value(0), " x ");
        assert!(tree.documents().is_empty());
    }

    #[test]
    fn test_type_array_backfill_and_idref_flag() {
        let mut tree = new_tree(Configuration::new());
        let e = tree.names().allocate("", "", "e");
        let a = tree.names().allocate("", "", "a");
        let r = tree.names().allocate("", "", "r");
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e1 = child(&mut tree, doc, None, NodeKind::Element, e);
        tree.add_attribute(doc, e1, a, XS_UNTYPED_ATOMIC, "1", 0);
        tree.add_attribute(doc, e1, r, XS_UNTYPED_ATOMIC, "x", properties::IS_IDREF);
        assert_eq!(tree.attribute_type_code(0), XS_UNTYPED_ATOMIC);
        assert_eq!(tree.attribute_type_code(1), XS_UNTYPED_ATOMIC | TYPECODE_IDREF);
        assert_eq!(tree.attribute_annotation(1), XS_UNTYPED_ATOMIC);
        assert!(tree.is_idref_attribute(1));
        assert!(!tree.is_idref_attribute(0));
    }

    #[test]
    fn test_growth_preserves_nodes() {
        let mut tree = TinyTree::with_capacity(Arc::new(Configuration::new()), 1, 0, 0, 0);
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let mut prev = None;
        for _ in 0..100 {
            prev = Some(child(&mut tree, root, prev, NodeKind::Element, name));
        }
        assert!(tree.node_capacity() >= 101);
        for nr in 1..=100 {
            assert_eq!(tree.depth(nr), 1);
            assert_eq!(tree.name_code(nr), name);
            assert_eq!(tree.parent(nr), Some(root));
        }
    }

    #[test]
    fn test_stopper_grows_by_one() {
        let mut tree = TinyTree::with_capacity(Arc::new(Configuration::new()), 2, 0, 0, 0);
        tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.add_node(NodeKind::Element, 1, NO_NODE, NO_NODE, NO_NAME);
        let cap = tree.node_capacity();
        if cap == 2 {
            tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);
            assert_eq!(tree.node_capacity(), 3);
        }
    }

    #[test]
    fn test_attribute_arrays_start_at_ten() {
        let mut tree = TinyTree::with_capacity(Arc::new(Configuration::new()), 4, 0, 0, 0);
        let e = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        let a = tree.names().allocate("", "", "a");
        tree.add_attribute(e, e, a, XS_UNTYPED_ATOMIC, "v", 0);
        assert!(tree.attribute_capacity() >= 10);
    }

    #[test]
    fn test_condense_shrinks_single_root() {
        let config = Arc::new(Configuration::new());
        let mut tree = TinyTree::with_capacity(config.clone(), 1000, 100, 100, 0);
        let doc = tree.add_document_node(DocumentInfo::new(None));
        tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);
        let before = tree.capacity_bytes();
        let trees_before = config.statistics(TreeFamily::Source).lock().trees_created();
        tree.condense(TreeFamily::Source);
        assert!(tree.capacity_bytes() < before);
        assert!(tree.node_capacity() < 1000);
        assert_eq!(tree.kind(doc), NodeKind::Document);
        let trees_after = config.statistics(TreeFamily::Source).lock().trees_created();
        assert_eq!(trees_after, trees_before + 1);
    }

    #[test]
    fn test_condense_after_growth_keeps_content() {
        let mut tree = TinyTree::with_capacity(Arc::new(Configuration::new()), 1, 0, 0, 0);
        tree.set_line_numbering();
        let group = tree.names().allocate("g", "urn:g", "group");
        let item = tree.names().allocate("", "", "item");
        let n = tree.names().allocate("", "", "n");
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let root = child(&mut tree, doc, None, NodeKind::Element, group);
        tree.add_namespace(root, NamespaceBinding::new("g", "urn:g"));

        let mut prev_group = None;
        let mut i = 0u32;
        while tree.node_capacity() - tree.node_count() <= NODE_WASTE_LIMIT {
            let g = child(&mut tree, root, prev_group, NodeKind::Element, group);
            prev_group = Some(g);
            let mut prev = None;
            for _ in 0..100 {
                let e = child(&mut tree, g, prev, NodeKind::Element, item);
                prev = Some(e);
                i += 1;
                tree.set_line_number(e, i, i % 80 + 1);
                if i % 3 == 0 {
                    tree.set_element_annotation(e, XS_INTEGER);
                }
                if tree.attribute_capacity() - tree.attribute_count() <= SECONDARY_WASTE_LIMIT {
                    tree.add_attribute(doc, e, n, XS_INTEGER, &i.to_string(), 0);
                    tree.add_namespace(e, NamespaceBinding::new(&format!("p{i}"), "urn:p"));
                }
            }
        }
        tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);

        let nodes: Vec<_> = (0..tree.node_count() as NodeNr)
            .map(|nr| {
                (
                    tree.kind(nr),
                    tree.depth(nr),
                    tree.name_code(nr),
                    tree.type_annotation(nr),
                    tree.line_number(nr),
                    tree.column_number(nr),
                    tree.parent(nr),
                )
            })
            .collect();
        let attributes: Vec<_> = (0..tree.attribute_count())
            .map(|a| {
                (
                    tree.attribute_parent(a),
                    tree.attribute_name_code(a),
                    tree.attribute_string_value(a).to_string(),
                    tree.attribute_type_code(a),
                    tree.typed_value_of_attribute(a).ok(),
                )
            })
            .collect();
        let namespaces: Vec<_> = (0..tree.namespace_count())
            .map(|ns| (tree.namespace_parent(ns), tree.namespace_binding(ns).clone()))
            .collect();
        let capacities = (
            tree.node_capacity(),
            tree.attribute_capacity(),
            tree.namespace_capacity(),
        );

        tree.condense(TreeFamily::Temporary);

        assert!(tree.node_capacity() < capacities.0);
        assert!(tree.attribute_capacity() < capacities.1);
        assert!(tree.namespace_capacity() < capacities.2);
        for (nr, expected) in nodes.iter().enumerate() {
            let nr = nr as NodeNr;
            let seen = (
                tree.kind(nr),
                tree.depth(nr),
                tree.name_code(nr),
                tree.type_annotation(nr),
                tree.line_number(nr),
                tree.column_number(nr),
                tree.parent(nr),
            );
            assert_eq!(&seen, expected, "node {nr}");
        }
        for (a, expected) in attributes.iter().enumerate() {
            assert_eq!(tree.attribute_parent(a), expected.0);
            assert_eq!(tree.attribute_name_code(a), expected.1);
            assert_eq!(tree.attribute_string_value(a), expected.2);
            assert_eq!(tree.attribute_type_code(a), expected.3);
            assert_eq!(tree.typed_value_of_attribute(a).ok(), expected.4);
        }
        for (ns, (parent, binding)) in namespaces.iter().enumerate() {
            assert_eq!(tree.namespace_parent(ns), *parent);
            assert_eq!(tree.namespace_binding(ns), binding);
        }
        assert_eq!(tree.declared_namespaces(root)[0].uri(), "urn:g");
    }

    #[test]
    fn test_condense_skips_forest_by_default() {
        let mut tree = TinyTree::with_capacity(Arc::new(Configuration::new()), 1000, 0, 0, 0);
        tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.condense(TreeFamily::Temporary);
        assert!(tree.node_capacity() >= 1000);

        let config = Configuration::new().with_forest_condensation(true);
        let mut tree = TinyTree::with_capacity(Arc::new(config), 1000, 0, 0, 0);
        tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.condense(TreeFamily::Temporary);
        assert!(tree.node_capacity() < 1000);
    }

    #[test]
    fn test_prior_index_and_parent_agree() {
        let mut tree = new_tree(Configuration::new());
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let c1 = child(&mut tree, root, None, NodeKind::Element, name);
        let g = child(&mut tree, c1, None, NodeKind::Element, name);
        let c2 = child(&mut tree, root, Some(c1), NodeKind::Element, name);
        let c3 = child(&mut tree, root, Some(c2), NodeKind::Element, name);

        assert!(!tree.has_prior_index());
        assert_eq!(tree.previous_sibling(c3), Some(c2));
        assert_eq!(tree.previous_sibling(c2), Some(c1));
        assert_eq!(tree.previous_sibling(c1), None);
        assert!(tree.has_prior_index());
        for nr in [c1, g, c2, c3] {
            assert_eq!(tree.parent(nr), tree.parent_by_prior(nr));
        }

        // Appending invalidates the index; it is rebuilt on demand
        let c4 = child(&mut tree, root, Some(c3), NodeKind::Element, name);
        assert!(!tree.has_prior_index());
        assert_eq!(tree.previous_sibling(c4), Some(c3));
    }

    #[test]
    fn test_parent_pointer_is_skipped() {
        let mut tree = new_tree(Configuration::new());
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let c1 = child(&mut tree, root, None, NodeKind::Element, name);
        let pp = tree.add_node(NodeKind::ParentPointer, 1, root, 0, 0);
        tree.set_next(c1, pp);
        tree.set_next(pp, root);
        let c2 = child(&mut tree, root, Some(pp), NodeKind::Element, name);

        assert_eq!(tree.next_sibling(c1), Some(c2));
        assert_eq!(tree.parent(c1), Some(root));
        assert_eq!(tree.previous_sibling(c2), Some(c1));
        assert_eq!(tree.parent_by_prior(c2), Some(root));
    }

    #[test]
    fn test_string_values() {
        let mut tree = new_tree(Configuration::new());
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let (start, len) = tree.append_chars("hello");
        let t = tree.add_node(NodeKind::Text, 1, start, len, NO_NAME);
        tree.set_next(t, root);
        assert_eq!(tree.string_value(root), "hello");

        let packed = whitespace::compress("\n  ").unwrap();
        let (hi, lo) = whitespace::split(packed);
        let w = tree.add_node(NodeKind::WhitespaceText, 1, hi, lo, NO_NAME);
        tree.set_next(t, w);
        tree.set_next(w, root);
        assert_eq!(tree.string_value(w), "\n  ");
        assert_eq!(tree.node_kind(w), NodeKind::Text);
        assert_eq!(tree.string_value(root), "hello\n  ");
    }

    #[test]
    #[should_panic(expected = "internal marker")]
    fn test_marker_has_no_string_value() {
        let mut tree = new_tree(Configuration::new());
        let s = tree.add_node(NodeKind::Stopper, 0, 0, 0, NO_NAME);
        let _ = tree.string_value(s);
    }

    #[test]
    fn test_typed_value_defaults() {
        let mut tree = new_tree(Configuration::new());
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let (start, len) = tree.append_chars("42");
        let t = tree.add_node(NodeKind::Text, 1, start, len, NO_NAME);
        tree.set_next(t, root);
        let value = tree.typed_value(root).unwrap();
        assert_eq!(value, AtomicSequence::untyped("42"));

        tree.set_element_annotation(root, XS_STRING);
        let value = tree.typed_value(root).unwrap();
        assert_eq!(value.get(0).unwrap().item_type(), XS_STRING);
    }

    #[test]
    fn test_typed_value_cache_is_idempotent() {
        let mut tree = new_tree(Configuration::new().with_typed_value_cache(true));
        let name = tree.names().allocate("", "", "n");
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, name);
        let (start, len) = tree.append_chars(" 42 ");
        let t = tree.add_node(NodeKind::Text, 1, start, len, NO_NAME);
        tree.set_next(t, root);
        tree.set_element_annotation(root, XS_INTEGER);

        assert!(!tree.has_cached_typed_value(root));
        let cold = tree.typed_value(root).unwrap();
        assert!(tree.has_cached_typed_value(root));
        let warm = tree.typed_value(root).unwrap();
        assert_eq!(cold, warm);
        assert_eq!(cold.get(0).unwrap().to_string(), "42");
    }

    #[test]
    fn test_typed_value_not_cached_when_disabled() {
        let mut tree = new_tree(Configuration::new());
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.set_element_annotation(root, XS_INTEGER);
        assert!(tree.typed_value(root).is_err());
        assert!(!tree.has_cached_typed_value(root));
    }

    #[test]
    fn test_unknown_annotation_is_reported() {
        let mut tree = new_tree(Configuration::new());
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.set_element_annotation(root, 5000);
        let err = tree.typed_value(root).unwrap_err();
        assert!(matches!(err, TreeError::UnknownTypeAnnotation { type_code: 5000, .. }));
    }

    #[test]
    fn test_idref_list_needs_reference_item() {
        let config = Configuration::new();
        let refs = config.types().register_list("refs", XS_IDREF);
        let ints = config.types().register_list("ints", XS_INTEGER);
        let either = config
            .types()
            .register_union("either", vec![XS_INTEGER, XS_IDREF]);
        assert!(matches!(
            config.types().schema_type(either).unwrap().variety,
            Variety::Union { .. }
        ));
        let mut tree = new_tree(config);
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e = child(&mut tree, doc, None, NodeKind::Element, NO_NAME);
        let a = tree.names().allocate("", "", "a");
        let b = tree.names().allocate("", "", "b");
        let c = tree.names().allocate("", "", "c");
        let d = tree.names().allocate("", "", "d");
        tree.add_attribute(doc, e, a, refs, "x y", 0);
        tree.add_attribute(doc, e, b, ints, "1 2", 0);
        tree.add_attribute(doc, e, c, either, "12", 0);
        tree.add_attribute(doc, e, d, either, "ref", 0);
        assert!(tree.is_idref_attribute(0));
        assert!(!tree.is_idref_attribute(1));
        assert!(!tree.is_idref_attribute(2));
        assert!(tree.is_idref_attribute(3));
        let f = tree.names().allocate("", "", "f");
        let g = tree.names().allocate("", "", "g");
        tree.add_attribute(doc, e, f, XS_IDREFS, " \n ", 0);
        tree.add_attribute(doc, e, g, XS_IDREFS, "p q", 0);
        assert!(!tree.is_idref_attribute(4));
        assert!(tree.is_idref_attribute(5));
    }

    #[test]
    fn test_id_element() {
        let mut tree = new_tree(Configuration::new());
        let doc = tree.add_document_node(DocumentInfo::new(None));
        let e = child(&mut tree, doc, None, NodeKind::Element, NO_NAME);
        let (start, len) = tree.append_chars(" key ");
        let t = tree.add_node(NodeKind::Text, 2, start, len, NO_NAME);
        tree.set_next(t, e);
        tree.set_element_annotation(e, XS_ID);
        tree.index_id_element(doc, e);
        assert!(tree.is_id_element(e));
        assert_eq!(tree.document_info(doc).unwrap().ids().lookup("key"), Some(e));
        assert!(!tree.is_idref_element(e));
    }

    #[test]
    fn test_line_numbers_scan_backward() {
        let mut tree = new_tree(Configuration::new());
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        assert_eq!(tree.line_number(root), None);
        tree.set_line_numbering();
        tree.set_line_number(root, 3, 7);
        let (start, len) = tree.append_chars("x");
        let t = tree.add_node(NodeKind::Text, 1, start, len, NO_NAME);
        tree.set_next(t, root);
        assert_eq!(tree.line_number(t), Some(3));
        assert_eq!(tree.column_number(t), Some(7));
    }

    #[test]
    fn test_system_ids() {
        let mut tree = new_tree(Configuration::new());
        for _ in 0..4 {
            tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        }
        tree.set_system_id(0, "a.xml");
        tree.set_system_id(1, "a.xml");
        tree.set_system_id(2, "b.xml");
        assert_eq!(tree.system_id(1), Some("a.xml"));
        assert_eq!(tree.system_id(3), Some("b.xml"));
    }

    #[test]
    fn test_namespaces() {
        let mut tree = new_tree(Configuration::new());
        let root = tree.add_node(NodeKind::Element, 0, NO_NODE, NO_NODE, NO_NAME);
        tree.add_namespace(root, NamespaceBinding::xml());
        assert!(!tree.uses_namespaces());
        tree.add_namespace(root, NamespaceBinding::new("p", "urn:p"));
        assert!(tree.uses_namespaces());
        let inner = child(&mut tree, root, None, NodeKind::Element, NO_NAME);
        tree.add_namespace(inner, NamespaceBinding::new("p", ""));
        assert_eq!(tree.declared_namespaces(root).len(), 2);
        let in_scope = tree.in_scope_namespaces(inner);
        assert!(in_scope.iter().all(|b| b.prefix() != "p"));
        assert!(in_scope.iter().any(|b| b.prefix() == "xml"));
    }

    #[test]
    fn test_tree_is_send_sync() {
        fn check<T: Send + Sync>() {}
        check::<TinyTree>();
    }
}
