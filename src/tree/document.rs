//! Document records
//!
//! Every document node in a tree owns a [`DocumentInfo`] holding what is
//! known about the document as a whole: where it came from and which
//! elements carry which ID values. The document node's `alpha` is the index
//! of its record in the tree.

use super::kind::NodeNr;
use std::collections::HashMap;

/// ID value → element lookup for one document
///
/// Registration is first-wins: a later element claiming an ID already taken
/// is ignored, so lookups always return the first element in document order.
#[derive(Debug, Default, Clone)]
pub struct IdTable {
    ids: HashMap<Box<str>, NodeNr>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` for `element`; returns false if the ID was already taken
    pub fn register(&mut self, id: &str, element: NodeNr) -> bool {
        if self.ids.contains_key(id) {
            return false;
        }
        self.ids.insert(id.into(), element);
        true
    }

    /// Element carrying the ID value
    pub fn lookup(&self, id: &str) -> Option<NodeNr> {
        self.ids.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All registered (id, element) pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeNr)> {
        self.ids.iter().map(|(k, &v)| (k.as_ref(), v))
    }
}

/// Per-document facts
#[derive(Debug, Default, Clone)]
pub struct DocumentInfo {
    system_id: Option<String>,
    base_uri: Option<String>,
    ids: IdTable,
}

impl DocumentInfo {
    pub fn new(system_id: Option<&str>) -> Self {
        DocumentInfo {
            system_id: system_id.map(str::to_string),
            base_uri: None,
            ids: IdTable::new(),
        }
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    /// Base URI, defaulting to the system id
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref().or(self.system_id())
    }

    pub fn set_base_uri(&mut self, uri: &str) {
        self.base_uri = Some(uri.to_string());
    }

    pub fn ids(&self) -> &IdTable {
        &self.ids
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdTable {
        &mut self.ids
    }
}
