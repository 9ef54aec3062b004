//! Attribute scans
//!
//! The attributes of one element are a contiguous run starting at the
//! element's `alpha`. A scan walks that run and yields the attributes that
//! pass a test. When the test names exactly one attribute the scan stops at
//! the first match: an element never has two attributes of the same name.

use super::handle::AttributeHandle;
use super::kind::{NodeKind, NodeNr, NO_NODE};
use super::tiny::TinyTree;
use crate::error::TreeResult;
use crate::names::{self, Fingerprint, NameCode, NamePool, UriCode};
use crate::types::AtomicSequence;

/// A test applied to attribute name codes
pub trait AttributeTest {
    fn matches(&self, pool: &NamePool, name_code: NameCode) -> bool;

    /// The one fingerprint this test can match, if it is that narrow
    fn unique_fingerprint(&self) -> Option<Fingerprint> {
        None
    }
}

/// Common attribute name tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTest {
    /// Every attribute
    Any,
    /// The attribute with this fingerprint
    Name(Fingerprint),
    /// Attributes in this namespace
    Namespace(UriCode),
}

impl AttributeTest for NameTest {
    fn matches(&self, pool: &NamePool, name_code: NameCode) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name(fp) => names::fingerprint(name_code) == *fp,
            NameTest::Namespace(uri) => pool.uri_code_of(name_code) == *uri,
        }
    }

    fn unique_fingerprint(&self) -> Option<Fingerprint> {
        match self {
            NameTest::Name(fp) => Some(*fp),
            _ => None,
        }
    }
}

impl<F> AttributeTest for F
where
    F: Fn(NameCode) -> bool,
{
    fn matches(&self, _pool: &NamePool, name_code: NameCode) -> bool {
        self(name_code)
    }
}

/// Position tracking shared by both scans
#[derive(Debug, Clone)]
struct Cursor {
    element: NodeNr,
    index: usize,
    done: bool,
}

impl Cursor {
    fn new(tree: &TinyTree, element: NodeNr) -> Self {
        let first = tree.alpha(element);
        let has_attributes = tree.kind(element) == NodeKind::Element && first != NO_NODE;
        Cursor {
            element,
            index: first as usize,
            done: !has_attributes,
        }
    }

    /// Index of the next attribute passing `test`
    fn advance<T: AttributeTest>(&mut self, tree: &TinyTree, test: &T) -> Option<usize> {
        if self.done {
            return None;
        }
        let pool = tree.names();
        while self.index < tree.attribute_count() && tree.attribute_parent(self.index) == self.element {
            let index = self.index;
            self.index += 1;
            if test.matches(pool, tree.attribute_name_code(index)) {
                if test.unique_fingerprint().is_some() {
                    self.done = true;
                }
                return Some(index);
            }
        }
        self.done = true;
        None
    }
}

/// Attributes of one element passing a test
#[derive(Debug, Clone)]
pub struct AttributeScan<'t, T> {
    tree: &'t TinyTree,
    test: T,
    cursor: Cursor,
}

impl<'t, T: AttributeTest> AttributeScan<'t, T> {
    pub fn new(tree: &'t TinyTree, element: NodeNr, test: T) -> Self {
        AttributeScan {
            tree,
            test,
            cursor: Cursor::new(tree, element),
        }
    }

    /// Yield typed values instead of handles
    pub fn atomizing(self) -> AtomizingAttributeScan<'t, T> {
        AtomizingAttributeScan {
            tree: self.tree,
            test: self.test,
            cursor: self.cursor,
        }
    }
}

impl<'t, T: AttributeTest> Iterator for AttributeScan<'t, T> {
    type Item = AttributeHandle<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor.advance(self.tree, &self.test)?;
        Some(AttributeHandle {
            tree: self.tree,
            index,
        })
    }
}

/// Typed values of the attributes of one element passing a test
#[derive(Debug, Clone)]
pub struct AtomizingAttributeScan<'t, T> {
    tree: &'t TinyTree,
    test: T,
    cursor: Cursor,
}

impl<'t, T: AttributeTest> AtomizingAttributeScan<'t, T> {
    pub fn new(tree: &'t TinyTree, element: NodeNr, test: T) -> Self {
        AttributeScan::new(tree, element, test).atomizing()
    }
}

impl<T: AttributeTest> Iterator for AtomizingAttributeScan<'_, T> {
    type Item = TreeResult<AtomicSequence>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor.advance(self.tree, &self.test)?;
        Some(self.tree.typed_value_of_attribute(index))
    }
}
