//! Name Pool - shared name interning
//!
//! Maps (prefix, namespace URI, local name) to compact name codes and back.
//! One pool is shared by every tree built from a [`Configuration`], so the
//! same name gets the same fingerprint across documents.
//!
//! Lookup mirrors a string pool: a hash of (uri code, local name) indexes a
//! short list of candidate fingerprints, handling rare collisions.
//!
//! [`Configuration`]: crate::Configuration

use super::{ns, NameCode, Fingerprint, UriCode, FP_MASK, PREFIX_SHIFT, XML_ID};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const MAX_PREFIXES: usize = 1 << 10;

#[derive(Debug, Clone)]
struct NameEntry {
    uri: UriCode,
    local: Arc<str>,
}

#[derive(Debug, Default)]
struct PoolInner {
    /// Entries indexed by fingerprint
    entries: Vec<NameEntry>,
    /// Hash of (uri, local) -> fingerprints with that hash
    hash_index: HashMap<u64, Vec<Fingerprint>>,
    uris: Vec<Arc<str>>,
    uri_index: HashMap<Arc<str>, UriCode>,
    prefixes: Vec<Arc<str>>,
    prefix_index: HashMap<Arc<str>, u32>,
}

impl PoolInner {
    #[inline]
    fn compute_hash(uri: UriCode, local: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        uri.hash(&mut hasher);
        local.hash(&mut hasher);
        hasher.finish()
    }

    fn find(&self, uri: UriCode, local: &str) -> Option<Fingerprint> {
        let ids = self.hash_index.get(&Self::compute_hash(uri, local))?;
        ids.iter().copied().find(|&fp| {
            let entry = &self.entries[fp as usize];
            entry.uri == uri && &*entry.local == local
        })
    }

    fn intern_uri(&mut self, uri: &str) -> UriCode {
        if let Some(&code) = self.uri_index.get(uri) {
            return code;
        }
        let code = self.uris.len() as UriCode;
        let uri: Arc<str> = Arc::from(uri);
        self.uris.push(uri.clone());
        self.uri_index.insert(uri, code);
        code
    }

    fn intern_prefix(&mut self, prefix: &str) -> u32 {
        if let Some(&idx) = self.prefix_index.get(prefix) {
            return idx;
        }
        let idx = self.prefixes.len();
        assert!(idx < MAX_PREFIXES, "name pool prefix table is full");
        let prefix: Arc<str> = Arc::from(prefix);
        self.prefixes.push(prefix.clone());
        self.prefix_index.insert(prefix, idx as u32);
        idx as u32
    }

    fn intern_name(&mut self, uri: UriCode, local: &str) -> Fingerprint {
        if let Some(fp) = self.find(uri, local) {
            return fp;
        }
        let fp = self.entries.len() as Fingerprint;
        assert!(fp <= FP_MASK, "name pool fingerprint space is exhausted");
        self.entries.push(NameEntry {
            uri,
            local: Arc::from(local),
        });
        self.hash_index
            .entry(Self::compute_hash(uri, local))
            .or_default()
            .push(fp);
        fp
    }
}

/// Thread-safe interning service for qualified names
#[derive(Debug)]
pub struct NamePool {
    inner: RwLock<PoolInner>,
}

impl NamePool {
    /// Create a pool with the empty name, empty namespace and `xml:id` reserved
    pub fn new() -> Self {
        let mut inner = PoolInner::default();
        inner.intern_uri("");
        inner.intern_prefix("");
        inner.intern_name(0, "");
        let xml = inner.intern_uri(ns::XML);
        let id = inner.intern_name(xml, "id");
        debug_assert_eq!(id, XML_ID);
        inner.intern_prefix("xml");
        NamePool {
            inner: RwLock::new(inner),
        }
    }

    /// Allocate (or find) the name code for a qualified name
    pub fn allocate(&self, prefix: &str, uri: &str, local: &str) -> NameCode {
        {
            let inner = self.inner.read();
            if let (Some(&uri_code), Some(&p)) =
                (inner.uri_index.get(uri), inner.prefix_index.get(prefix))
            {
                if let Some(fp) = inner.find(uri_code, local) {
                    return (p << PREFIX_SHIFT) | fp;
                }
            }
        }
        let mut inner = self.inner.write();
        let uri_code = inner.intern_uri(uri);
        let fp = inner.intern_name(uri_code, local);
        let p = inner.intern_prefix(prefix);
        (p << PREFIX_SHIFT) | fp
    }

    /// Allocate a URI code without allocating a name
    pub fn allocate_uri(&self, uri: &str) -> UriCode {
        if let Some(&code) = self.inner.read().uri_index.get(uri) {
            return code;
        }
        self.inner.write().intern_uri(uri)
    }

    /// Find the fingerprint of an already-allocated name
    pub fn fingerprint_of(&self, uri: &str, local: &str) -> Option<Fingerprint> {
        let inner = self.inner.read();
        let uri_code = *inner.uri_index.get(uri)?;
        inner.find(uri_code, local)
    }

    /// Local part of a name
    pub fn local_name(&self, code: NameCode) -> Arc<str> {
        let inner = self.inner.read();
        inner.entries[(code & FP_MASK) as usize].local.clone()
    }

    /// Namespace URI of a name ("" for no namespace)
    pub fn uri(&self, code: NameCode) -> Arc<str> {
        let inner = self.inner.read();
        let uri = inner.entries[(code & FP_MASK) as usize].uri;
        inner.uris[uri as usize].clone()
    }

    /// Interned namespace URI of a name
    pub fn uri_code_of(&self, code: NameCode) -> UriCode {
        self.inner.read().entries[(code & FP_MASK) as usize].uri
    }

    /// Prefix of a name ("" for none)
    pub fn prefix(&self, code: NameCode) -> Arc<str> {
        let inner = self.inner.read();
        inner.prefixes[(code >> PREFIX_SHIFT) as usize].clone()
    }

    /// Lexical `prefix:local` form of a name
    pub fn display_name(&self, code: NameCode) -> String {
        let inner = self.inner.read();
        let local = &inner.entries[(code & FP_MASK) as usize].local;
        let prefix = &inner.prefixes[(code >> PREFIX_SHIFT) as usize];
        if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{prefix}:{local}")
        }
    }

    /// Number of distinct (uri, local) names
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when only the reserved names are present
    pub fn is_empty(&self) -> bool {
        self.len() <= 2
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new()
    }
}
