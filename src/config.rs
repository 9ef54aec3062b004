//! Engine configuration shared by every tree
//!
//! A [`Configuration`] owns the services trees consult but do not own: the
//! name pool, the type registry, the document-number allocator and the
//! sizing hints. It also carries the few switches the tree reads.
//!
//! Switches can be taken from the environment with [`Configuration::from_env`]:
//!
//! | Variable | Effect |
//! |---|---|
//! | `TINYTREE_TYPED_VALUE_CACHE` | cache computed typed values |
//! | `TINYTREE_LINE_NUMBERS` | record line/column numbers while building |
//! | `TINYTREE_CONDENSE_FORESTS` | condense trees holding several roots |

use crate::names::NamePool;
use crate::tree::Statistics;
use crate::types::TypeRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which sizing-hint family a tree belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeFamily {
    /// Parsed source documents
    #[default]
    Source,
    /// Small trees built while evaluating queries
    Temporary,
}

/// Shared engine configuration
#[derive(Debug)]
pub struct Configuration {
    names: NamePool,
    types: TypeRegistry,
    typed_value_cache: bool,
    line_numbering: bool,
    condense_forests: bool,
    document_numbers: AtomicU64,
    source_statistics: Mutex<Statistics>,
    temporary_statistics: Mutex<Statistics>,
}

impl Configuration {
    /// Default configuration: no typed-value cache, no line numbers
    pub fn new() -> Self {
        Configuration {
            names: NamePool::new(),
            types: TypeRegistry::new(),
            typed_value_cache: false,
            line_numbering: false,
            condense_forests: false,
            document_numbers: AtomicU64::new(0),
            source_statistics: Mutex::new(Statistics::source_documents()),
            temporary_statistics: Mutex::new(Statistics::temporary_trees()),
        }
    }

    /// Default configuration with switches read from the environment
    pub fn from_env() -> Self {
        let flag = |name: &str| {
            std::env::var(name)
                .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };
        Self::new()
            .with_typed_value_cache(flag("TINYTREE_TYPED_VALUE_CACHE"))
            .with_line_numbering(flag("TINYTREE_LINE_NUMBERS"))
            .with_forest_condensation(flag("TINYTREE_CONDENSE_FORESTS"))
    }

    /// Cache typed values computed through the type registry. Only worth it
    /// for schema-validated documents.
    #[must_use]
    pub fn with_typed_value_cache(mut self, enabled: bool) -> Self {
        self.typed_value_cache = enabled;
        self
    }

    /// Record line and column numbers for elements and processing instructions
    #[must_use]
    pub fn with_line_numbering(mut self, enabled: bool) -> Self {
        self.line_numbering = enabled;
        self
    }

    /// Let condensation run on trees holding more than one root
    #[must_use]
    pub fn with_forest_condensation(mut self, enabled: bool) -> Self {
        self.condense_forests = enabled;
        self
    }

    pub fn names(&self) -> &NamePool {
        &self.names
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn typed_value_cache(&self) -> bool {
        self.typed_value_cache
    }

    pub fn line_numbering(&self) -> bool {
        self.line_numbering
    }

    pub fn condense_forests(&self) -> bool {
        self.condense_forests
    }

    /// Hand out a fresh, process-unique tree number
    pub fn allocate_document_number(&self) -> u64 {
        self.document_numbers.fetch_add(1, Ordering::Relaxed)
    }

    /// Sizing hints for a family of trees
    pub fn statistics(&self, family: TreeFamily) -> &Mutex<Statistics> {
        match family {
            TreeFamily::Source => &self.source_statistics,
            TreeFamily::Temporary => &self.temporary_statistics,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
