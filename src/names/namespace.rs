//! Namespace bindings and resolution
//!
//! [`NamespaceBinding`] is what the tree stores per namespace declaration.
//! [`NamespaceResolver`] is the stack-based scope tracker the text front end
//! uses to turn prefixes into URIs while building.

use super::ns;
use std::sync::Arc;

/// A prefix -> URI binding as declared on an element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceBinding {
    prefix: Arc<str>,
    uri: Arc<str>,
}

impl NamespaceBinding {
    pub fn new(prefix: &str, uri: &str) -> Self {
        NamespaceBinding {
            prefix: Arc::from(prefix),
            uri: Arc::from(uri),
        }
    }

    /// The implicit `xml` binding
    pub fn xml() -> Self {
        Self::new("xml", ns::XML)
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True for the predeclared `xml` binding
    pub fn is_xml_namespace(&self) -> bool {
        &*self.prefix == "xml"
    }

    /// True for `xmlns=""`, which undeclares the default namespace
    pub fn is_undeclaration(&self) -> bool {
        self.uri.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ScopedBinding {
    binding: NamespaceBinding,
    depth: u16,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<ScopedBinding>,
    /// Current element depth
    depth: u16,
}

impl NamespaceResolver {
    /// Create a resolver with the `xml` prefix pre-bound
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: vec![ScopedBinding {
                binding: NamespaceBinding::xml(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(scoped) = self.bindings.last() {
            if scoped.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding in the current scope. Returns false for the reserved
    /// `xml` and `xmlns` prefixes, which cannot be redeclared.
    pub fn declare(&mut self, binding: NamespaceBinding) -> bool {
        if matches!(binding.prefix(), "xml" | "xmlns") {
            return false;
        }
        self.bindings.push(ScopedBinding {
            binding,
            depth: self.depth,
        });
        true
    }

    /// Resolve a prefix ("" for the default namespace) to its URI.
    /// The default namespace resolves to "" when undeclared.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        let found = self
            .bindings
            .iter()
            .rev()
            .find(|scoped| scoped.binding.prefix() == prefix)
            .map(|scoped| scoped.binding.uri());
        match found {
            None if prefix.is_empty() => Some(""),
            Some("") if !prefix.is_empty() => None,
            other => other,
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> u16 {
        self.depth
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}
