//! Sizing hints for new trees
//!
//! Each family of trees (source documents, temporary trees) keeps running
//! averages of how big its trees turned out. A new tree is pre-sized from
//! the averages; a finished tree feeds its final counts back in when it is
//! condensed. This is an online heuristic only: nothing depends on it for
//! correctness.

/// Trees seen before the averages stop moving
const STABLE_AFTER: u32 = 1_000_000;

/// Running averages of node, attribute, namespace and character counts
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    trees_created: u32,
    average_nodes: f64,
    average_attributes: f64,
    average_namespaces: f64,
    average_characters: f64,
}

impl Statistics {
    /// Start a family from initial guesses. The guesses count as a few
    /// trees' worth of history so the first real tree cannot swing them.
    pub fn new(nodes: f64, attributes: f64, namespaces: f64, characters: f64) -> Self {
        Statistics {
            trees_created: 5,
            average_nodes: nodes,
            average_attributes: attributes,
            average_namespaces: namespaces,
            average_characters: characters,
        }
    }

    /// Hints for parsed source documents
    pub fn source_documents() -> Self {
        Self::new(4000.0, 100.0, 20.0, 4000.0)
    }

    /// Hints for small trees built during query evaluation
    pub fn temporary_trees() -> Self {
        Self::new(20.0, 20.0, 20.0, 200.0)
    }

    pub fn average_nodes(&self) -> f64 {
        self.average_nodes
    }

    pub fn average_attributes(&self) -> f64 {
        self.average_attributes
    }

    pub fn average_namespaces(&self) -> f64 {
        self.average_namespaces
    }

    pub fn average_characters(&self) -> f64 {
        self.average_characters
    }

    pub fn trees_created(&self) -> u32 {
        self.trees_created
    }

    /// Initial capacities: (nodes, attributes, namespaces, characters)
    pub fn initial_capacities(&self) -> (usize, usize, usize, usize) {
        (
            self.average_nodes as usize + 1,
            self.average_attributes as usize + 1,
            self.average_namespaces as usize + 1,
            self.average_characters as usize + 1,
        )
    }

    /// Fold one finished tree into the averages
    pub fn update(&mut self, nodes: usize, attributes: usize, namespaces: usize, characters: usize) {
        let n0 = self.trees_created;
        if n0 >= STABLE_AFTER {
            return;
        }
        let n1 = n0 + 1;
        self.trees_created = n1;
        let fold = |avg: f64, count: usize, floor: f64| {
            (((avg * n0 as f64) + count as f64) / n1 as f64).max(floor)
        };
        self.average_nodes = fold(self.average_nodes, nodes, 10.0);
        self.average_attributes = fold(self.average_attributes, attributes, 10.0);
        self.average_namespaces = fold(self.average_namespaces, namespaces, 5.0);
        self.average_characters = fold(self.average_characters, characters, 100.0);
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::source_documents()
    }
}
