//! Parallel reads over a finished tree
//!
//! A built [`TinyTree`] is shared immutably between threads. Lazy indexes
//! and typed-value caches fill in concurrently; these helpers fan work out
//! with Rayon.

use super::kind::{NodeKind, NodeNr};
use super::tiny::TinyTree;
use crate::error::TreeResult;
use crate::types::AtomicSequence;
use rayon::prelude::*;
use tracing::debug;

/// Typed values of many nodes, computed in parallel
pub fn typed_values_parallel(tree: &TinyTree, nodes: &[NodeNr]) -> Vec<TreeResult<AtomicSequence>> {
    nodes.par_iter().map(|&n| tree.typed_value(n)).collect()
}

/// Map every node in `nodes` in parallel
pub fn node_map<F, T>(tree: &TinyTree, nodes: &[NodeNr], mapper: F) -> Vec<T>
where
    F: Fn(&TinyTree, NodeNr) -> T + Sync + Send,
    T: Send,
{
    nodes.par_iter().map(|&n| mapper(tree, n)).collect()
}

/// Build the preceding-sibling index and compute the typed value of every
/// element and attribute, so later reads hit the caches.
///
/// Returns the first error met; values computed before it stay cached.
pub fn warm_caches(tree: &TinyTree) -> TreeResult<()> {
    let _ = tree.prior_index();
    let elements: Vec<NodeNr> = (0..tree.node_count() as NodeNr)
        .filter(|&n| tree.kind(n) == NodeKind::Element)
        .collect();
    elements
        .par_iter()
        .try_for_each(|&n| tree.typed_value_of_element(n).map(drop))?;
    (0..tree.attribute_count())
        .into_par_iter()
        .try_for_each(|i| tree.typed_value_of_attribute(i).map(drop))?;
    debug!(
        elements = elements.len(),
        attributes = tree.attribute_count(),
        "warmed caches"
    );
    Ok(())
}
