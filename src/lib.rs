//! tinytree - compact array-based XML tree storage
//!
//! A [`TinyTree`] holds one or more XML documents in parallel integer arrays
//! rather than as linked node objects:
//! - `tree`: the arena, node handles, attribute scans and the builder
//! - `parse`: XML text front end driving the builder
//! - `names` / `types`: name pool and type registry the tree refers to
//! - `config`: shared engine configuration
//!
//! ```ignore
//! let config = Arc::new(Configuration::from_env());
//! let tree = tinytree::parse_str(config, "<doc><p>hi</p></doc>")?;
//! let root = tree.node(0).first_child().unwrap();
//! assert_eq!(root.string_value(), "hi");
//! ```

pub mod config;
pub mod error;
pub mod names;
pub mod parse;
pub mod tree;
pub mod types;

pub use config::{Configuration, TreeFamily};
pub use error::{TreeError, TreeResult};
pub use names::{NameCode, NamePool, NamespaceBinding};
pub use parse::{parse_document, parse_into, parse_str, parse_temporary};
pub use tree::{
    AttributeHandle, AttributeScan, NameTest, NamespaceHandle, NodeHandle, NodeKind, NodeNr, NodeView,
    TinyBuilder, TinyTree, NO_NODE,
};
pub use types::{AtomicSequence, AtomicValue, TypeCode, TypeRegistry};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
                PEAK_ALLOCATED.fetch_max(current, Ordering::Relaxed);
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Allocation counters, for sizing trees while profiling.
///
/// Every function returns zero unless the `memory_tracking` feature is on.
pub mod memory {
    #[cfg(feature = "memory_tracking")]
    use std::sync::atomic::Ordering;

    /// Bytes currently allocated through the global allocator
    #[cfg(feature = "memory_tracking")]
    pub fn allocated() -> usize {
        super::tracking::ALLOCATED.load(Ordering::SeqCst)
    }

    /// High-water mark since start or the last [`reset`]
    #[cfg(feature = "memory_tracking")]
    pub fn peak() -> usize {
        super::tracking::PEAK_ALLOCATED.load(Ordering::SeqCst)
    }

    /// Reset the peak to the current figure; returns (current, old peak)
    #[cfg(feature = "memory_tracking")]
    pub fn reset() -> (usize, usize) {
        let current = super::tracking::ALLOCATED.load(Ordering::SeqCst);
        let peak = super::tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
        (current, peak)
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn allocated() -> usize {
        0
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn peak() -> usize {
        0
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn reset() -> (usize, usize) {
        (0, 0)
    }

}
