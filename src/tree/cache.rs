//! Lazily populated per-slot caches
//!
//! The typed-value caches are filled by readers, possibly from several
//! threads at once. Each slot is a `OnceLock`: the first writer wins and
//! later writers drop their (equal) value. The slot array itself is
//! allocated once, sized to the count at first use, and can only be
//! discarded through `&mut`, so no reader ever sees it resized.

use std::sync::OnceLock;

/// A sparse array of write-once slots
#[derive(Debug)]
pub struct SlotCache<T> {
    slots: OnceLock<Box<[OnceLock<T>]>>,
}

impl<T> SlotCache<T> {
    pub const fn new() -> Self {
        SlotCache {
            slots: OnceLock::new(),
        }
    }

    /// Cached value at `index`, if any
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get()?.get(index)?.get()
    }

    /// Return the cached value at `index`, computing and storing it if absent.
    ///
    /// `len` sizes the slot array on first use. An index beyond the array is
    /// computed but not stored.
    pub fn get_or_try_insert<E>(
        &self,
        index: usize,
        len: usize,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Clone,
    {
        let slots = self
            .slots
            .get_or_init(|| (0..len).map(|_| OnceLock::new()).collect());
        let Some(slot) = slots.get(index) else {
            return compute();
        };
        if let Some(v) = slot.get() {
            return Ok(v.clone());
        }
        let value = compute()?;
        Ok(slot.get_or_init(|| value).clone())
    }

    /// Whether any slot array has been allocated
    pub fn is_allocated(&self) -> bool {
        self.slots.get().is_some()
    }

    /// Number of slots allocated
    pub fn len(&self) -> usize {
        self.slots.get().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the slot array if it no longer covers `count` entries
    pub fn invalidate_below(&mut self, count: usize) {
        if self.slots.get().is_some_and(|s| s.len() < count) {
            self.slots.take();
        }
    }

    /// Drop every cached value
    pub fn clear(&mut self) {
        self.slots.take();
    }
}

impl<T> Default for SlotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
