//! Owns the outbound batch pool; opens and closes batches keyed by a
//! power-of-two time window.
//!
//! Grounded on the outlet side of `tstEbBuilder.cc`'s `TstEbOutlet`, which
//! plays the same dual role this crate splits into [`BatchManager`] (pure
//! windowing/packing policy) and [`Outlet`](crate::outlet::Outlet) (the
//! transmit worker that owns one).

use std::sync::Arc;

use crate::batch::Batch;
use crate::pool::Pool;

struct OpenBatch {
    index: u32,
    window: u64,
}

/// Packs a stream of `(key, entry)` pairs into pool-backed batches, closing
/// one whenever the next entry falls outside its window or it has reached
/// `max_entries`.
pub struct BatchManager<T> {
    pool: Arc<Pool<Batch<T>>>,
    max_entries: usize,
    batch_duration: u64,
    open: Option<OpenBatch>,
}

impl<T> BatchManager<T> {
    /// `batch_duration` must be a power of two — window membership is a
    /// bitwise AND against it.
    pub fn new(max_batches: usize, max_entries: usize, batch_duration: u64) -> Self {
        assert!(max_entries > 0, "maxEntries must be nonzero");
        assert!(
            batch_duration.is_power_of_two(),
            "batchDuration must be a power of two, got {batch_duration}"
        );
        Self {
            pool: Arc::new(Pool::new(max_batches)),
            max_entries,
            batch_duration,
            open: None,
        }
    }

    /// The pool backing outbound batches, for one-time fabric registration.
    pub fn pool(&self) -> &Arc<Pool<Batch<T>>> {
        &self.pool
    }

    #[inline]
    fn window_of(&self, key: u64) -> u64 {
        key & !(self.batch_duration - 1)
    }

    /// Append one entry keyed by `key`. Blocks on pool exhaustion if a new
    /// batch must be opened. Returns the previously open batch if this entry
    /// forced it closed — by window boundary or by reaching `max_entries`.
    pub fn process(&mut self, key: u64, entry: T) -> Option<ClosedBatch<T>> {
        let window = self.window_of(key);

        let must_close = match &self.open {
            Some(open) => {
                let full = unsafe { (*self.pool.cell_ptr(open.index)).entries.len() } >= self.max_entries;
                open.window != window || full
            }
            None => false,
        };
        let closed = if must_close { self.close() } else { None };

        if self.open.is_none() {
            // SAFETY: `alloc` hands back an index this call exclusively owns
            // until it is freed via a `ClosedBatch::release`.
            let (index, ptr) = self.pool.alloc();
            unsafe { (*ptr).entries.clear() };
            self.open = Some(OpenBatch { index, window });
        }

        let index = self.open.as_ref().unwrap().index;
        unsafe { (*self.pool.cell_ptr(index)).entries.push(entry) };
        closed
    }

    /// Close the open batch without waiting for a new entry, e.g. during
    /// shutdown or an idle-timeout flush.
    pub fn flush(&mut self) -> Option<ClosedBatch<T>> {
        self.close()
    }

    fn close(&mut self) -> Option<ClosedBatch<T>> {
        let open = self.open.take()?;
        Some(ClosedBatch { pool: self.pool.clone(), index: open.index, window: open.window })
    }
}

/// A batch that has been closed and handed off for transmission. Its pool
/// cell remains allocated — and its entries readable — until [`ClosedBatch::release`]
/// returns it.
pub struct ClosedBatch<T> {
    pool: Arc<Pool<Batch<T>>>,
    index: u32,
    window: u64,
}

impl<T> ClosedBatch<T> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn entries(&self) -> &[T] {
        // SAFETY: the index was allocated by the manager that produced this
        // batch and stays allocated (not on the free list) until `release`
        // consumes `self`; nothing else can hold this index meanwhile.
        unsafe { &(*self.pool.cell_ptr(self.index)).entries }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Return the batch's pool cell, waking one blocked allocator.
    pub fn release(self) {
        self.pool.free(self.index);
    }
}
