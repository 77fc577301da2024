//! The pool-cell payload a [`BatchManager`](crate::batch_manager::BatchManager) packs entries into.
//!
//! The reference implementation packs a header datagram and up to
//! `maxEntries` child datagrams back-to-back in one pool cell, addressed by
//! an `iovec[]` scatter list. Posting those bytes over the wire is the
//! fabric adapter's job and out of scope here, so a batch's pool cell holds
//! an owned `Vec` of its entries directly rather than a raw byte region —
//! same packing discipline (bounded, one pool cell per batch, closed whole),
//! without a scatter-gather list standing in for what `Vec<T>` already is.

/// One batch's accumulated entries, living in a single [`Pool`](crate::pool::Pool) cell.
pub struct Batch<T> {
    pub(crate) entries: Vec<T>,
}

impl<T> Batch<T> {
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}
