//! Fixed-capacity slab allocator of equal-size cells, indexable, resource-waiting.
//!
//! Mirrors the claim/publish discipline of the ring buffers this workspace grew
//! out of, but trades the producer/consumer cursor pair for a free-list: any
//! thread may `alloc` or `free` a cell, in any order, and a cell's dense index
//! is stable for the lifetime of the allocation. That stability is what lets a
//! pool double as the backing store for RDMA-registered memory — the index is
//! exactly the remote offset the fabric writes against.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// A contiguous, fixed-capacity pool of `T` cells addressable by a dense index.
///
/// `alloc` blocks the caller while the pool is exhausted; `free` never blocks
/// and wakes exactly one waiter. The pool is one allocation for its whole
/// lifetime so the region can be pinned/registered once at startup.
pub struct Pool<T> {
    cells: Box<[UnsafeCell<T>]>,
    free_list: Mutex<Vec<u32>>,
    not_empty: Condvar,
    in_use: AtomicUsize,
}

// SAFETY: access to a given cell is exclusive to whichever thread currently
// holds its index (handed out by `alloc`, returned by `free`); the pool
// itself only ever touches the free-list, which is mutex-protected.
unsafe impl<T: Send> Sync for Pool<T> {}
unsafe impl<T: Send> Send for Pool<T> {}

impl<T: Default> Pool<T> {
    /// Build a pool of `capacity` cells, each default-initialised.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be nonzero");
        let cells: Box<[UnsafeCell<T>]> = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let free_list = Mutex::new((0..capacity as u32).rev().collect());
        Self {
            cells,
            free_list,
            not_empty: Condvar::new(),
            in_use: AtomicUsize::new(0),
        }
    }
}

impl<T> Pool<T> {
    /// Number of cells this pool was built with.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Size in bytes of one cell — used when registering the pool's region
    /// with the fabric.
    pub fn cell_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Base address of the pool's backing allocation, for one-time
    /// registration with the fabric adapter.
    pub fn base(&self) -> *const u8 {
        self.cells.as_ptr() as *const u8
    }

    /// Number of cells currently allocated.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Raw pointer to an already-allocated cell. Exposed crate-internally so
    /// collaborators that hand out pool indices across threads (the batch
    /// manager handing a closed batch to the outlet) can keep reading the
    /// cell after the allocating call has returned, without re-deriving the
    /// pointer through another `alloc`.
    ///
    /// # Safety
    /// `index` must currently be allocated (not on the free list); the
    /// resulting pointer is only valid until the next `free(index)`.
    #[inline]
    pub(crate) fn cell_ptr(&self, index: u32) -> *mut T {
        self.cells[index as usize].get()
    }

    /// Claim a free cell, blocking the calling thread while the pool is
    /// exhausted. Returns the cell's stable index and a raw pointer to it.
    ///
    /// # Safety
    /// The caller owns the cell exclusively until it calls [`Pool::free`]
    /// with the same index; reading or writing through the pointer after
    /// freeing is undefined behaviour.
    pub fn alloc(&self) -> (u32, *mut T) {
        let mut free_list = self.free_list.lock();
        loop {
            if let Some(index) = free_list.pop() {
                self.in_use.fetch_add(1, Ordering::Relaxed);
                return (index, self.cell_ptr(index));
            }
            self.not_empty.wait(&mut free_list);
        }
    }

    /// Non-blocking variant of [`Pool::alloc`]; returns `None` if the pool is
    /// currently exhausted rather than waiting.
    pub fn try_alloc(&self) -> Option<(u32, *mut T)> {
        let mut free_list = self.free_list.lock();
        let index = free_list.pop()?;
        self.in_use.fetch_add(1, Ordering::Relaxed);
        Some((index, self.cell_ptr(index)))
    }

    /// Return a cell to the pool. O(1); wakes exactly one blocked allocator.
    pub fn free(&self, index: u32) {
        let mut free_list = self.free_list.lock();
        debug_assert!(
            !free_list.contains(&index),
            "double free of pool cell {index}"
        );
        free_list.push(index);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        self.not_empty.notify_one();
    }
}
