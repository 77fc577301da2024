//! Thin abstraction over the registered-memory transport.
//!
//! The concrete fabric (libfabric-style RDMA) is an external collaborator;
//! this module names only the contract the core drives it through, plus a
//! loopback implementation used by the driver's demo mode and by tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::Result;

/// A filled slice of inbound registered memory, as returned by [`Fabric::pend`].
///
/// Carries a raw pointer rather than a borrowed slice because the region it
/// points into is owned by the fabric adapter, not by this crate; the
/// pointer is valid only until the next call to `pend` on the same adapter.
#[derive(Clone, Copy)]
pub struct InboundFragment {
    pub ptr: *const u8,
    pub len: usize,
}

impl InboundFragment {
    /// # Safety
    /// The caller must not hold this past the adapter's next `pend` call.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

// SAFETY: `InboundFragment` is handed across the inlet thread boundary only
// by value, never shared; the pointee's lifetime is managed by the fabric
// adapter that produced it.
unsafe impl Send for InboundFragment {}

/// Opaque handle to one pool's registered memory region.
pub struct MemoryRegion {
    pub base: *const u8,
    pub size: usize,
}

/// The surface the core drives a registered-memory transport through.
///
/// Registration happens once per pool at startup; `pend`/`post` are the
/// steady-state hot path. `shutdown` must make a blocked `pend` return
/// `None` so the inlet thread can exit its loop.
pub trait Fabric: Send + Sync {
    /// Pin and register `size` bytes starting at `base`. Called once per
    /// pool at startup.
    fn register_memory(&self, base: *const u8, size: usize) -> Result<MemoryRegion>;

    /// Block until a remote write lands in registered inbound memory.
    /// Returns `None` once `shutdown` has been called.
    fn pend(&self) -> Option<InboundFragment>;

    /// One-sided remote write of `bytes` to `dst`'s registered region at
    /// `remote_offset`.
    fn post(&self, bytes: &[u8], dst: u8, remote_offset: usize) -> Result<()>;

    /// Diagnostic: resolve the remote address `dst` would see for
    /// `remote_offset`, without writing to it.
    fn remote_address(&self, dst: u8, remote_offset: usize) -> *const u8;

    /// Cancel any in-flight (or future) `pend`.
    fn shutdown(&self);
}

/// In-process loopback fabric: `post` writes into a per-destination mailbox
/// that a later `pend` (from whichever contributor owns that destination id)
/// reads back out. Used by the driver's demo mode and by integration tests
/// that want to exercise the whole inlet/outlet pipeline without a real
/// transport.
pub struct LoopbackFabric {
    mailboxes: Vec<Mutex<Vec<Vec<u8>>>>,
    inbound: Mutex<Vec<Vec<u8>>>,
    not_empty: Condvar,
    shutdown: AtomicBool,
}

/// Outcome of a timed wait on the adapter's inbound queue; see [`LoopbackFabric::pend_timeout`].
pub enum PendOutcome {
    Fragment(InboundFragment),
    TimedOut,
    Shutdown,
}

impl LoopbackFabric {
    pub fn new(contributors: usize) -> Self {
        Self {
            mailboxes: (0..contributors).map(|_| Mutex::new(Vec::new())).collect(),
            inbound: Mutex::new(Vec::new()),
            not_empty: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Feed one fragment's bytes into the adapter's inbound queue, as if a
    /// contributor had written it over the wire. Used by tests and by the
    /// driver's demo mode in place of a real contributor.
    pub fn deliver(&self, bytes: Vec<u8>) {
        self.inbound.lock().push(bytes);
        self.not_empty.notify_one();
    }

    /// Drain everything posted to `dst`'s mailbox so far.
    pub fn take_mailbox(&self, dst: u8) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.mailboxes[dst as usize].lock())
    }

    /// Like [`Fabric::pend`] but gives up after `timeout` rather than
    /// blocking indefinitely, so a caller can still drive periodic work
    /// (the event table's epoch-based expiry) when no contributor is
    /// sending anything.
    pub fn pend_timeout(&self, timeout: Duration) -> PendOutcome {
        let mut inbound = self.inbound.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return PendOutcome::Shutdown;
            }
            if let Some(bytes) = inbound.pop() {
                let boxed = bytes.into_boxed_slice();
                let len = boxed.len();
                let ptr = Box::leak(boxed).as_ptr();
                return PendOutcome::Fragment(InboundFragment { ptr, len });
            }
            if self.not_empty.wait_for(&mut inbound, timeout).timed_out() {
                return PendOutcome::TimedOut;
            }
        }
    }
}

impl Fabric for LoopbackFabric {
    fn register_memory(&self, base: *const u8, size: usize) -> Result<MemoryRegion> {
        Ok(MemoryRegion { base, size })
    }

    fn pend(&self) -> Option<InboundFragment> {
        let mut inbound = self.inbound.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            if let Some(bytes) = inbound.pop() {
                // Leak the boxed bytes; their lifetime is "until shutdown",
                // which matches a real registered region well enough for a
                // loopback test double.
                let boxed = bytes.into_boxed_slice();
                let len = boxed.len();
                let ptr = Box::leak(boxed).as_ptr();
                return Some(InboundFragment { ptr, len });
            }
            self.not_empty.wait(&mut inbound);
        }
    }

    fn post(&self, bytes: &[u8], dst: u8, _remote_offset: usize) -> Result<()> {
        self.mailboxes[dst as usize].lock().push(bytes.to_vec());
        Ok(())
    }

    fn remote_address(&self, _dst: u8, _remote_offset: usize) -> *const u8 {
        std::ptr::null()
    }

    fn shutdown(&self) {
        let inbound = self.inbound.lock();
        self.shutdown.store(true, Ordering::Release);
        self.not_empty.notify_all();
        drop(inbound);
    }
}
