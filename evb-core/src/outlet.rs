//! Accepts finished results, packs them into outbound batches, and posts
//! each closed batch to its destinations.
//!
//! Split into two handles sharing one channel, mirroring the two roles
//! `TstEbOutlet` plays in the reference build: [`Outlet`] is driven from the
//! inlet thread (`post`), [`OutletWorker`] runs on its own thread and does
//! the actual transmission. The channel itself is the "thread-safe queue
//! plus counting semaphore" the design calls for — `crossbeam_channel`
//! already blocks a consumer on an empty queue and wakes it the instant a
//! producer sends, which is exactly that semaphore.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::batch_manager::{BatchManager, ClosedBatch};
use crate::error::Result;
use crate::fabric::Fabric;
use crate::metrics::Metrics;
use crate::pool::Pool;
use crate::result::EventResult;

/// Inlet-side handle: packs completed results (already allocated in the
/// shared results pool) into batches and hands closed ones to the worker.
pub struct Outlet {
    batches: BatchManager<u32>,
    sender: Sender<ClosedBatch<u32>>,
}

impl Outlet {
    pub fn new(
        max_batches: usize,
        max_entries: usize,
        batch_duration: u64,
    ) -> (Self, Receiver<ClosedBatch<u32>>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let outlet = Self { batches: BatchManager::new(max_batches, max_entries, batch_duration), sender };
        (outlet, receiver)
    }

    /// The pool backing outbound batches, for one-time fabric registration.
    pub fn batch_pool(&self) -> &Arc<Pool<crate::batch::Batch<u32>>> {
        self.batches.pool()
    }

    /// Append one completed result (by its index in the shared results
    /// pool, keyed by its pulse id) to the current batch. Sends the batch
    /// onward the moment it closes.
    pub fn post(&mut self, key: u64, result_index: u32) -> Result<()> {
        if let Some(closed) = self.batches.process(key, result_index) {
            self.send(closed)?;
        }
        Ok(())
    }

    /// Force-close and send whatever batch is currently open, if any.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(closed) = self.batches.flush() {
            self.send(closed)?;
        }
        Ok(())
    }

    fn send(&self, closed: ClosedBatch<u32>) -> Result<()> {
        self.sender
            .send(closed)
            .map_err(|_| crate::error::EvbError::unexpected("outlet worker is gone"))
    }
}

/// Transmit-side handle: owns the fabric and the shared results pool, runs
/// on its own thread.
pub struct OutletWorker<F: Fabric> {
    receiver: Receiver<ClosedBatch<u32>>,
    results_pool: Arc<Pool<EventResult>>,
    fabric: Arc<F>,
    max_batch_size: usize,
    metrics: Arc<Metrics>,
}

impl<F: Fabric> OutletWorker<F> {
    pub fn new(
        receiver: Receiver<ClosedBatch<u32>>,
        results_pool: Arc<Pool<EventResult>>,
        fabric: Arc<F>,
        max_batch_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { receiver, results_pool, fabric, max_batch_size, metrics }
    }

    /// Drain closed batches until the inlet side is dropped (shutdown) and
    /// every already-queued batch has been transmitted.
    pub fn run(&self) {
        while let Ok(closed) = self.receiver.recv() {
            self.transmit(closed);
        }
    }

    /// Process exactly one closed batch, if one is ready. Used by tests and
    /// by callers driving the worker manually instead of via `run`.
    pub fn try_transmit_one(&self) -> bool {
        match self.receiver.try_recv() {
            Ok(closed) => {
                self.transmit(closed);
                true
            }
            Err(_) => false,
        }
    }

    fn transmit(&self, closed: ClosedBatch<u32>) {
        let indices = closed.entries().to_vec();
        let window = closed.window();

        let Some(&first_index) = indices.first() else {
            closed.release();
            return;
        };

        // SAFETY: each index was allocated from `results_pool` by the inlet
        // thread and stays allocated until freed below, after this batch's
        // only reader (this worker) is done with it.
        let destinations = unsafe { (*self.results_pool.cell_ptr(first_index)).destinations.clone() };

        let mut batch_bytes = Vec::new();
        for &index in &indices {
            let result = unsafe { &*self.results_pool.cell_ptr(index) };
            batch_bytes.extend_from_slice(&result.wire_bytes());
        }

        // Known simplification, carried forward from the source design: the
        // first result's destination list stands in for the whole batch's.
        // Correct as long as one batch never mixes read-out groups.
        for dest in destinations.as_slice() {
            let remote_offset = dest.remote_index as usize * self.max_batch_size;
            if self.fabric.post(&batch_bytes, dest.producer_id, remote_offset).is_err() {
                crate::insights::record_transient_post_failure(dest.producer_id);
                continue;
            }
        }
        self.metrics.record_batch_closed(destinations.len() as u64);
        crate::insights::record_batch_closed(window, indices.len());

        for &index in &indices {
            self.results_pool.free(index);
        }
        closed.release();
    }
}
