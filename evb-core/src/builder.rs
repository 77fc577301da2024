//! The inlet-thread loop: dispatches fragments into the event table and
//! turns completions into pool-allocated, posted results.

use std::sync::Arc;

use crate::capability::Capabilities;
use crate::error::Result;
use crate::event_table::EventTable;
use crate::metrics::Metrics;
use crate::outlet::Outlet;
use crate::pool::Pool;
use crate::result::EventResult;
use crate::wire::Fragment;

/// Drives the event table from one inlet thread. Owns the shared results
/// pool `process` allocates from; the [`Outlet`] it posts to owns the
/// separate outbound-batch pool.
pub struct EventBuilder<C: Capabilities> {
    table: EventTable<C>,
    results_pool: Arc<Pool<EventResult>>,
    metrics: Arc<Metrics>,
}

impl<C: Capabilities> EventBuilder<C> {
    pub fn new(capabilities: C, timeout_epochs: u64, results_pool: Arc<Pool<EventResult>>, metrics: Arc<Metrics>) -> Self {
        Self { table: EventTable::new(capabilities, timeout_epochs), results_pool, metrics }
    }

    /// Insert one fragment, posting a [`EventResult`] for every event this
    /// makes ready, in ascending key order. Blocks if the results pool is
    /// exhausted — the backpressure path described for pool exhaustion.
    pub fn process(&mut self, fragment: &Fragment, outlet: &mut Outlet) -> Result<()> {
        let (ready, accepted) = self.table.process(fragment);
        self.metrics.record_fragment(accepted);
        if !accepted {
            crate::insights::record_duplicate(fragment.pulse_id(), fragment.producer_id());
        }
        self.emit(ready, outlet)
    }

    /// Advance the expiry epoch, force-completing (and posting) any event
    /// at the head of the table that has aged past its timeout.
    pub fn tick(&mut self, epoch: u64, outlet: &mut Outlet) -> Result<()> {
        let ready = self.table.tick(epoch);
        self.emit(ready, outlet)
    }

    /// Number of events currently in progress; exposed for the driver's
    /// periodic stats line.
    pub fn in_progress(&self) -> usize {
        self.table.len()
    }

    fn emit(&mut self, ready: Vec<crate::event::EbEvent>, outlet: &mut Outlet) -> Result<()> {
        for event in ready {
            // `fixup` only ever runs on the timeout path in `EventTable`, so
            // `damaged` doubles as "this completion was a forced timeout"
            // for metrics/tracing purposes.
            let timed_out = event.result.damaged;
            self.metrics.record_completion(timed_out);
            crate::insights::record_completion(event.key, timed_out);

            let (index, ptr) = self.results_pool.alloc();
            // SAFETY: `index` was just allocated and is exclusively owned
            // here until the outlet worker frees it after transmission.
            unsafe { *ptr = event.result };
            outlet.post(event.key, index)?;
        }
        Ok(())
    }
}
