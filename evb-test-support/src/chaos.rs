//! Random failure injection around a [`Fabric`], for exercising the
//! transport-transient error path without a real flaky transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use evb_core::fabric::{Fabric, InboundFragment, MemoryRegion};
use evb_core::{EvbError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub struct ChaosConfig {
    /// Fraction of `post` calls that fail, in `[0.0, 1.0]`.
    pub post_failure_rate: f64,
    /// Extra delay injected before every `pend` returns.
    pub pend_delay: Duration,
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self { post_failure_rate: 0.0, pend_delay: Duration::ZERO, seed: 0 }
    }
}

impl ChaosConfig {
    pub fn with_post_failure_rate(mut self, rate: f64) -> Self {
        self.post_failure_rate = rate;
        self
    }

    pub fn with_pend_delay(mut self, delay: Duration) -> Self {
        self.pend_delay = delay;
        self
    }
}

/// Wraps an inner [`Fabric`] and randomly fails posts / delays pends
/// according to a [`ChaosConfig`]. `register_memory`, `remote_address`, and
/// `shutdown` pass straight through.
pub struct ChaosFabric<F: Fabric> {
    inner: F,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
    posts_dropped: AtomicU64,
}

impl<F: Fabric> ChaosFabric<F> {
    pub fn new(inner: F, config: ChaosConfig) -> Self {
        Self { inner, config, rng: Mutex::new(StdRng::seed_from_u64(config.seed)), posts_dropped: AtomicU64::new(0) }
    }

    pub fn posts_dropped(&self) -> u64 {
        self.posts_dropped.load(Ordering::Relaxed)
    }

    fn roll(&self) -> f64 {
        self.rng.lock().gen_range(0.0..1.0)
    }
}

impl<F: Fabric> Fabric for ChaosFabric<F> {
    fn register_memory(&self, base: *const u8, size: usize) -> Result<MemoryRegion> {
        self.inner.register_memory(base, size)
    }

    fn pend(&self) -> Option<InboundFragment> {
        if !self.config.pend_delay.is_zero() {
            thread::sleep(self.config.pend_delay);
        }
        self.inner.pend()
    }

    fn post(&self, bytes: &[u8], dst: u8, remote_offset: usize) -> Result<()> {
        if self.config.post_failure_rate > 0.0 && self.roll() < self.config.post_failure_rate {
            self.posts_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(EvbError::fabric("chaos-injected post failure"));
        }
        self.inner.post(bytes, dst, remote_offset)
    }

    fn remote_address(&self, dst: u8, remote_offset: usize) -> *const u8 {
        self.inner.remote_address(dst, remote_offset)
    }

    fn shutdown(&self) {
        self.inner.shutdown()
    }
}
