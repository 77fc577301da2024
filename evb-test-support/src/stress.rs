//! Drives a full inlet/outlet pipeline against a [`LoopbackFabric`] for a
//! fixed duration and reports throughput, mirroring a real deployment's
//! shape closely enough to catch pool sizing and backpressure regressions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use evb_core::capability::{Capabilities, OrReduceCapabilities};
use evb_core::{Config, EventBuilder, EventResult, Fragment, FragmentHeader, LoopbackFabric, Metrics, Outlet, OutletWorker, Pool};

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub duration: Duration,
    pub contributors: u8,
    pub report_interval: Duration,
    pub core: Config,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
            contributors: 4,
            report_interval: Duration::from_secs(1),
            core: Config::default(),
        }
    }
}

impl StressConfig {
    pub fn new(duration: Duration) -> Self {
        Self { duration, ..Default::default() }
    }

    pub fn with_contributors(mut self, n: u8) -> Self {
        self.contributors = n;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StressMetrics {
    pub fragments_submitted: u64,
    pub events_completed: u64,
    pub events_timed_out: u64,
    pub duration: Duration,
}

impl StressMetrics {
    pub fn events_per_second(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds == 0.0 {
            0.0
        } else {
            (self.events_completed + self.events_timed_out) as f64 / seconds
        }
    }
}

struct FullContract(u64);
impl Capabilities for FullContract {
    fn contract(&self, _first_fragment: &Fragment) -> u64 {
        self.0
    }
    fn reduce(&self, result: &mut EventResult, fragment: &Fragment) {
        OrReduceCapabilities.reduce(result, fragment);
    }
    fn fixup(&self, result: &mut EventResult, missing_producer: u8) {
        OrReduceCapabilities.fixup(result, missing_producer);
    }
}

pub struct StressRunner;

impl StressRunner {
    /// Runs one contributor-feeding inlet thread plus a dedicated outlet
    /// thread for `config.duration`, then tears both down and returns the
    /// accumulated counters.
    pub fn run(config: StressConfig) -> StressMetrics {
        let contract = if config.contributors >= 64 { u64::MAX } else { (1u64 << config.contributors) - 1 };

        let results_pool = Arc::new(Pool::new(config.core.results_pool_size));
        let metrics = Arc::new(Metrics::new());
        let mut builder = EventBuilder::new(FullContract(contract), config.core.timeout_epochs, results_pool.clone(), metrics.clone());
        let (mut outlet, receiver) =
            Outlet::new(config.core.batch_pool_size, config.core.max_entries, config.core.batch_duration);

        let fabric = Arc::new(LoopbackFabric::new(config.contributors as usize));
        let worker = Arc::new(OutletWorker::new(receiver, results_pool, fabric.clone(), config.core.max_batch_size, metrics.clone()));

        let running = Arc::new(AtomicBool::new(true));
        let outlet_thread = {
            let worker = worker.clone();
            thread::spawn(move || worker.run())
        };

        // Every contributor reads (never advances) the same shared pulse-id,
        // so concurrent contributions land on the same event and most
        // events complete by aggregation rather than timeout fixup. The
        // inlet thread advances the counter every few epochs.
        let shared_pulse_id = Arc::new(AtomicU64::new(0));
        let feeders: Vec<_> = (0..config.contributors)
            .map(|producer_id| {
                let fabric = fabric.clone();
                let running = running.clone();
                let shared_pulse_id = shared_pulse_id.clone();
                thread::spawn(move || feed(producer_id, &fabric, &running, &shared_pulse_id))
            })
            .collect();

        let start = Instant::now();
        let mut epoch = 0u64;
        let mut last_report = start;
        while start.elapsed() < config.duration {
            if let Some(inbound) = fabric.pend() {
                let bytes = unsafe { inbound.as_bytes() };
                if let Ok(fragment) = Fragment::parse(bytes) {
                    let _ = builder.process(&fragment, &mut outlet);
                }
            }
            epoch += 1;
            if epoch % 8 == 0 {
                shared_pulse_id.fetch_add(1, Ordering::Relaxed);
            }
            let _ = builder.tick(epoch, &mut outlet);

            if last_report.elapsed() >= config.report_interval {
                let snapshot = metrics.snapshot();
                println!("  t={:?} {}", start.elapsed(), snapshot);
                last_report = Instant::now();
            }
        }

        running.store(false, Ordering::SeqCst);
        fabric.shutdown();
        for feeder in feeders {
            let _ = feeder.join();
        }
        let _ = outlet.flush();
        drop(outlet);
        let _ = outlet_thread.join();

        let snapshot = metrics.snapshot();
        StressMetrics {
            fragments_submitted: snapshot.fragments_accepted,
            events_completed: snapshot.events_completed,
            events_timed_out: snapshot.events_timed_out,
            duration: start.elapsed(),
        }
    }
}

fn feed(producer_id: u8, fabric: &LoopbackFabric, running: &AtomicBool, shared_pulse_id: &AtomicU64) {
    while running.load(Ordering::Relaxed) {
        let pulse_id = shared_pulse_id.load(Ordering::Relaxed);
        let header = FragmentHeader {
            pulse_id,
            service: 0,
            source_tag: FragmentHeader::pack_source_tag(producer_id, 0),
            extent: 20,
        };
        let payload = [1u32, 0, 0, 0, 0];
        let mut bytes = bytemuck::bytes_of(&header).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(&payload));
        fabric.deliver(bytes);
        thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_run_completes_some_events() {
        let config = StressConfig::new(Duration::from_millis(200)).with_contributors(2);
        let metrics = StressRunner::run(config);
        assert!(metrics.fragments_submitted > 0);
    }
}
