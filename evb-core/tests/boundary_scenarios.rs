//! Literal boundary scenarios against the public API.

use std::sync::Arc;

use evb_core::capability::{Capabilities, OrReduceCapabilities};
use evb_core::{BatchManager, EventBuilder, EventResult, Fragment, FragmentHeader, Metrics, Outlet, OutletWorker, Pool};

fn fragment(pulse_id: u64, producer: u8, payload: &'static [u32]) -> Fragment<'static> {
    Fragment {
        header: FragmentHeader {
            pulse_id,
            service: 0,
            source_tag: FragmentHeader::pack_source_tag(producer, 0),
            extent: (payload.len() * 4) as u32,
        },
        payload,
    }
}

struct FixedContract(u64);
impl Capabilities for FixedContract {
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

fn contract(ids: &[u8]) -> u64 {
    ids.iter().fold(0u64, |acc, &id| acc | (1 << id))
}

#[test]
fn s1_single_contributor_two_events() {
    let results_pool = Arc::new(Pool::new(8));
    let metrics = Arc::new(Metrics::new());
    let mut builder = EventBuilder::new(FixedContract(contract(&[0])), 4, results_pool.clone(), metrics.clone());
    let (mut outlet, receiver) = Outlet::new(4, 128, 0x1000);
    let fabric = Arc::new(evb_core::LoopbackFabric::new(1));
    let worker = OutletWorker::new(receiver, results_pool, fabric.clone(), 4096, metrics);

    builder.process(&fragment(0x100, 0, &[0x1, 0, 0, 0, 0]), &mut outlet).unwrap();
    builder.process(&fragment(0x200, 0, &[0x2, 0, 0, 0, 0]), &mut outlet).unwrap();
    outlet.flush().unwrap();
    while worker.try_transmit_one() {}

    let posted = fabric.take_mailbox(0);
    assert_eq!(posted.len(), 2, "one Result per event, both addressed to producer 0");
}

#[test]
fn s2_two_contributors_complete_event() {
    let results_pool = Arc::new(Pool::new(8));
    let metrics = Arc::new(Metrics::new());
    let mut builder = EventBuilder::new(FixedContract(contract(&[0, 1])), 4, results_pool.clone(), metrics.clone());
    let (mut outlet, receiver) = Outlet::new(4, 128, 0x1000);
    let fabric = Arc::new(evb_core::LoopbackFabric::new(2));
    let worker = OutletWorker::new(receiver, results_pool, fabric.clone(), 4096, metrics.clone());

    builder.process(&fragment(0x80, 0, &[0x1, 0, 0, 0, 0]), &mut outlet).unwrap();
    builder.process(&fragment(0x80, 1, &[0x0, 0x2, 0, 0, 0]), &mut outlet).unwrap();
    outlet.flush().unwrap();
    while worker.try_transmit_one() {}

    assert_eq!(fabric.take_mailbox(0).len(), 1);
    assert_eq!(fabric.take_mailbox(1).len(), 1);
    assert_eq!(metrics.snapshot().events_completed, 1);
}

#[test]
fn s3_missing_contributor_triggers_fixup() {
    let results_pool = Arc::new(Pool::new(8));
    let metrics = Arc::new(Metrics::new());
    let mut builder = EventBuilder::new(FixedContract(contract(&[0, 1])), 2, results_pool.clone(), metrics.clone());
    let (mut outlet, receiver) = Outlet::new(4, 128, 0x1000);
    let fabric = Arc::new(evb_core::LoopbackFabric::new(2));
    let worker = OutletWorker::new(receiver, results_pool, fabric.clone(), 4096, metrics.clone());

    builder.process(&fragment(0x80, 0, &[0x1, 0, 0, 0, 0]), &mut outlet).unwrap();
    builder.tick(1, &mut outlet).unwrap();
    builder.tick(2, &mut outlet).unwrap();
    outlet.flush().unwrap();
    while worker.try_transmit_one() {}

    assert_eq!(fabric.take_mailbox(0).len(), 1, "producer 0 still gets the damaged Result");
    assert!(fabric.take_mailbox(1).is_empty(), "producer 1 never contributed, never a destination");
    assert_eq!(metrics.snapshot().events_timed_out, 1);
}

#[test]
fn s4_batch_window_boundary() {
    let mut mgr: BatchManager<u64> = BatchManager::new(4, 128, 0x80);
    assert!(mgr.process(0x080, 0x080).is_none());
    assert!(mgr.process(0x090, 0x090).is_none());
    let a = mgr.process(0x100, 0x100).expect("0x100 is in a new window");
    assert_eq!(a.entries(), &[0x080, 0x090]);
    a.release();

    let b = mgr.flush().expect("0x100 is still open");
    assert_eq!(b.entries(), &[0x100]);
    b.release();
}

#[test]
fn s5_max_entries_boundary() {
    let mut mgr: BatchManager<u64> = BatchManager::new(4, 2, 0x1000);
    assert!(mgr.process(0x10, 0x10).is_none());
    assert!(mgr.process(0x20, 0x20).is_none());
    let a = mgr.process(0x30, 0x30).expect("maxEntries reached");
    assert_eq!(a.entries(), &[0x10, 0x20]);
    a.release();

    let b = mgr.flush().expect("0x30 is still open");
    assert_eq!(b.entries(), &[0x30]);
    b.release();
}

#[test]
fn s6_pool_backpressure_blocks_the_second_batch() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let mut mgr: BatchManager<u64> = BatchManager::new(1, 1, 0x1000);
    assert!(mgr.process(0x10, 0x10).is_none());
    let first = mgr.flush().expect("first batch closed, cell held undelivered");

    let pool = mgr.pool().clone();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let (index, _) = pool.alloc();
        tx.send(index).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "second batch must block while the pool is exhausted");
    first.release();
    handle.join().unwrap();
}
