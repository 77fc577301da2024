//! Shared-memory client contract for processes that consume event builder
//! output out-of-band from the fabric.
//!
//! The event builder core never touches this crate; it is a separate
//! workspace member only because downstream readers are specified against
//! it. Mirrors the connect/get/free/unlink shape of the reference shared
//! memory client, and the create/open split of a publish-subscribe pair:
//! a [`ShmemProducer`] publishes events into a segment, any number of
//! [`ShmemClient`]s read them back out.
//!
//! Clients that connect with the same `ev_index` compete for each event
//! (round-robin hand-off); clients with distinct `ev_index` values each see
//! every event independently, forming parallel fan-out chains.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShmemError {
    #[error("no segment registered for tag {0:?}")]
    NoSuchSegment(String),
    #[error("tr_index {0} is already connected to tag {1:?}")]
    DuplicateTrIndex(i32, String),
    #[error("segment {0:?} was unlinked")]
    Unlinked(String),
}

pub type Result<T> = std::result::Result<T, ShmemError>;

/// Registry of live segments, keyed by tag. Stands in for the named shared
/// memory object a real deployment would `shm_open` by that name.
static SEGMENTS: OnceLock<Mutex<HashMap<String, Arc<Segment>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<Segment>>> {
    SEGMENTS.get_or_init(|| Mutex::new(HashMap::new()))
}

struct Slot {
    bytes: Vec<u8>,
}

struct Segment {
    tag: String,
    slots: Mutex<Vec<Option<Slot>>>,
    free: Mutex<Vec<i32>>,
    free_available: Condvar,
    groups: Mutex<HashMap<i32, (Sender<(i32, usize)>, Receiver<(i32, usize)>)>>,
    connected_tr_indices: Mutex<Vec<i32>>,
}

impl Segment {
    fn new(tag: String, capacity: usize) -> Self {
        Self {
            tag,
            slots: Mutex::new((0..capacity).map(|_| None).collect()),
            free: Mutex::new((0..capacity as i32).collect()),
            free_available: Condvar::new(),
            groups: Mutex::new(HashMap::new()),
            connected_tr_indices: Mutex::new(Vec::new()),
        }
    }

    fn group_receiver(&self, ev_index: i32) -> Receiver<(i32, usize)> {
        let mut groups = self.groups.lock();
        groups
            .entry(ev_index)
            .or_insert_with(|| crossbeam_channel::unbounded())
            .1
            .clone()
    }

    fn publish(&self, bytes: &[u8]) -> i32 {
        let index = {
            let mut free = self.free.lock();
            while free.is_empty() {
                self.free_available.wait(&mut free);
            }
            free.pop().unwrap()
        };
        self.slots.lock()[index as usize] = Some(Slot { bytes: bytes.to_vec() });

        let groups = self.groups.lock();
        for (sender, _) in groups.values() {
            let _ = sender.send((index, bytes.len()));
        }
        index
    }

    fn free(&self, index: i32) {
        self.slots.lock()[index as usize] = None;
        let mut free = self.free.lock();
        free.push(index);
        self.free_available.notify_one();
    }
}

/// Publishing side of a segment; creates it if this is the first handle for
/// `tag`.
pub struct ShmemProducer {
    segment: Arc<Segment>,
}

impl ShmemProducer {
    pub fn create(tag: &str, capacity: usize) -> Self {
        let segment = registry()
            .lock()
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(Segment::new(tag.to_string(), capacity)))
            .clone();
        Self { segment }
    }

    /// Copies `bytes` into a free slot and hands its index to every
    /// connected read-out group. Blocks if the segment is exhausted.
    pub fn publish(&self, bytes: &[u8]) -> i32 {
        self.segment.publish(bytes)
    }
}

/// One downstream reader's handle onto a segment.
pub struct ShmemClient {
    segment: Arc<Segment>,
    tr_index: i32,
    inbox: Receiver<(i32, usize)>,
}

impl ShmemClient {
    /// `tr_index` must be unique among clients of the same tag. `ev_index`
    /// groups clients: common values compete round-robin for each event,
    /// distinct values each form an independent fan-out chain.
    pub fn connect(tag: &str, tr_index: i32, ev_index: i32) -> Result<Self> {
        let segment = registry()
            .lock()
            .get(tag)
            .cloned()
            .ok_or_else(|| ShmemError::NoSuchSegment(tag.to_string()))?;

        let mut connected = segment.connected_tr_indices.lock();
        if connected.contains(&tr_index) {
            return Err(ShmemError::DuplicateTrIndex(tr_index, tag.to_string()));
        }
        connected.push(tr_index);
        drop(connected);

        let inbox = segment.group_receiver(ev_index);
        Ok(Self { segment, tr_index, inbox })
    }

    pub fn tr_index(&self) -> i32 {
        self.tr_index
    }

    /// Blocks until the next event assigned to this client's group arrives.
    /// Returns the slot index and its byte size.
    pub fn get(&mut self) -> Result<(i32, usize)> {
        self.inbox
            .recv()
            .map_err(|_| ShmemError::Unlinked(self.segment.tag.clone()))
    }

    /// Non-blocking variant of [`Self::get`].
    pub fn try_get(&mut self) -> Option<(i32, usize)> {
        self.inbox.try_recv().ok()
    }

    /// Reads the bytes currently held in `index` without releasing it.
    pub fn peek(&self, index: i32) -> Option<Vec<u8>> {
        self.segment.slots.lock()[index as usize].as_ref().map(|slot| slot.bytes.clone())
    }

    /// Returns a consumed slot to the free list.
    pub fn free(&mut self, index: i32, _size: usize) {
        self.segment.free(index);
    }

    /// Removes the backing segment for every client sharing this tag.
    pub fn unlink(&mut self) {
        registry().lock().remove(&self.segment.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competing_clients_round_robin_one_event_each() {
        let tag = "evb-ipc-test-compete";
        let producer = ShmemProducer::create(tag, 4);
        let mut a = ShmemClient::connect(tag, 0, 0).unwrap();
        let mut b = ShmemClient::connect(tag, 1, 0).unwrap();

        producer.publish(b"one");
        producer.publish(b"two");

        let first = a.get().unwrap();
        let second = b.get().unwrap();
        assert_ne!(first.0, second.0);
        a.unlink();
    }

    #[test]
    fn distinct_groups_each_see_every_event() {
        let tag = "evb-ipc-test-fanout";
        let producer = ShmemProducer::create(tag, 4);
        let mut a = ShmemClient::connect(tag, 0, 0).unwrap();
        let mut b = ShmemClient::connect(tag, 1, 1).unwrap();

        let index = producer.publish(b"payload");
        assert_eq!(a.get().unwrap().0, index);
        assert_eq!(b.get().unwrap().0, index);
        a.unlink();
    }

    #[test]
    fn free_returns_a_slot_for_reuse() {
        let tag = "evb-ipc-test-free";
        let producer = ShmemProducer::create(tag, 1);
        let mut client = ShmemClient::connect(tag, 0, 0).unwrap();

        let first = producer.publish(b"a");
        let (index, size) = client.get().unwrap();
        assert_eq!(index, first);
        client.free(index, size);

        let second = producer.publish(b"b");
        assert_eq!(second, first, "only slot was freed so it must be reused");
        client.unlink();
    }

    #[test]
    fn duplicate_tr_index_is_rejected() {
        let tag = "evb-ipc-test-dup";
        let _producer = ShmemProducer::create(tag, 1);
        let mut a = ShmemClient::connect(tag, 0, 0).unwrap();
        assert!(ShmemClient::connect(tag, 0, 0).is_err());
        a.unlink();
    }
}
