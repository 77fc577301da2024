//! Map from event key to partially-built event; completion and expiry.
//!
//! Backed by a `BTreeMap` rather than the reference implementation's
//! hand-rolled sorted linked list — same "emit from the head while the head
//! is complete-or-expired" shape, O(log n) insert instead of O(1), and no
//! unsafe intrusive links to get wrong.

use std::collections::BTreeMap;

use crate::capability::Capabilities;
use crate::event::EbEvent;
use crate::wire::Fragment;

/// Map from sequence key to in-progress event, with ascending-key delivery.
pub struct EventTable<C: Capabilities> {
    events: BTreeMap<u64, EbEvent>,
    capabilities: C,
    timeout_epochs: u64,
    current_epoch: u64,
}

impl<C: Capabilities> EventTable<C> {
    pub fn new(capabilities: C, timeout_epochs: u64) -> Self {
        Self { events: BTreeMap::new(), capabilities, timeout_epochs, current_epoch: 0 }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Insert one fragment and return any events this made ready to emit, in
    /// ascending key order, plus whether the fragment itself was accepted
    /// (`false` for a duplicate, or a contributor outside the event's
    /// contract). Usually the ready list is empty or holds a single event;
    /// it can hold more if this fragment's arrival was also enough to drain
    /// events that were blocked behind it.
    pub fn process(&mut self, fragment: &Fragment) -> (Vec<EbEvent>, bool) {
        let capabilities = &self.capabilities;
        let current_epoch = self.current_epoch;
        let event = self
            .events
            .entry(fragment.pulse_id())
            .or_insert_with(|| {
                let contract = capabilities.contract(fragment);
                EbEvent::new(fragment, contract, current_epoch)
            });

        let accepted = event.clear(fragment.producer_id());
        if accepted {
            self.capabilities.reduce(&mut event.result, fragment);
        }
        // else: duplicate contributor, or one outside this event's contract
        // — a protocol violation, logged by the caller and otherwise ignored.

        (self.drain_ready(), accepted)
    }

    /// Advance the expiry epoch and force-complete any event at the head of
    /// the table that has aged past `timeout_epochs`. Returns newly-emitted
    /// events, in ascending key order.
    pub fn tick(&mut self, new_epoch: u64) -> Vec<EbEvent> {
        self.current_epoch = new_epoch;
        self.drain_ready()
    }

    fn drain_ready(&mut self) -> Vec<EbEvent> {
        let mut drained = Vec::new();
        loop {
            let Some(mut entry) = self.events.first_entry() else { break };

            if entry.get().ready {
                drained.push(entry.remove());
                continue;
            }

            let age = self.current_epoch.saturating_sub(entry.get().created_epoch);
            if age >= self.timeout_epochs {
                let missing: Vec<u8> = entry.get().missing_producers().collect();
                {
                    let event = entry.get_mut();
                    for producer in missing {
                        self.capabilities.fixup(&mut event.result, producer);
                        event.remaining &= !(1u64 << (producer as u32));
                    }
                    event.ready = true;
                }
                drained.push(entry.remove());
                continue;
            }

            // Head is neither ready nor expired: stop. Anything behind it
            // must wait, preserving ascending-key delivery.
            break;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OrReduceCapabilities;
    use crate::wire::FragmentHeader;

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

    fn contract(ids: &[u8]) -> u64 {
        ids.iter().fold(0u64, |acc, &id| acc | (1 << id))
    }

    struct FixedContract(u64);
    impl Capabilities for FixedContract {
        fn contract(&self, _f: &Fragment) -> u64 {
            self.0
        }
        fn reduce(&self, result: &mut crate::result::EventResult, fragment: &Fragment) {
            OrReduceCapabilities.reduce(result, fragment);
        }
        fn fixup(&self, result: &mut crate::result::EventResult, missing: u8) {
            OrReduceCapabilities.fixup(result, missing);
        }
    }

    #[test]
    fn single_contributor_two_events() {
        let mut table = EventTable::new(FixedContract(contract(&[0])), 4);
        let (ready, accepted) = table.process(&fragment(0x100, 0, &[1, 0, 0, 0, 0]));
        assert!(accepted);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].key, 0x100);
        assert_eq!(ready[0].result.payload, [1, 0, 0, 0, 0]);

        let (ready, _) = table.process(&fragment(0x200, 0, &[2, 0, 0, 0, 0]));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].key, 0x200);
    }

    #[test]
    fn two_contributors_complete_event() {
        let mut table = EventTable::new(FixedContract(contract(&[0, 1])), 4);
        assert!(table.process(&fragment(0x80, 0, &[1, 0, 0, 0, 0])).0.is_empty());
        let (ready, _) = table.process(&fragment(0x80, 1, &[0, 2, 0, 0, 0]));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].result.payload, [1, 2, 0, 0, 0]);
        assert_eq!(ready[0].result.destinations.len(), 2);
    }

    #[test]
    fn missing_contributor_times_out_with_damage() {
        let mut table = EventTable::new(FixedContract(contract(&[0, 1])), 2);
        assert!(table.process(&fragment(0x80, 0, &[1, 0, 0, 0, 0])).0.is_empty());
        assert!(table.tick(1).is_empty());
        let ready = table.tick(2);
        assert_eq!(ready.len(), 1);
        assert!(ready[0].result.damaged);
        assert_eq!(ready[0].result.destinations.len(), 1);
        assert_eq!(ready[0].result.destinations.as_slice()[0].producer_id, 0);
    }

    #[test]
    fn completions_delivered_in_ascending_key_order() {
        let mut table = EventTable::new(FixedContract(contract(&[0, 1])), 4);
        // Older event (0x10) arrives first and is left incomplete; newer
        // event (0x20) completes immediately but must wait behind it.
        assert!(table.process(&fragment(0x10, 0, &[1, 0, 0, 0, 0])).0.is_empty());
        assert!(table.process(&fragment(0x20, 0, &[1, 0, 0, 0, 0])).0.is_empty());
        assert!(table.process(&fragment(0x20, 1, &[0, 1, 0, 0, 0])).0.is_empty());
        assert_eq!(table.len(), 2);

        // Completing the older event now must flush both, oldest first.
        let (ready, _) = table.process(&fragment(0x10, 1, &[0, 1, 0, 0, 0]));
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].key, 0x10);
        assert_eq!(ready[1].key, 0x20);
    }

    #[test]
    fn duplicate_contribution_is_a_no_op() {
        let mut table = EventTable::new(FixedContract(contract(&[0, 1])), 4);
        assert!(table.process(&fragment(0x80, 0, &[1, 0, 0, 0, 0])).0.is_empty());
        let (ready, accepted) = table.process(&fragment(0x80, 0, &[9, 9, 9, 9, 9]));
        assert!(ready.is_empty());
        assert!(!accepted, "duplicate contribution must be rejected");
        let (ready, _) = table.process(&fragment(0x80, 1, &[0, 2, 0, 0, 0]));
        assert_eq!(ready[0].result.payload, [1, 2, 0, 0, 0]);
        assert_eq!(ready[0].result.destinations.len(), 2);
    }
}
