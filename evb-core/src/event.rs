//! `EbEvent` — the accumulator for one sequence key.
//!
//! The reference this core grew out of links arrived contributions into an
//! intrusive doubly-linked ring, walked once the event completes to build
//! its result. That ring exists only to defer the fold; since the fold
//! itself (`Capabilities::reduce`) is associative over arrival order, this
//! version performs it eagerly as each fragment is accepted and keeps no
//! per-contribution state at all — the "arena" the ring would have lived in
//! collapses to the result accumulator itself. See `DESIGN.md` for the
//! tradeoff this records.

use crate::result::EventResult;
use crate::wire::{Fragment, FragmentHeader};

/// The accumulator for one event, keyed by its sequence key (pulse id).
///
/// Invariants: `remaining` is always a subset of `contract`; the event is
/// complete iff `remaining` is empty; an `EbEvent` is destroyed exactly once
/// a [`EventResult`] has been emitted for it.
pub struct EbEvent {
    pub key: u64,
    pub contract: u64,
    pub remaining: u64,
    /// Epoch at creation time, used to detect a stalled event during timeout
    /// sweeps.
    pub created_epoch: u64,
    /// True once `remaining` is empty (completed) or force-completed by
    /// timeout; the table only ever emits events in ascending key order, so
    /// a ready event may still wait behind an older, unready one.
    pub ready: bool,
    pub result: EventResult,
}

impl EbEvent {
    /// Create a new event from its creator fragment — whichever fragment
    /// arrives first for this key. The creator's header becomes the
    /// template for the result's own header.
    pub fn new(creator: &Fragment, contract: u64, created_epoch: u64) -> Self {
        Self {
            key: creator.pulse_id(),
            contract,
            remaining: contract,
            created_epoch,
            ready: false,
            result: EventResult::new(creator.header),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    fn producer_bit(producer_id: u8) -> u64 {
        1u64 << (producer_id as u32)
    }

    /// True if `producer_id` is still outstanding for this event.
    pub fn is_outstanding(&self, producer_id: u8) -> bool {
        self.remaining & Self::producer_bit(producer_id) != 0
    }

    /// Clear `producer_id` from the remaining set. No-op, returning `false`,
    /// if the producer had already contributed (or was never part of the
    /// contract) — callers use this to detect and ignore duplicates.
    pub fn clear(&mut self, producer_id: u8) -> bool {
        let bit = Self::producer_bit(producer_id);
        if self.remaining & bit == 0 {
            return false;
        }
        self.remaining &= !bit;
        if self.remaining == 0 {
            self.ready = true;
        }
        true
    }

    /// Producer ids still outstanding, lowest id first.
    pub fn missing_producers(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(move |&id| self.is_outstanding(id))
    }

    pub fn header(&self) -> &FragmentHeader {
        &self.result.header
    }
}
