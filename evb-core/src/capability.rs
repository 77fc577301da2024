//! Pluggable read-out behaviour.
//!
//! The reference implementation this core was distilled from let a subclass
//! override `process(EbEvent*)`, `contract()` and `fixup()` through virtual
//! dispatch. There is no type hierarchy here: a [`Capabilities`] is a plain
//! trait object with three narrow methods, handed to the [`EventBuilder`](crate::builder::EventBuilder)
//! at construction time.

use crate::result::EventResult;
use crate::wire::Fragment;

/// The three decision points the event table defers to the caller.
pub trait Capabilities: Send + Sync {
    /// Bitmask of producer ids required for the read-out group this event's
    /// first fragment belongs to. Called exactly once, when an event is
    /// created from its first arriving fragment.
    fn contract(&self, first_fragment: &Fragment) -> u64;

    /// Fold one arrived fragment into the result being accumulated for its
    /// event. Called once per accepted (non-duplicate) fragment, in arrival
    /// order, including the creator.
    fn reduce(&self, result: &mut EventResult, fragment: &Fragment);

    /// Called once per producer that was still outstanding when an event's
    /// deadline passed, before the event is force-completed. Implementations
    /// mark the result damaged and may adjust its payload to reflect the
    /// gap; they cannot supply a destination for the missing producer since
    /// no fragment — and so no remote index — was ever received from it.
    fn fixup(&self, result: &mut EventResult, missing_producer: u8);
}

/// The reference reduction named in the core's testable properties: each
/// contributor's payload words are OR-ed into the result, and a missing
/// contributor only marks the result damaged.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrReduceCapabilities;

impl Capabilities for OrReduceCapabilities {
    fn contract(&self, _first_fragment: &Fragment) -> u64 {
        // Single read-out group: every configured contributor is required.
        // Per-event routing groups are supported by the trait; this
        // reference implementation does not need them.
        u64::MAX
    }

    fn reduce(&self, result: &mut EventResult, fragment: &Fragment) {
        for (word, contributed) in result.payload.iter_mut().zip(fragment.payload.iter()) {
            *word |= *contributed;
        }
        result.destinations.push(crate::result::Destination {
            producer_id: fragment.producer_id(),
            remote_index: fragment.remote_index(),
        });
    }

    fn fixup(&self, result: &mut EventResult, _missing_producer: u8) {
        result.damaged = true;
    }
}
