//! Tracing hooks for the builder and outlet threads. Zero-cost when the
//! `tracing` feature is disabled.

#[cfg(feature = "tracing")]
#[inline]
pub fn span_fragment(pulse_id: u64, producer_id: u8) -> tracing::Span {
    tracing::trace_span!("fragment", pulse_id, producer_id)
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn span_fragment(_pulse_id: u64, _producer_id: u8) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_completion(pulse_id: u64, timed_out: bool) {
    if timed_out {
        tracing::warn!(pulse_id, "event force-completed by timeout");
    } else {
        tracing::trace!(pulse_id, "event completed");
    }
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_completion(_pulse_id: u64, _timed_out: bool) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_duplicate(pulse_id: u64, producer_id: u8) {
    tracing::debug!(pulse_id, producer_id, "duplicate or out-of-contract contribution ignored");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_duplicate(_pulse_id: u64, _producer_id: u8) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_batch_closed(window: u64, entries: usize) {
    tracing::debug!(window, entries, "batch closed");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_batch_closed(_window: u64, _entries: usize) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_transient_post_failure(destination: u8) {
    tracing::warn!(destination, "post failed for one destination, dropped");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_transient_post_failure(_destination: u8) {}
