//! Core sizing constants for the event builder.

/// Maximum number of contributors a single contract can name.
pub const MAX_CONTRIBUTORS: usize = 64;

/// Maximum number of (destination, remote index) pairs carried by a Result.
pub const MAX_DESTINATIONS: usize = MAX_CONTRIBUTORS;

/// Default number of cells in the results pool.
pub const DEFAULT_RESULTS_POOL_SIZE: usize = 128;

/// Default number of cells in the outbound batch pool.
pub const DEFAULT_BATCH_POOL_SIZE: usize = 16;

/// Default number of child datagrams packed per batch.
pub const DEFAULT_MAX_ENTRIES: usize = 128;

/// Default batch window, in sequence-key units. Must be a power of 2.
pub const DEFAULT_BATCH_DURATION: u64 = 0x80;

/// Default number of epoch ticks before a non-complete event is force-fixed up.
pub const DEFAULT_TIMEOUT_EPOCHS: u64 = 4;

/// Default inline payload capacity of a result, in 32-bit words.
pub const DEFAULT_RESULT_EXTENT_WORDS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_duration_is_power_of_two() {
        assert!(DEFAULT_BATCH_DURATION.is_power_of_two());
    }

    #[test]
    fn destinations_cover_all_contributors() {
        assert_eq!(MAX_DESTINATIONS, MAX_CONTRIBUTORS);
    }
}
