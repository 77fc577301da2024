//! Validated sizing/timing configuration for one [`EventBuilder`](crate::builder::EventBuilder) /
//! [`Outlet`](crate::outlet::Outlet) pair.

use crate::constants::{
    DEFAULT_BATCH_DURATION, DEFAULT_BATCH_POOL_SIZE, DEFAULT_MAX_ENTRIES, DEFAULT_RESULTS_POOL_SIZE,
    DEFAULT_TIMEOUT_EPOCHS,
};
use crate::error::{EvbError, Result};

/// Every field here is validated once, at construction, so the rest of the
/// core can treat a `Config` as already-correct.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub results_pool_size: usize,
    pub batch_pool_size: usize,
    pub max_entries: usize,
    pub batch_duration: u64,
    pub timeout_epochs: u64,
    /// Per-destination remote region stride, used to compute `remoteOffset`
    /// from a destination's remote buffer index.
    pub max_batch_size: usize,
}

impl Config {
    pub fn new(
        results_pool_size: usize,
        batch_pool_size: usize,
        max_entries: usize,
        batch_duration: u64,
        timeout_epochs: u64,
        max_batch_size: usize,
    ) -> Result<Self> {
        if results_pool_size == 0 {
            return Err(EvbError::config("resultsPoolSize must be nonzero"));
        }
        if batch_pool_size == 0 {
            return Err(EvbError::config("batchPoolSize must be nonzero"));
        }
        if max_entries == 0 {
            return Err(EvbError::config("maxEntries must be nonzero"));
        }
        if !batch_duration.is_power_of_two() {
            return Err(EvbError::config("batchDuration must be a power of two"));
        }
        if timeout_epochs == 0 {
            return Err(EvbError::config("timeoutEpochs must be nonzero"));
        }
        if max_batch_size == 0 {
            return Err(EvbError::config("maxBatchSize must be nonzero"));
        }
        Ok(Self {
            results_pool_size,
            batch_pool_size,
            max_entries,
            batch_duration,
            timeout_epochs,
            max_batch_size,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_pool_size: DEFAULT_RESULTS_POOL_SIZE,
            batch_pool_size: DEFAULT_BATCH_POOL_SIZE,
            max_entries: DEFAULT_MAX_ENTRIES,
            batch_duration: DEFAULT_BATCH_DURATION,
            timeout_epochs: DEFAULT_TIMEOUT_EPOCHS,
            max_batch_size: 1 << 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(Config::new(
            config.results_pool_size,
            config.batch_pool_size,
            config.max_entries,
            config.batch_duration,
            config.timeout_epochs,
            config.max_batch_size,
        )
        .is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_batch_duration() {
        let config = Config::default();
        assert!(Config::new(
            config.results_pool_size,
            config.batch_pool_size,
            config.max_entries,
            0x81,
            config.timeout_epochs,
            config.max_batch_size,
        )
        .is_err());
    }

    #[test]
    fn rejects_zero_max_entries() {
        let config = Config::default();
        assert!(Config::new(
            config.results_pool_size,
            config.batch_pool_size,
            0,
            config.batch_duration,
            config.timeout_epochs,
            config.max_batch_size,
        )
        .is_err());
    }
}
