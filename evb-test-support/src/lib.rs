//! Stress and chaos testing infrastructure for the event builder core.
//!
//! - **ChaosFabric** - wraps a [`Fabric`](evb_core::Fabric) and injects
//!   random post failures and `pend` delays, for exercising the
//!   transport-transient error path.
//! - **StressRunner** - drives a full inlet/outlet pipeline at a target
//!   contributor count for a fixed duration and reports throughput.
//! - **SequenceChecker** - verifies the ascending-key-delivery and
//!   no-duplicate-emission invariants against a stream of completions.

pub mod chaos;
pub mod stress;
pub mod verify;

pub use chaos::{ChaosConfig, ChaosFabric};
pub use stress::{StressConfig, StressMetrics, StressRunner};
pub use verify::SequenceChecker;
