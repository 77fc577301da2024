//! Event builder core: aggregates per-event fragments from a fixed set of
//! contributors into a single result and routes it back to everyone the
//! event is owed to.
//!
//! Two long-running roles drive the pipeline: an inlet
//! ([`EventBuilder`](builder::EventBuilder)) that dispatches fragments into
//! an [`EventTable`](event_table::EventTable) and allocates/posts a
//! [`EventResult`](result::EventResult) for every event it completes, and an
//! outlet ([`Outlet`](outlet::Outlet) / [`OutletWorker`](outlet::OutletWorker))
//! that packs those results into outbound batches and transmits them
//! through a [`Fabric`](fabric::Fabric). Memory on both sides comes from a
//! [`Pool`](pool::Pool): a fixed-capacity, resource-waiting slab allocator
//! whose dense indices double as remote addresses.
//!
//! Read-out behaviour (what "required contributors for this event" and
//! "fold a fragment into the result" mean) is supplied by the caller through
//! [`Capabilities`](capability::Capabilities); [`OrReduceCapabilities`](capability::OrReduceCapabilities)
//! is the reference reduction this crate's own tests are written against.

pub mod batch;
pub mod batch_manager;
pub mod builder;
pub mod capability;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod event_table;
pub mod fabric;
pub mod insights;
pub mod metrics;
pub mod outlet;
pub mod pool;
pub mod result;
pub mod wire;

pub use batch::Batch;
pub use batch_manager::{BatchManager, ClosedBatch};
pub use builder::EventBuilder;
pub use capability::{Capabilities, OrReduceCapabilities};
pub use config::Config;
pub use error::{EvbError, Result};
pub use event::EbEvent;
pub use event_table::EventTable;
pub use fabric::{Fabric, LoopbackFabric};
pub use metrics::{Metrics, MetricsSnapshot};
pub use outlet::{Outlet, OutletWorker};
pub use pool::Pool;
pub use result::{Destination, DestinationList, EventResult};
pub use wire::{Fragment, FragmentHeader};
