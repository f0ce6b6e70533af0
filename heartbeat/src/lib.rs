pub mod aggregator;
pub mod cfg;
pub mod chain;
pub mod checkpoint;
pub mod client;
pub mod contracts;
pub mod emitter;
pub mod error;
pub mod heartbeat;
pub mod ingest;
pub mod metrics;
pub mod paginator;
pub mod retry;
#[cfg(any(test, feature = "fake_chain"))]
pub mod test_util;

/// The federator version reported in every heartbeat.
pub const FEDERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
