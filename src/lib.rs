//! Asynchronous multi-subscriber data distribution for an archive node.
//!
//! Newly archived files (or a subscriber's catch-up scan) are resolved into
//! candidates, filtered per subscriber, queued, and pushed over HTTP by a
//! per-subscriber worker pool. Failed deliveries land in a durable back-log
//! that is retried until the subscriber accepts them.
mod config;
mod delivery;
mod engine;
mod errors;
mod metrics;
mod models;
mod plugins;
mod storage;
mod transport;
pub mod utils;

pub use config::*;
pub use delivery::*;
pub use engine::*;
pub use errors::*;
pub use metrics::*;
pub use models::*;
pub use plugins::*;
pub use storage::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
