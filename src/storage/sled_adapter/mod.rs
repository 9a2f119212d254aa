// Submodule declaration
// -----------------------------------------------------------------------------
mod sled_backlog_store;
mod sled_queue_store;
mod sled_repository;

#[cfg(test)]
mod sled_backlog_store_test;

// Re-export
// -----------------------------------------------------------------------------
pub use sled_backlog_store::*;
pub use sled_queue_store::*;
pub use sled_repository::*;
// -----------------------------------------------------------------------------
// Database namespaces
/// Sled database tree namespaces
const CATALOG_NAMESPACE: &str = "catalog";
const STORAGE_UNIT_NAMESPACE: &str = "storage_units";
const SUBSCRIBER_NAMESPACE: &str = "subscribers";
const WATERMARK_NAMESPACE: &str = "watermarks";
const BOUNDARY_NAMESPACE: &str = "accepted_boundary";
const BACKLOG_NAMESPACE: &str = "backlog";
const DELIVERY_QUEUE_NAMESPACE: &str = "delivery_queue";
