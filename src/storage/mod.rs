//! Durable state of the subscription engine: the file catalog and subscriber
//! watermarks (`Repository`), the retry back-log (`BackLogStore`) and the
//! mirror of every subscriber's delivery queue (`QueueStore`).
mod backlog_store;
mod queue_store;
mod record;
mod repository;
mod sled_adapter;

#[doc(hidden)]
pub use backlog_store::*;
#[doc(hidden)]
pub use queue_store::*;
pub use record::CatalogFile;
pub(crate) use record::*;
#[doc(hidden)]
pub use repository::*;
#[doc(hidden)]
pub use sled_adapter::*;


use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::Result;
use crate::StorageError;

/// Opens the engine database under `<db_root>/subscription`.
pub fn init_sled_subscription_db(
    sled_db_root_path: impl AsRef<Path> + std::fmt::Debug
) -> Result<sled::Db> {
    debug!("init_sled_subscription_db from path: {:?}", &sled_db_root_path);

    let path = sled_db_root_path.as_ref();
    let db_path = path.join("subscription");

    sled::Config::default()
        .path(&db_path)
        .cache_capacity(64 * 1024 * 1024) //64MB
        .flush_every_ms(Some(3))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                db_path, e
            );
            StorageError::Sled(e).into()
        })
}
