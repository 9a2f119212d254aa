use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use tempfile::TempDir;

use crate::init_sled_subscription_db;
use crate::BackLogEntry;
use crate::CandidateFile;
use crate::CatalogFile;
use crate::QueueEntry;
use crate::Subscriber;

/// Midnight UTC on the given day of January 2024
pub(crate) fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub(crate) fn candidate(
    file_id: &str,
    version: u32,
    ingestion_date: DateTime<Utc>,
) -> CandidateFile {
    CandidateFile {
        file_id: file_id.to_string(),
        version,
        file_name: PathBuf::from(format!("/data/volume1/{file_id}.fits")),
        ingestion_date,
        mime_type: "image/x-fits".to_string(),
        storage_unit_id: "volume1".to_string(),
        backlogged: false,
    }
}

pub(crate) fn backlogged(file: CandidateFile) -> CandidateFile {
    CandidateFile {
        backlogged: true,
        ..file
    }
}

pub(crate) fn queue_entry(
    subscriber_id: &str,
    file: CandidateFile,
) -> QueueEntry {
    QueueEntry::new(subscriber_id, file)
}

pub(crate) fn backlog_entry(
    subscriber_id: &str,
    file: &CandidateFile,
) -> BackLogEntry {
    BackLogEntry::from_queue_entry(
        &QueueEntry::new(subscriber_id, file.clone()),
        "http://subscriber/archive",
    )
}

pub(crate) fn catalog_file(
    host_id: &str,
    file_id: &str,
    version: u32,
    ingestion_date: DateTime<Utc>,
) -> CatalogFile {
    let c = candidate(file_id, version, ingestion_date);
    CatalogFile {
        host_id: host_id.to_string(),
        file_id: c.file_id,
        version: c.version,
        file_name: c.file_name,
        ingestion_date: c.ingestion_date,
        mime_type: c.mime_type,
        storage_unit_id: c.storage_unit_id,
        ignored: false,
    }
}

pub(crate) fn subscriber(
    id: &str,
    priority: u32,
) -> Subscriber {
    Subscriber::new(id, format!("http://{id}.example.org/archive")).with_priority(priority)
}

/// Sled database in a fresh temporary directory; keep the `TempDir` alive.
pub(crate) fn temp_db() -> (TempDir, Arc<sled::Db>) {
    let dir = tempfile::tempdir().unwrap();
    let db = init_sled_subscription_db(dir.path()).unwrap();
    (dir, Arc::new(db))
}
