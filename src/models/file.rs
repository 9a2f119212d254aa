use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::SubscriberId;

/// Identity of one archived file version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileKey {
    pub file_id: String,
    pub version: u32,
}

impl FileKey {
    pub fn new(
        file_id: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            version,
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/v{}", self.file_id, self.version)
    }
}

/// A file considered for delivery in the current scheduling cycle.
///
/// Produced by the resolver or rebuilt from a back-log entry; never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub file_id: String,
    pub version: u32,
    /// Absolute path of the file on local storage
    pub file_name: PathBuf,
    pub ingestion_date: DateTime<Utc>,
    pub mime_type: String,
    pub storage_unit_id: String,
    /// Rebuilt from the back-log rather than resolved fresh
    pub backlogged: bool,
}

impl CandidateFile {
    pub fn key(&self) -> FileKey {
        FileKey::new(self.file_id.clone(), self.version)
    }

    /// Name the subscriber sees in the disposition header.
    pub fn base_name(&self) -> String {
        base_name(&self.file_name)
    }
}

pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A candidate bound to the subscriber it is queued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub subscriber_id: SubscriberId,
    pub file: CandidateFile,
}

impl QueueEntry {
    pub fn new(
        subscriber_id: impl Into<SubscriberId>,
        file: CandidateFile,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            file,
        }
    }

    pub fn key(&self) -> FileKey {
        self.file.key()
    }
}

/// Durable record of a delivery that failed or was still queued at shutdown.
///
/// Keyed by `(subscriber_id, file_id, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackLogEntry {
    pub subscriber_id: SubscriberId,
    pub subscriber_url: String,
    pub file_id: String,
    pub version: u32,
    pub file_name: PathBuf,
    pub ingestion_date: DateTime<Utc>,
    pub mime_type: String,
    pub storage_unit_id: String,
}

impl BackLogEntry {
    pub fn from_queue_entry(
        entry: &QueueEntry,
        subscriber_url: &str,
    ) -> Self {
        let file = &entry.file;
        Self {
            subscriber_id: entry.subscriber_id.clone(),
            subscriber_url: subscriber_url.to_string(),
            file_id: file.file_id.clone(),
            version: file.version,
            file_name: file.file_name.clone(),
            ingestion_date: file.ingestion_date,
            mime_type: file.mime_type.clone(),
            storage_unit_id: file.storage_unit_id.clone(),
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(self.file_id.clone(), self.version)
    }

    /// Rebuilds the candidate for a retry; the result is always back-log resident.
    pub fn to_candidate(&self) -> CandidateFile {
        CandidateFile {
            file_id: self.file_id.clone(),
            version: self.version,
            file_name: self.file_name.clone(),
            ingestion_date: self.ingestion_date,
            mime_type: self.mime_type.clone(),
            storage_unit_id: self.storage_unit_id.clone(),
            backlogged: true,
        }
    }
}
