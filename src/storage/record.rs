//! Versioned on-disk record encoding and composite keys.
//!
//! Every value is one schema-version byte followed by its bincode payload, so
//! a record from an unknown schema fails to decode instead of being misread.
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::AcceptedBoundary;
use crate::BackLogEntry;
use crate::FileKey;
use crate::QueueEntry;
use crate::Result;
use crate::StorageError;
use crate::Subscriber;
use crate::Watermarks;

const KEY_SEPARATOR: u8 = 0;

pub(crate) trait Record: Serialize + DeserializeOwned {
    const KIND: &'static str;
    const VERSION: u8 = 1;
}

pub(crate) fn encode_record<R: Record>(record: &R) -> Result<Vec<u8>> {
    let mut bytes = vec![R::VERSION];
    bytes.extend(bincode::serialize(record).map_err(StorageError::Codec)?);
    Ok(bytes)
}

pub(crate) fn decode_record<R: Record>(bytes: &[u8]) -> Result<R> {
    match bytes.split_first() {
        Some((version, payload)) if *version == R::VERSION => {
            Ok(bincode::deserialize(payload).map_err(StorageError::Codec)?)
        }
        Some((version, _)) => Err(StorageError::UnsupportedRecordVersion {
            kind: R::KIND,
            found: *version,
        }
        .into()),
        None => Err(StorageError::CorruptKey(format!("empty {} record", R::KIND)).into()),
    }
}

/// A file as the catalog knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Host currently holding the file
    pub host_id: String,
    pub file_id: String,
    pub version: u32,
    pub file_name: PathBuf,
    pub ingestion_date: DateTime<Utc>,
    pub mime_type: String,
    pub storage_unit_id: String,
    /// Ignored files are never offered to subscribers
    #[serde(default)]
    pub ignored: bool,
}

impl CatalogFile {
    pub fn key(&self) -> FileKey {
        FileKey::new(self.file_id.clone(), self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StorageUnitRecord {
    pub mount_point: PathBuf,
}

impl Record for CatalogFile {
    const KIND: &'static str = "catalog";
}
impl Record for StorageUnitRecord {
    const KIND: &'static str = "storage_unit";
}
impl Record for Subscriber {
    const KIND: &'static str = "subscriber";
}
impl Record for Watermarks {
    const KIND: &'static str = "watermarks";
}
impl Record for AcceptedBoundary {
    const KIND: &'static str = "accepted_boundary";
}
impl Record for BackLogEntry {
    const KIND: &'static str = "backlog";
}
impl Record for QueueEntry {
    const KIND: &'static str = "queue";
}

/// `file_id \0 version_be`
pub(crate) fn file_key_bytes(key: &FileKey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(key.file_id.len() + 5);
    bytes.extend_from_slice(key.file_id.as_bytes());
    bytes.push(KEY_SEPARATOR);
    bytes.extend_from_slice(&key.version.to_be_bytes());
    bytes
}

/// `subscriber_id \0`, the prefix shared by all rows of one subscriber
pub(crate) fn subscriber_prefix(subscriber_id: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(subscriber_id.len() + 1);
    bytes.extend_from_slice(subscriber_id.as_bytes());
    bytes.push(KEY_SEPARATOR);
    bytes
}

/// `subscriber_id \0 file_id \0 version_be`
pub(crate) fn subscriber_file_key(
    subscriber_id: &str,
    key: &FileKey,
) -> Vec<u8> {
    let mut bytes = subscriber_prefix(subscriber_id);
    bytes.extend(file_key_bytes(key));
    bytes
}

pub(crate) fn parse_file_key(bytes: &[u8]) -> Result<FileKey> {
    if bytes.len() < 5 || bytes[bytes.len() - 5] != KEY_SEPARATOR {
        return Err(StorageError::CorruptKey(format!("{bytes:?}")).into());
    }
    let (id, version) = bytes.split_at(bytes.len() - 5);
    let file_id = String::from_utf8(id.to_vec())
        .map_err(|e| StorageError::CorruptKey(e.to_string()))?;
    let mut be = [0u8; 4];
    be.copy_from_slice(&version[1..]);
    Ok(FileKey::new(file_id, u32::from_be_bytes(be)))
}
