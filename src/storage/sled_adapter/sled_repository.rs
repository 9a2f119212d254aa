use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use super::BOUNDARY_NAMESPACE;
use super::CATALOG_NAMESPACE;
use super::STORAGE_UNIT_NAMESPACE;
use super::SUBSCRIBER_NAMESPACE;
use super::WATERMARK_NAMESPACE;
use crate::decode_record;
use crate::encode_record;
use crate::file_key_bytes;
use crate::AcceptedBoundary;
use crate::CandidateFile;
use crate::CandidateQuery;
use crate::CatalogFile;
use crate::FileKey;
use crate::Repository;
use crate::Result;
use crate::StorageUnitRecord;
use crate::Subscriber;
use crate::Watermarks;

/// Repository backed by sled trees in the engine database.
///
/// Besides the query contract it offers the catalog maintenance calls the
/// ingestion side uses to publish files.
#[derive(Clone)]
pub struct SledRepository {
    host_id: String,
    db: Arc<sled::Db>,
    catalog: Arc<sled::Tree>,
    storage_units: Arc<sled::Tree>,
    subscribers: Arc<sled::Tree>,
    watermarks: Arc<sled::Tree>,
    boundaries: Arc<sled::Tree>,
    /// Serializes read-modify-write of watermark rows
    watermark_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SledRepository {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledRepository")
            .field("host_id", &self.host_id)
            .field("catalog_len", &self.catalog.len())
            .field("subscribers_len", &self.subscribers.len())
            .finish()
    }
}

impl SledRepository {
    pub fn new(
        db: Arc<sled::Db>,
        host_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(SledRepository {
            host_id: host_id.into(),
            catalog: Arc::new(db.open_tree(CATALOG_NAMESPACE)?),
            storage_units: Arc::new(db.open_tree(STORAGE_UNIT_NAMESPACE)?),
            subscribers: Arc::new(db.open_tree(SUBSCRIBER_NAMESPACE)?),
            watermarks: Arc::new(db.open_tree(WATERMARK_NAMESPACE)?),
            boundaries: Arc::new(db.open_tree(BOUNDARY_NAMESPACE)?),
            watermark_lock: Arc::new(Mutex::new(())),
            db,
        })
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Publishes (or replaces) a catalog row.
    pub fn register_file(
        &self,
        file: &CatalogFile,
    ) -> Result<()> {
        self.catalog.insert(file_key_bytes(&file.key()), encode_record(file)?)?;
        Ok(())
    }

    /// Returns `false` if the file is unknown.
    pub fn set_file_ignored(
        &self,
        key: &FileKey,
        ignored: bool,
    ) -> Result<bool> {
        let k = file_key_bytes(key);
        let Some(bytes) = self.catalog.get(&k)? else {
            return Ok(false);
        };
        let mut file: CatalogFile = decode_record(&bytes)?;
        file.ignored = ignored;
        self.catalog.insert(k, encode_record(&file)?)?;
        Ok(true)
    }

    pub fn remove_file(
        &self,
        key: &FileKey,
    ) -> Result<bool> {
        Ok(self.catalog.remove(file_key_bytes(key))?.is_some())
    }

    pub fn register_storage_unit(
        &self,
        storage_unit_id: &str,
        mount_point: impl Into<PathBuf>,
    ) -> Result<()> {
        let record = StorageUnitRecord {
            mount_point: mount_point.into(),
        };
        self.storage_units
            .insert(storage_unit_id.as_bytes(), encode_record(&record)?)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }

    fn scan_catalog(
        &self,
        mut keep: impl FnMut(&CatalogFile) -> bool,
    ) -> Result<Vec<CandidateFile>> {
        let mut files = Vec::new();
        for item in self.catalog.iter() {
            let (_, value) = item?;
            let file: CatalogFile = decode_record(&value)?;
            if !file.ignored && keep(&file) {
                files.push(to_candidate(file));
            }
        }
        sort_by_ingestion(&mut files);
        Ok(files)
    }

    fn store_watermarks(
        &self,
        subscriber_id: &str,
        watermarks: &Watermarks,
    ) -> Result<()> {
        self.watermarks
            .insert(subscriber_id.as_bytes(), encode_record(watermarks)?)?;
        Ok(())
    }
}

impl Repository for SledRepository {
    fn query_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateFile>> {
        match query {
            CandidateQuery::Explicit(keys) => {
                let mut files = Vec::with_capacity(keys.len());
                for key in keys {
                    match self.catalog.get(file_key_bytes(key))? {
                        Some(bytes) => {
                            let file: CatalogFile = decode_record(&bytes)?;
                            if file.ignored {
                                debug!(file = %key, "skipping ignored file");
                                continue;
                            }
                            files.push(to_candidate(file));
                        }
                        None => warn!(file = %key, "explicit file reference not found in catalog"),
                    }
                }
                sort_by_ingestion(&mut files);
                Ok(files)
            }
            CandidateQuery::LocalScan { since } => self.scan_catalog(|file| {
                file.host_id == self.host_id && since.map_or(true, |s| file.ingestion_date >= s)
            }),
            CandidateQuery::Hosts {
                hosts,
                since,
                after,
                limit,
            } => {
                let mut files = self.scan_catalog(|file| {
                    hosts.contains(&file.host_id)
                        && since.map_or(true, |s| file.ingestion_date >= s)
                        && after
                            .as_ref()
                            .map_or(true, |a| a.precedes(file.ingestion_date, &file.key()))
                })?;
                files.truncate(*limit);
                Ok(files)
            }
        }
    }

    fn get_watermarks(
        &self,
        subscriber_id: &str,
    ) -> Result<Watermarks> {
        match self.watermarks.get(subscriber_id.as_bytes())? {
            Some(bytes) => Ok(decode_record::<Watermarks>(&bytes)?.normalized()),
            None => Ok(Watermarks::default()),
        }
    }

    fn set_delivered_through(
        &self,
        subscriber_id: &str,
        date: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.watermark_lock.lock();
        let mut watermarks = self.get_watermarks(subscriber_id)?;
        if watermarks.advance_delivered(date) {
            self.store_watermarks(subscriber_id, &watermarks)?;
        }
        Ok(())
    }

    fn set_scheduled_through(
        &self,
        subscriber_id: &str,
        date: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.watermark_lock.lock();
        let mut watermarks = self.get_watermarks(subscriber_id)?;
        if watermarks.advance_scheduled(date) {
            self.store_watermarks(subscriber_id, &watermarks)?;
        }
        Ok(())
    }

    fn reset_watermarks(
        &self,
        subscriber_id: &str,
    ) -> Result<()> {
        let _guard = self.watermark_lock.lock();
        self.watermarks.remove(subscriber_id.as_bytes())?;
        self.boundaries.remove(subscriber_id.as_bytes())?;
        Ok(())
    }

    fn get_accepted_boundary(
        &self,
        subscriber_id: &str,
    ) -> Result<AcceptedBoundary> {
        match self.boundaries.get(subscriber_id.as_bytes())? {
            Some(bytes) => decode_record(&bytes),
            None => Ok(AcceptedBoundary::default()),
        }
    }

    fn set_accepted_boundary(
        &self,
        subscriber_id: &str,
        boundary: &AcceptedBoundary,
    ) -> Result<()> {
        self.boundaries
            .insert(subscriber_id.as_bytes(), encode_record(boundary)?)?;
        Ok(())
    }

    fn mount_point(
        &self,
        storage_unit_id: &str,
    ) -> Result<Option<PathBuf>> {
        match self.storage_units.get(storage_unit_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode_record::<StorageUnitRecord>(&bytes)?.mount_point)),
            None => Ok(None),
        }
    }

    fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let mut subscribers = Vec::with_capacity(self.subscribers.len());
        for item in self.subscribers.iter() {
            let (_, value) = item?;
            subscribers.push(decode_record(&value)?);
        }
        Ok(subscribers)
    }

    fn upsert_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> Result<()> {
        self.subscribers
            .insert(subscriber.id.as_bytes(), encode_record(subscriber)?)?;
        self.subscribers.flush()?;
        Ok(())
    }

    fn delete_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<()> {
        self.subscribers.remove(subscriber_id.as_bytes())?;
        self.subscribers.flush()?;
        Ok(())
    }
}

fn to_candidate(file: CatalogFile) -> CandidateFile {
    CandidateFile {
        file_id: file.file_id,
        version: file.version,
        file_name: file.file_name,
        ingestion_date: file.ingestion_date,
        mime_type: file.mime_type,
        storage_unit_id: file.storage_unit_id,
        backlogged: false,
    }
}

fn sort_by_ingestion(files: &mut [CandidateFile]) {
    files.sort_by(|a, b| {
        a.ingestion_date
            .cmp(&b.ingestion_date)
            .then_with(|| a.file_id.cmp(&b.file_id))
            .then_with(|| a.version.cmp(&b.version))
    });
}
