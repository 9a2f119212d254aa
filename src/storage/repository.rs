//! Repository contract: candidate queries, watermarks and the subscriber table.
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;

use crate::AcceptedBoundary;
use crate::CandidateFile;
use crate::FileKey;
use crate::Result;
use crate::Subscriber;
use crate::Watermarks;

/// Which files a candidate query selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateQuery {
    /// Newly ingested files named by the trigger
    Explicit(Vec<FileKey>),
    /// Everything held by the local host, ingested at or after `since`
    LocalScan { since: Option<DateTime<Utc>> },
    /// Files held by the given peer hosts (data-mover mode), ingested at or
    /// after `since` and ordered strictly after `after`
    Hosts {
        hosts: Vec<String>,
        since: Option<DateTime<Utc>>,
        after: Option<ScanCursor>,
        limit: usize,
    },
}

/// Position in a scan ordered by ingestion date, then file id and version.
///
/// Many files can share one ingestion date, so a page boundary needs the
/// whole key to resume without skipping or repeating rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanCursor {
    pub ingestion_date: DateTime<Utc>,
    pub key: FileKey,
}

impl ScanCursor {
    pub fn of(file: &CandidateFile) -> Self {
        Self {
            ingestion_date: file.ingestion_date,
            key: file.key(),
        }
    }

    /// True when a file at `(ingestion_date, key)` comes after this position.
    pub fn precedes(
        &self,
        ingestion_date: DateTime<Utc>,
        key: &FileKey,
    ) -> bool {
        (self.ingestion_date, &self.key) < (ingestion_date, key)
    }
}

/// Synchronous, fallible repository calls.
///
/// Scan results are ordered by ascending ingestion date and never include
/// files marked ignored.
#[cfg_attr(test, automock)]
pub trait Repository: Send + Sync + 'static {
    fn query_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateFile>>;

    fn get_watermarks(
        &self,
        subscriber_id: &str,
    ) -> Result<Watermarks>;

    /// Only ever moves the stored value forward.
    fn set_delivered_through(
        &self,
        subscriber_id: &str,
        date: DateTime<Utc>,
    ) -> Result<()>;

    /// Only ever moves the stored value forward.
    fn set_scheduled_through(
        &self,
        subscriber_id: &str,
        date: DateTime<Utc>,
    ) -> Result<()>;

    /// Also forgets the accepted boundary.
    fn reset_watermarks(
        &self,
        subscriber_id: &str,
    ) -> Result<()>;

    fn get_accepted_boundary(
        &self,
        subscriber_id: &str,
    ) -> Result<AcceptedBoundary>;

    fn set_accepted_boundary(
        &self,
        subscriber_id: &str,
        boundary: &AcceptedBoundary,
    ) -> Result<()>;

    /// Mount point of a storage unit, `None` if the unit is unknown.
    fn mount_point(
        &self,
        storage_unit_id: &str,
    ) -> Result<Option<PathBuf>>;

    fn list_subscribers(&self) -> Result<Vec<Subscriber>>;

    fn upsert_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> Result<()>;

    fn delete_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<()>;
}
