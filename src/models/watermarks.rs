use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::FileKey;

/// Per-subscriber ingestion-date boundaries.
///
/// `scheduled_through >= delivered_through` holds after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermarks {
    /// Ingestion date of the most recently confirmed delivery
    pub delivered_through: Option<DateTime<Utc>>,
    /// Ingestion date of the most recently queued file
    pub scheduled_through: Option<DateTime<Utc>>,
}

impl Watermarks {
    pub fn new(
        delivered_through: Option<DateTime<Utc>>,
        scheduled_through: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            delivered_through,
            scheduled_through,
        }
        .normalized()
    }

    /// Raises Scheduled-Through to Delivered-Through if a stored pair violates
    /// the ordering.
    pub fn normalized(mut self) -> Self {
        if let Some(delivered) = self.delivered_through {
            if self.scheduled_through.map_or(true, |s| s < delivered) {
                self.scheduled_through = Some(delivered);
            }
        }
        self
    }

    /// The boundary the filter compares against: Scheduled-Through when it
    /// is newer than Delivered-Through.
    pub fn effective_last(&self) -> Option<DateTime<Utc>> {
        match (self.delivered_through, self.scheduled_through) {
            (Some(d), Some(s)) => Some(d.max(s)),
            (d, s) => d.or(s),
        }
    }

    /// Returns true when the watermark moved.
    pub fn advance_delivered(
        &mut self,
        date: DateTime<Utc>,
    ) -> bool {
        if self.delivered_through.is_some_and(|d| d >= date) {
            return false;
        }
        self.delivered_through = Some(date);
        if self.scheduled_through.map_or(true, |s| s < date) {
            self.scheduled_through = Some(date);
        }
        true
    }

    pub fn advance_scheduled(
        &mut self,
        date: DateTime<Utc>,
    ) -> bool {
        if self.scheduled_through.is_some_and(|s| s >= date) {
            return false;
        }
        self.scheduled_through = Some(date);
        true
    }
}

/// Fresh files a subscriber accepted at its newest accepted ingestion date.
///
/// Distinct files may share that date, so the watermark alone cannot tell a
/// file already scheduled from one announced later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBoundary {
    pub date: Option<DateTime<Utc>>,
    pub keys: BTreeSet<FileKey>,
}

impl AcceptedBoundary {
    /// Older dates are ignored; a newer date starts a fresh key set.
    pub fn note(
        &mut self,
        key: FileKey,
        ingestion_date: DateTime<Utc>,
    ) {
        match self.date {
            Some(date) if date > ingestion_date => {}
            Some(date) if date == ingestion_date => {
                self.keys.insert(key);
            }
            _ => {
                self.date = Some(ingestion_date);
                self.keys = BTreeSet::from([key]);
            }
        }
    }

    pub fn contains(
        &self,
        key: &FileKey,
        ingestion_date: DateTime<Utc>,
    ) -> bool {
        self.date == Some(ingestion_date) && self.keys.contains(key)
    }
}
