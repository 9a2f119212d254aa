use std::sync::Arc;

use tracing::debug;

use super::SubscriberState;
use crate::CandidateFile;
use crate::CandidateQuery;
use crate::DataMoverConfig;
use crate::FileKey;
use crate::Repository;
use crate::Result;
use crate::ScanCursor;

/// Turns scheduler triggers into candidate files.
///
/// Three kinds of selection are supported: the files named by an ingestion
/// trigger, a local scan for subscribers that were just registered, resumed
/// or updated, and the peer-host scan of the data-mover subscriber. Every
/// list comes back ordered by ascending ingestion date.
#[derive(Clone)]
pub struct CandidateResolver {
    repository: Arc<dyn Repository>,
    data_mover: DataMoverConfig,
}

impl std::fmt::Debug for CandidateResolver {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CandidateResolver")
            .field("data_mover", &self.data_mover)
            .finish()
    }
}

impl CandidateResolver {
    pub fn new(
        repository: Arc<dyn Repository>,
        data_mover: DataMoverConfig,
    ) -> Self {
        Self {
            repository,
            data_mover,
        }
    }

    pub fn resolve_explicit(
        &self,
        files: &[FileKey],
    ) -> Result<Vec<CandidateFile>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let mut keys = files.to_vec();
        keys.sort();
        keys.dedup();
        let mut candidates = self.repository.query_candidates(&CandidateQuery::Explicit(keys))?;
        sort_candidates(&mut candidates);
        Ok(candidates)
    }

    /// One scan shared by all `states`, starting at the earliest point any of
    /// them still needs. The filter discards what each one already has.
    pub fn resolve_local_scan(
        &self,
        states: &[Arc<SubscriberState>],
    ) -> Result<Vec<CandidateFile>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let since = states
            .iter()
            .map(|state| scan_start(state))
            .min()
            .flatten();
        let mut candidates = self
            .repository
            .query_candidates(&CandidateQuery::LocalScan { since })?;
        sort_candidates(&mut candidates);
        debug!(subscribers = states.len(), ?since, found = candidates.len(), "local scan");
        Ok(candidates)
    }

    /// Next page of peer-host files for the data mover. Returns nothing while
    /// the back-log holds `max_backlog` or more entries.
    pub fn resolve_data_mover(
        &self,
        state: &SubscriberState,
        backlog_count: usize,
    ) -> Result<Vec<CandidateFile>> {
        if backlog_count >= self.data_mover.max_backlog {
            debug!(
                subscriber_id = %state.id(),
                backlog_count,
                "data mover paused until the back-log drains"
            );
            return Ok(Vec::new());
        }
        let mut candidates = self.repository.query_candidates(&CandidateQuery::Hosts {
            hosts: self.data_mover.hosts.clone(),
            since: scan_start(state),
            after: state.checked_through(),
            limit: self.data_mover.max_records,
        })?;
        sort_candidates(&mut candidates);
        if let Some(last) = candidates.last() {
            state.advance_checked_through(ScanCursor::of(last));
        }
        Ok(candidates)
    }
}

/// Earliest ingestion date the subscriber may still need, `None` when
/// everything is in range.
fn scan_start(state: &SubscriberState) -> Option<chrono::DateTime<chrono::Utc>> {
    let start = state.subscriber().start_date;
    match (state.watermarks().effective_last(), start) {
        (Some(last), Some(start)) => Some(last.max(start)),
        (last, start) => last.or(start),
    }
}

pub(crate) fn sort_candidates(candidates: &mut [CandidateFile]) {
    candidates.sort_by(|a, b| {
        a.ingestion_date
            .cmp(&b.ingestion_date)
            .then_with(|| a.file_id.cmp(&b.file_id))
            .then_with(|| a.version.cmp(&b.version))
    });
}
