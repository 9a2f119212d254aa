//! Delivery reference counting shared with the cache-eviction policy.
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::CandidateFile;
use crate::FileKey;
use crate::SubscriberId;

/// Receives files no subscriber still needs.
#[cfg_attr(test, automock)]
pub trait EvictionNotifier: Send + Sync + 'static {
    fn notify_eligible_for_deletion(
        &self,
        storage_unit_id: &str,
        file_id: &str,
        file_version: u32,
    );
}

struct FileReferences {
    storage_unit_id: String,
    holders: HashSet<SubscriberId>,
}

/// Per-file set of subscribers with a pending (queued or in-flight) delivery.
///
/// The count of a file is the size of its set, so repeated increments for the
/// same subscriber are absorbed. The eviction collaborator is notified once,
/// when the last holder releases the file. Disabled trackers ignore every call.
pub struct CacheReferenceTracker {
    enabled: bool,
    references: DashMap<FileKey, FileReferences>,
    notifier: Option<Arc<dyn EvictionNotifier>>,
}

impl std::fmt::Debug for CacheReferenceTracker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheReferenceTracker")
            .field("enabled", &self.enabled)
            .field("tracked_files", &self.references.len())
            .finish()
    }
}

impl CacheReferenceTracker {
    pub fn new(
        enabled: bool,
        notifier: Option<Arc<dyn EvictionNotifier>>,
    ) -> Self {
        Self {
            enabled,
            references: DashMap::new(),
            notifier,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if the subscriber was not yet counted for this file.
    pub fn increment(
        &self,
        file: &CandidateFile,
        subscriber_id: &str,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut refs = self
            .references
            .entry(file.key())
            .or_insert_with(|| FileReferences {
                storage_unit_id: file.storage_unit_id.clone(),
                holders: HashSet::new(),
            });
        refs.holders.insert(subscriber_id.to_string())
    }

    /// Releases the subscriber's hold on the file. Returns `true` if this call
    /// emptied the set and the eviction collaborator was notified.
    pub fn decrement_and_maybe_notify(
        &self,
        key: &FileKey,
        subscriber_id: &str,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let released = match self.references.entry(key.clone()) {
            Entry::Occupied(mut refs) => {
                if !refs.get_mut().holders.remove(subscriber_id) {
                    return false;
                }
                if refs.get().holders.is_empty() {
                    Some(refs.remove().storage_unit_id)
                } else {
                    None
                }
            }
            Entry::Vacant(_) => None,
        };

        match released {
            Some(storage_unit_id) => {
                self.notify(&storage_unit_id, key);
                true
            }
            None => false,
        }
    }

    /// Drops every hold of an unsubscribed subscriber; returns how many files
    /// became eligible for deletion.
    pub fn release_subscriber(
        &self,
        subscriber_id: &str,
    ) -> usize {
        if !self.enabled {
            return 0;
        }
        let held: Vec<FileKey> = self
            .references
            .iter()
            .filter(|r| r.value().holders.contains(subscriber_id))
            .map(|r| r.key().clone())
            .collect();
        held.iter()
            .filter(|key| self.decrement_and_maybe_notify(key, subscriber_id))
            .count()
    }

    pub fn count(
        &self,
        key: &FileKey,
    ) -> usize {
        self.references.get(key).map_or(0, |r| r.holders.len())
    }

    fn notify(
        &self,
        storage_unit_id: &str,
        key: &FileKey,
    ) {
        debug!(file = %key, storage_unit_id, "file eligible for deletion");
        if let Some(notifier) = &self.notifier {
            notifier.notify_eligible_for_deletion(storage_unit_id, &key.file_id, key.version);
        }
    }
}
