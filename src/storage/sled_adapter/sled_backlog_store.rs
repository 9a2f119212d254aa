use std::sync::Arc;

use tracing::debug;

use super::BACKLOG_NAMESPACE;
use crate::decode_record;
use crate::encode_record;
use crate::subscriber_file_key;
use crate::subscriber_prefix;
use crate::BackLogEntry;
use crate::BackLogStore;
use crate::FileKey;
use crate::Result;

#[derive(Clone)]
pub struct SledBackLogStore {
    tree: Arc<sled::Tree>,
}

impl std::fmt::Debug for SledBackLogStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledBackLogStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledBackLogStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(SledBackLogStore {
            tree: Arc::new(db.open_tree(BACKLOG_NAMESPACE)?),
        })
    }
}

impl BackLogStore for SledBackLogStore {
    fn add(
        &self,
        entry: &BackLogEntry,
    ) -> Result<bool> {
        let key = subscriber_file_key(&entry.subscriber_id, &entry.key());
        let inserted = self
            .tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(encode_record(entry)?))?
            .is_ok();
        if inserted {
            self.tree.flush()?;
            debug!(
                subscriber_id = %entry.subscriber_id,
                file = %entry.key(),
                "back-log entry written"
            );
        }
        Ok(inserted)
    }

    fn remove(
        &self,
        subscriber_id: &str,
        key: &FileKey,
    ) -> Result<bool> {
        let removed = self.tree.remove(subscriber_file_key(subscriber_id, key))?.is_some();
        if removed {
            self.tree.flush()?;
        }
        Ok(removed)
    }

    fn list_ready(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<BackLogEntry>> {
        let mut entries = Vec::new();
        for item in self.tree.scan_prefix(subscriber_prefix(subscriber_id)) {
            let (_, value) = item?;
            entries.push(decode_record::<BackLogEntry>(&value)?);
        }
        entries.sort_by(|a, b| {
            a.ingestion_date
                .cmp(&b.ingestion_date)
                .then_with(|| a.key().cmp(&b.key()))
        });
        Ok(entries)
    }

    fn remove_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<usize> {
        let mut removed = 0;
        for item in self.tree.scan_prefix(subscriber_prefix(subscriber_id)).keys() {
            self.tree.remove(item?)?;
            removed += 1;
        }
        self.tree.flush()?;
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.tree.len())
    }
}
