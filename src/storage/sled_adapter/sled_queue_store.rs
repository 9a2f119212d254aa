use std::sync::Arc;

use super::DELIVERY_QUEUE_NAMESPACE;
use crate::decode_record;
use crate::encode_record;
use crate::subscriber_file_key;
use crate::subscriber_prefix;
use crate::FileKey;
use crate::QueueEntry;
use crate::QueueStore;
use crate::Result;

#[derive(Clone)]
pub struct SledQueueStore {
    tree: Arc<sled::Tree>,
}

impl std::fmt::Debug for SledQueueStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledQueueStore")
            .field("tree_len", &self.tree.len())
            .finish()
    }
}

impl SledQueueStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(SledQueueStore {
            tree: Arc::new(db.open_tree(DELIVERY_QUEUE_NAMESPACE)?),
        })
    }
}

impl QueueStore for SledQueueStore {
    fn enqueue(
        &self,
        entry: &QueueEntry,
    ) -> Result<bool> {
        let key = subscriber_file_key(&entry.subscriber_id, &entry.key());
        let value = encode_record(entry)?;
        if entry.file.backlogged {
            self.tree.insert(key, value)?;
            return Ok(true);
        }
        Ok(self
            .tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
            .is_ok())
    }

    fn complete(
        &self,
        subscriber_id: &str,
        key: &FileKey,
    ) -> Result<()> {
        self.tree.remove(subscriber_file_key(subscriber_id, key))?;
        Ok(())
    }

    fn pending(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for item in self.tree.scan_prefix(subscriber_prefix(subscriber_id)) {
            let (_, value) = item?;
            entries.push(decode_record::<QueueEntry>(&value)?);
        }
        entries.sort_by(|a, b| {
            a.file
                .ingestion_date
                .cmp(&b.file.ingestion_date)
                .then_with(|| a.key().cmp(&b.key()))
        });
        Ok(entries)
    }

    fn clear_subscriber(
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
}
