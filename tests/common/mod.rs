#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use ngas_subscription::init_sled_subscription_db;
use ngas_subscription::CandidateFile;
use ngas_subscription::CatalogFile;
use ngas_subscription::EngineBuilder;
use ngas_subscription::EngineConfig;
use ngas_subscription::EvictionNotifier;
use ngas_subscription::FileKey;
use ngas_subscription::Result;
use ngas_subscription::SledBackLogStore;
use ngas_subscription::SledQueueStore;
use ngas_subscription::SledRepository;
use ngas_subscription::SubscribeRequest;
use ngas_subscription::SubscriptionEngine;
use ngas_subscription::Transport;
use ngas_subscription::TransportError;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const HOST: &str = "archive-1";
pub const UNIT: &str = "volume1";

/// Midnight UTC on the given day of March 2024
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
}

pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.node.host_id = HOST.to_string();
    config.delivery.queue_wait_timeout_ms = 20;
    config.delivery.failure_pause_ms = 5;
    config.delivery.priority_delay_unit_ms = 1;
    config.delivery.max_priority_delay_ms = 10;
    config.scheduler.backlog_retry_interval_ms = 50;
    config.scheduler.idle_wakeup_ms = 500;
    config.cache.enabled = true;
    config
}

pub fn request(
    id: &str,
    priority: u32,
) -> SubscribeRequest {
    SubscribeRequest {
        id: Some(id.to_string()),
        priority: Some(priority),
        start_date: Some(day(1)),
        ..SubscribeRequest::new(format!("http://{id}.example.org/QARCHIVE"))
    }
}

/// An archive node's storage: a sled database plus a data directory with the
/// files it catalogs.
pub struct TestArchive {
    pub dir: TempDir,
    pub repository: Arc<SledRepository>,
    pub backlog: Arc<SledBackLogStore>,
    pub queue_store: Arc<SledQueueStore>,
}

impl TestArchive {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let archive = Self::open(dir);
        std::fs::create_dir_all(archive.data_dir()).unwrap();
        archive
            .repository
            .register_storage_unit(UNIT, archive.data_dir())
            .unwrap();
        archive
    }

    /// Reopens the stores in `dir`, as a restarted process would.
    pub fn open(dir: TempDir) -> Self {
        let db = Arc::new(init_sled_subscription_db(dir.path().join("db")).unwrap());
        Self {
            repository: Arc::new(SledRepository::new(db.clone(), HOST).unwrap()),
            backlog: Arc::new(SledBackLogStore::new(&db).unwrap()),
            queue_store: Arc::new(SledQueueStore::new(&db).unwrap()),
            dir,
        }
    }

    /// Releases the database so the directory can be reopened.
    pub fn close(self) -> TempDir {
        let Self {
            dir,
            repository,
            backlog,
            queue_store,
        } = self;
        repository.flush().unwrap();
        drop(repository);
        drop(backlog);
        drop(queue_store);
        dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn store_file(
        &self,
        file_id: &str,
        ingestion_date: DateTime<Utc>,
    ) -> FileKey {
        let file = CatalogFile {
            host_id: HOST.to_string(),
            file_id: file_id.to_string(),
            version: 1,
            file_name: self.data_dir().join(format!("{file_id}.fits")),
            ingestion_date,
            mime_type: "image/x-fits".to_string(),
            storage_unit_id: UNIT.to_string(),
            ignored: false,
        };
        std::fs::write(&file.file_name, file_id.as_bytes()).unwrap();
        self.repository.register_file(&file).unwrap();
        file.key()
    }

    pub fn engine(
        &self,
        config: EngineConfig,
        transport: Arc<ScriptedTransport>,
        notifier: Arc<RecordingNotifier>,
    ) -> SubscriptionEngine {
        EngineBuilder::new(config)
            .repository(self.repository.clone())
            .backlog_store(self.backlog.clone())
            .queue_store(self.queue_store.clone())
            .transport(transport)
            .eviction_notifier(notifier)
            .build()
            .unwrap()
    }
}

/// Records every attempt; fails the first `n` attempts of selected files and
/// optionally holds each attempt until a permit is released.
#[derive(Default)]
pub struct ScriptedTransport {
    failures: Mutex<HashMap<String, usize>>,
    fail_everything: bool,
    attempts: Mutex<Vec<(String, String)>>,
    delivered: Mutex<Vec<(String, String)>>,
    gate: Option<Semaphore>,
}

impl ScriptedTransport {
    pub fn always_failing() -> Self {
        Self {
            fail_everything: true,
            ..Default::default()
        }
    }

    /// Attempts block until [`ScriptedTransport::release`] hands out permits.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn fail_first(
        self,
        file_id: &str,
        times: usize,
    ) -> Self {
        self.failures.lock().insert(file_id.to_string(), times);
        self
    }

    pub fn release(
        &self,
        permits: usize,
    ) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().clone()
    }

    /// `(url, file_id)` of every accepted delivery
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().clone()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.delivered.lock().iter().map(|(_, id)| id.clone()).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn deliver(
        &self,
        url: &str,
        file: &CandidateFile,
    ) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let attempt = (url.to_string(), file.file_id.clone());
        self.attempts.lock().push(attempt.clone());

        let fail = self.fail_everything || {
            let mut failures = self.failures.lock();
            match failures.get_mut(&file.file_id) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status: 503,
                message: "scripted outage".to_string(),
            }
            .into());
        }
        self.delivered.lock().push(attempt);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<(String, String, u32)>>,
}

impl RecordingNotifier {
    pub fn notified(&self) -> Vec<(String, String, u32)> {
        self.notified.lock().clone()
    }

    pub fn count_for(
        &self,
        file_id: &str,
    ) -> usize {
        self.notified.lock().iter().filter(|(_, id, _)| id == file_id).count()
    }
}

impl EvictionNotifier for RecordingNotifier {
    fn notify_eligible_for_deletion(
        &self,
        storage_unit_id: &str,
        file_id: &str,
        file_version: u32,
    ) {
        self.notified
            .lock()
            .push((storage_unit_id.to_string(), file_id.to_string(), file_version));
    }
}

/// Polls `condition` until it holds; panics after ten seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
