use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::catalog_file;
use super::RecordingNotifier;
use super::ScriptedTransport;
use crate::init_sled_subscription_db;
use crate::CacheReferenceTracker;
use crate::CandidateFile;
use crate::DeliveryContext;
use crate::EngineBuilder;
use crate::EngineConfig;
use crate::PredicateRegistry;
use crate::ScheduleTrigger;
use crate::SledBackLogStore;
use crate::SledQueueStore;
use crate::SledRepository;
use crate::Subscriber;
use crate::SubscriberRegistry;
use crate::SubscriberState;
use crate::Watermarks;

pub(crate) const TEST_HOST: &str = "archive-1";
pub(crate) const TEST_UNIT: &str = "volume1";

/// Config with pauses short enough for unit tests and the tracker enabled.
pub(crate) fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.node.host_id = TEST_HOST.to_string();
    config.delivery.queue_wait_timeout_ms = 20;
    config.delivery.failure_pause_ms = 10;
    config.delivery.priority_delay_unit_ms = 0;
    config.scheduler.backlog_retry_interval_ms = 50;
    config.scheduler.idle_wakeup_ms = 200;
    config.cache.enabled = true;
    config
}

/// A delivery context over sled stores in a temporary directory, with a
/// scripted transport and a recording eviction notifier.
pub(crate) struct Harness {
    dir: TempDir,
    pub(crate) repository: Arc<SledRepository>,
    pub(crate) backlog: Arc<SledBackLogStore>,
    pub(crate) queue_store: Arc<SledQueueStore>,
    pub(crate) transport: Arc<ScriptedTransport>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) ctx: Arc<DeliveryContext>,
}

impl Harness {
    pub(crate) fn new(transport: ScriptedTransport) -> Self {
        Self::with_config(fast_config(), transport)
    }

    pub(crate) fn with_config(
        config: EngineConfig,
        transport: ScriptedTransport,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(init_sled_subscription_db(&dir.path().join("db")).unwrap());
        let repository = Arc::new(SledRepository::new(db.clone(), TEST_HOST).unwrap());
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        repository.register_storage_unit(TEST_UNIT, &data_dir).unwrap();
        let backlog = Arc::new(SledBackLogStore::new(&db).unwrap());
        let queue_store = Arc::new(SledQueueStore::new(&db).unwrap());
        let transport = Arc::new(transport);
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = Arc::new(DeliveryContext {
            tracker: Arc::new(CacheReferenceTracker::new(
                config.cache.enabled,
                Some(notifier.clone()),
            )),
            config: Arc::new(config),
            repository: repository.clone(),
            backlog: backlog.clone(),
            queue_store: queue_store.clone(),
            transport: transport.clone(),
            predicates: Arc::new(PredicateRegistry::with_builtins()),
            registry: Arc::new(SubscriberRegistry::new()),
            trigger: Arc::new(ScheduleTrigger::new()),
            shutdown: CancellationToken::new(),
        });
        Self {
            dir,
            repository,
            backlog,
            queue_store,
            transport,
            notifier,
            ctx,
        }
    }

    /// Engine over the same stores, transport and notifier. The engine keeps
    /// its own registry and trigger.
    pub(crate) fn engine_builder(&self) -> EngineBuilder {
        EngineBuilder::new((*self.ctx.config).clone())
            .repository(self.repository.clone())
            .backlog_store(self.backlog.clone())
            .queue_store(self.queue_store.clone())
            .transport(self.transport.clone())
            .eviction_notifier(self.notifier.clone())
    }

    pub(crate) fn data_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("data")
    }

    pub(crate) fn add_subscriber(
        &self,
        subscriber: Subscriber,
    ) -> Arc<SubscriberState> {
        let state = Arc::new(SubscriberState::new(subscriber, Watermarks::default()));
        self.ctx.registry.insert(state.clone());
        state
    }

    /// Writes the file under the data directory and publishes it in the
    /// catalog of the local host.
    pub(crate) fn stored_file(
        &self,
        file_id: &str,
        version: u32,
        ingestion_date: DateTime<Utc>,
    ) -> CandidateFile {
        let mut row = catalog_file(TEST_HOST, file_id, version, ingestion_date);
        row.file_name = self.data_dir().join(format!("{file_id}.fits"));
        std::fs::write(&row.file_name, format!("payload of {file_id}")).unwrap();
        self.repository.register_file(&row).unwrap();
        CandidateFile {
            file_id: row.file_id,
            version: row.version,
            file_name: row.file_name,
            ingestion_date: row.ingestion_date,
            mime_type: row.mime_type,
            storage_unit_id: row.storage_unit_id,
            backlogged: false,
        }
    }

    pub(crate) fn remove_stored_file(
        &self,
        file: &CandidateFile,
    ) {
        std::fs::remove_file(Path::new(&file.file_name)).unwrap();
    }
}

/// Polls `condition` until it holds, failing the test after ten seconds.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
