//! Builder for [`SubscriptionEngine`].
//!
//! Every collaborator can be replaced; anything left unset gets the
//! production default:
//! - sled-backed repository, back-log and queue stores under
//!   `node.db_root_dir`
//! - HTTP transport configured from `[transport]`
//! - the built-in filter predicates
//!
//! ## Example
//! ```ignore
//! let engine = EngineBuilder::new(EngineConfig::new()?.validate()?)
//!     .eviction_notifier(Arc::new(my_cache_janitor))
//!     .predicate("night_only", NightOnly)
//!     .build()?;
//! engine.start().await?;
//! ```
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::SubscriptionEngine;
use crate::init_sled_subscription_db;
use crate::BackLogStore;
use crate::CacheReferenceTracker;
use crate::DeliveryContext;
use crate::EngineConfig;
use crate::EvictionNotifier;
use crate::FilterPredicate;
use crate::HttpTransport;
use crate::PredicateRegistry;
use crate::QueueStore;
use crate::Repository;
use crate::Result;
use crate::ScheduleTrigger;
use crate::SledBackLogStore;
use crate::SledQueueStore;
use crate::SledRepository;
use crate::SubscriberRegistry;
use crate::Transport;

pub struct EngineBuilder {
    config: EngineConfig,
    repository: Option<Arc<dyn Repository>>,
    backlog: Option<Arc<dyn BackLogStore>>,
    queue_store: Option<Arc<dyn QueueStore>>,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn EvictionNotifier>>,
    predicates: PredicateRegistry,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            repository: None,
            backlog: None,
            queue_store: None,
            transport: None,
            notifier: None,
            predicates: PredicateRegistry::with_builtins(),
        }
    }

    pub fn repository(
        mut self,
        repository: Arc<dyn Repository>,
    ) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn backlog_store(
        mut self,
        backlog: Arc<dyn BackLogStore>,
    ) -> Self {
        self.backlog = Some(backlog);
        self
    }

    pub fn queue_store(
        mut self,
        queue_store: Arc<dyn QueueStore>,
    ) -> Self {
        self.queue_store = Some(queue_store);
        self
    }

    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Collaborator told when a cached file is no longer needed by any
    /// subscriber. Only used with `cache.enabled`.
    pub fn eviction_notifier(
        mut self,
        notifier: Arc<dyn EvictionNotifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Registers a filter predicate under `name`, replacing any built-in of
    /// the same name.
    pub fn predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl FilterPredicate,
    ) -> Self {
        self.predicates.register(name, predicate);
        self
    }

    pub fn build(self) -> Result<SubscriptionEngine> {
        let config = self.config;

        let mut opened_db = None;
        let (repository, backlog, queue_store) =
            match (self.repository, self.backlog, self.queue_store) {
                (Some(repository), Some(backlog), Some(queue_store)) => {
                    (repository, backlog, queue_store)
                }
                (repository, backlog, queue_store) => {
                    debug!("opening sled stores under {:?}", config.node.db_root_dir);
                    let db = Arc::new(init_sled_subscription_db(&config.node.db_root_dir)?);
                    let repository: Arc<dyn Repository> = match repository {
                        Some(r) => r,
                        None => Arc::new(SledRepository::new(db.clone(), config.node.host_id.clone())?),
                    };
                    let backlog: Arc<dyn BackLogStore> = match backlog {
                        Some(b) => b,
                        None => Arc::new(SledBackLogStore::new(&db)?),
                    };
                    let queue_store: Arc<dyn QueueStore> = match queue_store {
                        Some(q) => q,
                        None => Arc::new(SledQueueStore::new(&db)?),
                    };
                    opened_db = Some(db);
                    (repository, backlog, queue_store)
                }
            };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config.transport)?),
        };

        let tracker = Arc::new(CacheReferenceTracker::new(config.cache.enabled, self.notifier));
        info!(
            host_id = %config.node.host_id,
            cache = config.cache.enabled,
            data_mover = config.data_mover.enabled,
            "subscription engine built"
        );

        let ctx = DeliveryContext {
            config: Arc::new(config),
            repository,
            backlog,
            queue_store,
            transport,
            tracker,
            predicates: Arc::new(self.predicates),
            registry: Arc::new(SubscriberRegistry::new()),
            trigger: Arc::new(ScheduleTrigger::new()),
            shutdown: CancellationToken::new(),
        };
        Ok(SubscriptionEngine::new(Arc::new(ctx), opened_db))
    }
}
