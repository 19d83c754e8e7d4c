pub mod agents;
pub mod config;
pub mod error;
pub mod events;
pub mod push;
pub mod queue;
pub mod rest;
pub mod storage;
pub mod tasks;

use std::sync::Arc;

use agents::AgentRegistry;
use config::MissionConfig;
use events::EventBroadcaster;
use queue::QueueMirror;
use storage::Storage;
use tasks::{TaskService, TaskStore};

/// Shared application state passed to every route handler and the push server.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<MissionConfig>,
    pub storage: Arc<Storage>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub tasks: Arc<TaskService>,
    pub queue: Arc<QueueMirror>,
    pub agents: Arc<AgentRegistry>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    /// Wire the full context from config.
    ///
    /// Storage is opened (and migrated) here; the mirror and registry
    /// adapters only record their paths — they re-read the filesystem on
    /// every request, so hand edits are picked up without a restart.
    pub async fn init(config: MissionConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let storage = Arc::new(
            Storage::new_with_slow_query(
                &config.data_dir,
                config.observability.slow_query_threshold_ms,
            )
            .await?,
        );
        let broadcaster = Arc::new(EventBroadcaster::new());
        let tasks = Arc::new(TaskService::new(
            TaskStore::new(storage.pool()),
            (*broadcaster).clone(),
            config.tasks.allow_dependency_cycles,
        ));
        let queue = Arc::new(QueueMirror::new(config.queue_path()));
        let agents = Arc::new(AgentRegistry::new(config.agents_dir()));

        Ok(Self {
            config,
            storage,
            broadcaster,
            tasks,
            queue,
            agents,
            started_at: std::time::Instant::now(),
        })
    }
}
