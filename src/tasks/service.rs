//! Task Service — validates mutations, applies them to the store, and emits
//! lifecycle events. Every mutation emits exactly one event; event emission
//! is fire-and-forget and can never fail the request.

use crate::error::ApiError;
use crate::events::{EventBroadcaster, TaskEventKind};

use super::model::{NewTask, TaskDependencyRow, TaskFilter, TaskPatch, TaskRow};
use super::store::TaskStore;

pub struct TaskService {
    store: TaskStore,
    events: EventBroadcaster,
    allow_dependency_cycles: bool,
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

impl TaskService {
    pub fn new(store: TaskStore, events: EventBroadcaster, allow_dependency_cycles: bool) -> Self {
        Self {
            store,
            events,
            allow_dependency_cycles,
        }
    }

    /// Direct store access for read-side collaborators (reconcile, CLI).
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskRow>, ApiError> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn get(&self, id: &str) -> Result<TaskRow, ApiError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
    }

    pub async fn create(&self, task: NewTask) -> Result<TaskRow, ApiError> {
        if task.id.trim().is_empty() {
            return Err(ApiError::BadRequest("Task ID required".to_string()));
        }
        if task.title.trim().is_empty() {
            return Err(ApiError::BadRequest("Task title required".to_string()));
        }

        let row = match self.store.insert(&task).await {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                return Err(ApiError::Conflict(format!(
                    "Task {} already exists",
                    task.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        self.events.broadcast(TaskEventKind::Created, &row);
        Ok(row)
    }

    pub async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskRow, ApiError> {
        if patch.is_empty() {
            return Err(ApiError::BadRequest("No updates provided".to_string()));
        }

        let Some((old, new)) = self.store.update(id, patch).await? else {
            return Err(ApiError::NotFound("Task not found".to_string()));
        };

        let kind = if old.status != new.status {
            TaskEventKind::StatusChanged
        } else {
            TaskEventKind::Updated
        };
        self.events.broadcast(kind, &new);
        Ok(new)
    }

    pub async fn archive(&self, id: &str) -> Result<TaskRow, ApiError> {
        let Some(row) = self.store.archive(id).await? else {
            return Err(ApiError::NotFound("Task not found".to_string()));
        };

        self.events.broadcast(TaskEventKind::Deleted, &row);
        Ok(row)
    }

    pub async fn relationships(&self, id: &str) -> Result<Vec<TaskDependencyRow>, ApiError> {
        Ok(self.store.dependencies(id).await?)
    }

    pub async fn link(
        &self,
        id: &str,
        link_type: &str,
        link_url: Option<&str>,
        link_text: Option<&str>,
    ) -> Result<i64, ApiError> {
        if link_type.trim().is_empty() {
            return Err(ApiError::BadRequest("link_type required".to_string()));
        }
        Ok(self
            .store
            .insert_link(id, link_type, link_url, link_text)
            .await?)
    }

    /// Insert a dependency edge. Self-references and cycle-closing edges are
    /// rejected only when `allow_dependency_cycles` is off; stored edges are
    /// never re-validated.
    pub async fn add_dependency(
        &self,
        task_id: &str,
        depends_on: &str,
    ) -> Result<TaskDependencyRow, ApiError> {
        if !self.allow_dependency_cycles {
            if task_id == depends_on {
                return Err(ApiError::BadRequest(
                    "Self-referential dependency rejected".to_string(),
                ));
            }
            if self.store.dependency_reaches(depends_on, task_id).await? {
                return Err(ApiError::BadRequest(format!(
                    "Dependency {task_id} -> {depends_on} would close a cycle"
                )));
            }
        }

        match self.store.insert_dependency(task_id, depends_on).await {
            Ok(edge) => Ok(edge),
            Err(e) if is_unique_violation(&e) => Err(ApiError::Conflict(format!(
                "Dependency {task_id} -> {depends_on} already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
