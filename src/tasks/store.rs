use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;

use super::model::{NewTask, TaskDependencyRow, TaskFilter, TaskLinkRow, TaskPatch, TaskRow, TaskStatus};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// SQL layer over the `tasks`, `task_dependencies`, and `task_links` tables.
/// Per-statement atomicity from SQLite; the read-modify-write in [`update`]
/// runs inside one transaction so the status diff reported to callers always
/// matches the row that was actually overwritten.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Tasks ────────────────────────────────────────────────────────────────

    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<TaskRow>> {
        let mut rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        if let Some(ref status) = filter.status {
            rows.retain(|r| &r.status == status);
        }
        if let Some(ref priority) = filter.priority {
            rows.retain(|r| &r.priority == priority);
        }
        if let Some(ref assignee) = filter.assignee {
            rows.retain(|r| r.assignee.as_deref() == Some(assignee.as_str()));
        }
        if let Some(ref category) = filter.category {
            rows.retain(|r| r.category.as_deref() == Some(category.as_str()));
        }

        Ok(rows)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn insert(&self, task: &NewTask) -> Result<TaskRow> {
        let now = now_rfc3339();
        let priority = task.priority.unwrap_or_default();
        sqlx::query(
            "INSERT INTO tasks
             (id, title, description, status, priority, assignee, category, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(TaskStatus::New.as_str())
        .bind(priority.as_str())
        .bind(&task.assignee)
        .bind(&task.category)
        .bind(&task.due_date)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&task.id)
            .await?
            .ok_or_else(|| anyhow!("task not found after insert"))
    }

    /// Apply a partial update. Returns `(old, new)` row pair, or `None` when
    /// the id does not exist. The prior-row read, the UPDATE, and the re-read
    /// share one transaction — two concurrent updates serialize instead of
    /// racing on the status diff.
    pub async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<(TaskRow, TaskRow)>> {
        let mut tx = self.pool.begin().await?;

        let old: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(old) = old else {
            return Ok(None);
        };

        let now = now_rfc3339();
        let mut sets: Vec<&'static str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref title) = patch.title {
            sets.push("title = ?");
            binds.push(title.clone());
        }
        if let Some(ref description) = patch.description {
            sets.push("description = ?");
            binds.push(description.clone());
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            binds.push(status.as_str().to_string());
            if status == TaskStatus::Completed && old.status != TaskStatus::Completed.as_str() {
                sets.push("completed_at = ?");
                binds.push(now.clone());
            }
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?");
            binds.push(priority.as_str().to_string());
        }
        if let Some(ref assignee) = patch.assignee {
            sets.push("assignee = ?");
            binds.push(assignee.clone());
        }
        if let Some(ref category) = patch.category {
            sets.push("category = ?");
            binds.push(category.clone());
        }
        if let Some(ref due_date) = patch.due_date {
            sets.push("due_date = ?");
            binds.push(due_date.clone());
        }
        sets.push("updated_at = ?");
        binds.push(now);

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        query.bind(id).execute(&mut *tx).await?;

        let new: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((old, new)))
    }

    /// Unconditional logical delete: status becomes ARCHIVED whatever it was,
    /// so a second archive of the same id succeeds. Returns the archived row,
    /// or `None` when the id does not exist.
    pub async fn archive(&self, id: &str) -> Result<Option<TaskRow>> {
        let now = now_rfc3339();
        let affected = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(TaskStatus::Archived.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    // ─── Dependencies ─────────────────────────────────────────────────────────

    /// All edges touching `id`, in either direction.
    pub async fn dependencies(&self, id: &str) -> Result<Vec<TaskDependencyRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM task_dependencies WHERE task_id = ? OR depends_on = ?",
        )
        .bind(id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn insert_dependency(
        &self,
        task_id: &str,
        depends_on: &str,
    ) -> Result<TaskDependencyRow> {
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO task_dependencies (task_id, depends_on, created_at) VALUES (?, ?, ?)",
        )
        .bind(task_id)
        .bind(depends_on)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(TaskDependencyRow {
            task_id: task_id.to_string(),
            depends_on: depends_on.to_string(),
            created_at: now,
        })
    }

    /// Walk `depends_on` edges outward from `from`; true when `target` is
    /// reachable. Used for cycle rejection when the policy flag is off.
    pub async fn dependency_reaches(&self, from: &str, target: &str) -> Result<bool> {
        let mut frontier = vec![from.to_string()];
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(id) = frontier.pop() {
            if id == target {
                return Ok(true);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            let next: Vec<(String,)> =
                sqlx::query_as("SELECT depends_on FROM task_dependencies WHERE task_id = ?")
                    .bind(&id)
                    .fetch_all(&self.pool)
                    .await?;
            frontier.extend(next.into_iter().map(|(d,)| d));
        }
        Ok(false)
    }

    // ─── Links ────────────────────────────────────────────────────────────────

    /// Append one link row; returns the generated id.
    pub async fn insert_link(
        &self,
        task_id: &str,
        link_type: &str,
        link_url: Option<&str>,
        link_text: Option<&str>,
    ) -> Result<i64> {
        let now = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO task_links (task_id, link_type, link_url, link_text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(link_type)
        .bind(link_url)
        .bind(link_text)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn links(&self, task_id: &str) -> Result<Vec<TaskLinkRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM task_links WHERE task_id = ? ORDER BY id ASC")
                .bind(task_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
