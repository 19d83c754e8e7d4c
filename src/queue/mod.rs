//! Task Queue Mirror — the human-editable `TASK-QUEUE.md` projection.
//!
//! The mirror is an independent side-channel: it carries a subset of task
//! fields (id, title, assignee, status, notes) keyed by id, and has no
//! transactional link to the task store. Drift between the two is expected;
//! [`QueueMirror::reconcile`] reports it without resolving anything.
//!
//! Concurrent writers are not locked out (last writer wins), but every
//! write goes through a temp-file-plus-rename so a crash can never leave a
//! half-written table behind.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::tasks::model::{TaskFilter, TaskRow, TaskStatus};
use crate::tasks::store::TaskStore;

/// Positional cell mapping after splitting a row on `|` and dropping empty
/// cells. The same mapping applies on both the read and the write side.
const ID_CELL: usize = 0;
const TITLE_CELL: usize = 1;
const ASSIGNEE_CELL: usize = 2;
const STATUS_CELL: usize = 3;
const NOTES_CELL: usize = 4;

/// Header line that opens the table body region.
const TABLE_HEADER: &str = "| ID |";

/// Starter content written by `missiond init`.
pub const QUEUE_TEMPLATE: &str = "\
# Task Queue

| ID | Title | Assignee | Status | Notes |
|----|-------|----------|--------|-------|
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRow {
    pub id: String,
    pub title: String,
    pub assignee: String,
    pub status: String,
    pub notes: String,
}

/// Split one table row into trimmed, non-empty cells.
fn row_cells(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse the markdown table body into rows.
///
/// The body region opens at the `| ID |` header and closes at the first line
/// that no longer starts with `|`; a later header reopens it. Rows must start
/// with `| T` and yield at least five cells — anything else (separator rows,
/// prose, truncated rows) is skipped, and cells past the notes column are
/// ignored.
pub fn parse_queue_table(content: &str) -> Vec<QueueRow> {
    let mut rows = Vec::new();
    let mut in_table = false;

    for line in content.lines() {
        if line.starts_with(TABLE_HEADER) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        if !line.starts_with('|') {
            in_table = false;
            continue;
        }
        if !line.starts_with("| T") {
            continue;
        }

        let cells = row_cells(line);
        if cells.len() <= NOTES_CELL {
            continue;
        }
        rows.push(QueueRow {
            id: cells[ID_CELL].to_string(),
            title: cells[TITLE_CELL].to_string(),
            assignee: cells[ASSIGNEE_CELL].to_string(),
            status: cells[STATUS_CELL].to_string(),
            notes: cells[NOTES_CELL].to_string(),
        });
    }

    rows
}

/// One field disagreement between the mirror and the store.
#[derive(Debug, Clone, Serialize)]
pub struct FieldConflict {
    pub id: String,
    pub field: &'static str,
    pub mirror: String,
    pub store: String,
}

/// Outcome of a reconcile pass. Reported, never auto-resolved.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    /// Ids present in the mirror but absent from the store.
    pub missing_in_store: Vec<String>,
    /// Non-archived store ids absent from the mirror.
    pub missing_in_mirror: Vec<String>,
    /// Per-field disagreements for ids present on both sides.
    pub conflicts: Vec<FieldConflict>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.missing_in_store.is_empty()
            && self.missing_in_mirror.is_empty()
            && self.conflicts.is_empty()
    }
}

pub struct QueueMirror {
    path: PathBuf,
}

impl QueueMirror {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub async fn read(&self) -> Result<Vec<QueueRow>> {
        let content = fs::read_to_string(&self.path).await?;
        Ok(parse_queue_table(&content))
    }

    pub async fn last_modified(&self) -> Result<DateTime<Utc>> {
        let meta = fs::metadata(&self.path).await?;
        Ok(DateTime::<Utc>::from(meta.modified()?))
    }

    /// Rewrite the status and/or notes cells of the first row whose id cell
    /// matches exactly. Returns false when no such row exists (or the row is
    /// too truncated for the parser to accept). The row is re-emitted with
    /// normalized single-space cell padding.
    pub async fn update(
        &self,
        id: &str,
        status: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool> {
        let content = fs::read_to_string(&self.path).await?;
        let needle = format!("| {id} |");

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut updated = false;

        for line in lines.iter_mut() {
            if !line.starts_with(&needle) {
                continue;
            }
            let mut cells: Vec<String> = row_cells(line).iter().map(|s| s.to_string()).collect();
            if cells.len() <= NOTES_CELL {
                break;
            }
            if let Some(status) = status {
                cells[STATUS_CELL] = status.to_string();
            }
            if let Some(notes) = notes {
                cells[NOTES_CELL] = notes.to_string();
            }
            *line = format!("| {} |", cells.join(" | "));
            updated = true;
            break;
        }

        if !updated {
            return Ok(false);
        }

        let mut output = lines.join("\n");
        if content.ends_with('\n') {
            output.push('\n');
        }
        self.write_atomic(&output).await?;
        Ok(true)
    }

    /// Write the full file via temp file + rename.
    async fn write_atomic(&self, content: &str) -> Result<()> {
        let tmp_path = self.path.with_extension("md.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Idempotent drift report between the mirror and the store, diffed by id.
    ///
    /// Archived tasks are excluded from `missing_in_mirror` — the mirror only
    /// carries the live queue. A missing mirror file reads as an empty mirror
    /// rather than an error, so the report stays usable for bootstrap.
    pub async fn reconcile(&self, store: &TaskStore) -> Result<ReconcileReport> {
        let mirror_rows = if self.exists() {
            self.read().await?
        } else {
            Vec::new()
        };
        let store_rows = store.list(&TaskFilter::default()).await?;

        let store_by_id: HashMap<&str, &TaskRow> =
            store_rows.iter().map(|t| (t.id.as_str(), t)).collect();
        let mirror_ids: HashSet<&str> = mirror_rows.iter().map(|r| r.id.as_str()).collect();

        let mut report = ReconcileReport::default();

        for row in &mirror_rows {
            let Some(task) = store_by_id.get(row.id.as_str()) else {
                report.missing_in_store.push(row.id.clone());
                continue;
            };
            if row.status != task.status {
                report.conflicts.push(FieldConflict {
                    id: row.id.clone(),
                    field: "status",
                    mirror: row.status.clone(),
                    store: task.status.clone(),
                });
            }
            if row.title != task.title {
                report.conflicts.push(FieldConflict {
                    id: row.id.clone(),
                    field: "title",
                    mirror: row.title.clone(),
                    store: task.title.clone(),
                });
            }
            let store_assignee = task.assignee.as_deref().unwrap_or("-");
            if row.assignee != store_assignee {
                report.conflicts.push(FieldConflict {
                    id: row.id.clone(),
                    field: "assignee",
                    mirror: row.assignee.clone(),
                    store: store_assignee.to_string(),
                });
            }
        }

        for task in &store_rows {
            if task.status != TaskStatus::Archived.as_str() && !mirror_ids.contains(task.id.as_str()) {
                report.missing_in_mirror.push(task.id.clone());
            }
        }

        Ok(report)
    }
}
