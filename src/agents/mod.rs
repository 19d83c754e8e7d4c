//! Agent Registry — one markdown card per agent under the workspace
//! `agents/` directory.
//!
//! A card's machine-readable surface is two free-text marker lines
//! (`**State:** busy` and `**Current Task:** ...`); everything else in the
//! document is prose the daemon never touches. There is no persisted index:
//! every read re-scans the directory, so a hand-edited card is visible on the
//! next request without any notification hop.
//!
//! Marker parsing is confined to this adapter; nothing outside it pattern
//! matches card text.

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Captures the single-word state token, e.g. `**State:** busy`.
static STATE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*State:\*\*\s*(\w+)").expect("regex: state marker"));

/// Captures the rest of the line after `**Current Task:**`.
static CURRENT_TASK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*Current Task:\*\*\s*(.+)").expect("regex: current task marker"));

#[derive(Debug, Clone, Serialize)]
pub struct AgentCard {
    pub name: String,
    pub state: String,
    pub current_task: Option<String>,
    pub card_path: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Parse the two markers out of a card document.
///
/// A missing `**State:**` marker defaults to `"unknown"`; a missing
/// `**Current Task:**` marker yields `None`. Neither is an error — cards are
/// hand-edited and frequently incomplete. When a marker appears more than
/// once, the first occurrence wins.
pub fn parse_card(content: &str) -> (String, Option<String>) {
    let state = STATE_MARKER
        .captures(content)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let current_task = CURRENT_TASK_MARKER
        .captures(content)
        .map(|c| c[1].trim().to_string());
    (state, current_task)
}

pub struct AgentRegistry {
    dir: PathBuf,
}

impl AgentRegistry {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dir_exists(&self) -> bool {
        self.dir.is_dir()
    }

    fn card_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.md"))
    }

    /// Scan the directory and parse every `*.md` card. A missing directory
    /// reads as an empty registry. Results are sorted by name so the listing
    /// is stable across filesystems.
    pub async fn list(&self) -> Result<Vec<AgentCard>> {
        if !self.dir_exists() {
            return Ok(Vec::new());
        }

        let mut cards = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path).await?;
            let (state, current_task) = parse_card(&content);
            let last_modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            cards.push(AgentCard {
                name: name.to_string(),
                state,
                current_task,
                card_path: path.display().to_string(),
                last_modified,
            });
        }

        cards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cards)
    }

    /// Raw card content plus mtime, or `None` when the agent has no card.
    pub async fn read_card(&self, name: &str) -> Result<Option<(String, Option<DateTime<Utc>>)>> {
        let path = self.card_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let last_modified = fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        Ok(Some((content, last_modified)))
    }

    /// Partial in-place update of a card's marker lines.
    ///
    /// A supplied state replaces the first `**State:**` value. A supplied
    /// current_task replaces the first `**Current Task:**` line ONLY when
    /// that marker already exists — a card without the marker is left
    /// untouched for that field (the daemon never inserts markers into
    /// hand-authored prose). An empty current_task writes `none`.
    ///
    /// Returns `None` when the agent has no card.
    pub async fn update(
        &self,
        name: &str,
        state: Option<&str>,
        current_task: Option<&str>,
    ) -> Result<Option<()>> {
        let path = self.card_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let mut content = fs::read_to_string(&path).await?;

        if let Some(state) = state {
            content = STATE_MARKER
                .replace(&content, NoExpand(&format!("**State:** {state}")))
                .into_owned();
        }

        if let Some(task) = current_task {
            if CURRENT_TASK_MARKER.is_match(&content) {
                let value = if task.is_empty() { "none" } else { task };
                content = CURRENT_TASK_MARKER
                    .replace(&content, NoExpand(&format!("**Current Task:** {value}")))
                    .into_owned();
            }
        }

        let tmp_path = path.with_extension("md.tmp");
        fs::write(&tmp_path, &content).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(Some(()))
    }

    /// Path string for response payloads.
    pub fn card_path_string(&self, name: &str) -> String {
        self.card_path(name).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_markers() {
        let card = "# Olex\n\n**State:** busy\n**Current Task:** Shipping the release\n";
        let (state, task) = parse_card(card);
        assert_eq!(state, "busy");
        assert_eq!(task.as_deref(), Some("Shipping the release"));
    }

    #[test]
    fn missing_state_defaults_to_unknown() {
        let (state, task) = parse_card("# Card with no markers\n");
        assert_eq!(state, "unknown");
        assert!(task.is_none());
    }

    #[test]
    fn missing_current_task_is_absent_not_error() {
        let (state, task) = parse_card("**State:** available\n");
        assert_eq!(state, "available");
        assert!(task.is_none());
    }

    #[test]
    fn duplicate_markers_take_first() {
        let card = "**State:** busy\n**State:** offline\n";
        let (state, _) = parse_card(card);
        assert_eq!(state, "busy");
    }

    #[test]
    fn current_task_value_may_contain_reserved_characters() {
        let card = "**Current Task:** review | merge $PR *now*\n";
        let (_, task) = parse_card(card);
        assert_eq!(task.as_deref(), Some("review | merge $PR *now*"));
    }
}
