//! Integration tests for the agent card registry: directory scans, marker
//! defaulting, and partial in-place updates.

use missiond::agents::AgentRegistry;
use tempfile::TempDir;

fn write_card(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(format!("{name}.md")), content).unwrap();
}

#[tokio::test]
async fn list_scans_directory_and_parses_markers() {
    let dir = TempDir::new().unwrap();
    write_card(
        &dir,
        "olex",
        "# Olex\n\n**State:** busy\n**Current Task:** Fix the build\n",
    );
    write_card(&dir, "ruv", "# Ruv\n\n**State:** available\n");
    // Non-markdown files are ignored
    std::fs::write(dir.path().join("notes.txt"), "**State:** bogus").unwrap();

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    let agents = registry.list().await.unwrap();

    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].name, "olex");
    assert_eq!(agents[0].state, "busy");
    assert_eq!(agents[0].current_task.as_deref(), Some("Fix the build"));
    assert_eq!(agents[1].name, "ruv");
    assert_eq!(agents[1].state, "available");
    assert!(agents[1].current_task.is_none());
}

#[tokio::test]
async fn missing_markers_default_instead_of_erroring() {
    let dir = TempDir::new().unwrap();
    write_card(&dir, "ghost", "# A card with no marker lines at all\n");

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    let agents = registry.list().await.unwrap();

    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].state, "unknown");
    assert!(agents[0].current_task.is_none());
}

#[tokio::test]
async fn missing_directory_reads_as_empty_registry() {
    let dir = TempDir::new().unwrap();
    let registry = AgentRegistry::new(dir.path().join("does-not-exist"));

    assert!(!registry.dir_exists());
    assert!(registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_replaces_state_in_place() {
    let dir = TempDir::new().unwrap();
    write_card(
        &dir,
        "olex",
        "# Olex\n\n**State:** available\n**Current Task:** none\n\nProse stays.\n",
    );

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    let result = registry.update("olex", Some("busy"), None).await.unwrap();
    assert!(result.is_some());

    let content = std::fs::read_to_string(dir.path().join("olex.md")).unwrap();
    assert!(content.contains("**State:** busy"));
    assert!(content.contains("**Current Task:** none"), "untouched field");
    assert!(content.contains("Prose stays."));
}

#[tokio::test]
async fn current_task_update_is_noop_when_marker_absent() {
    let dir = TempDir::new().unwrap();
    let original = "# Olex\n\n**State:** available\n";
    write_card(&dir, "olex", original);

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    registry
        .update("olex", None, Some("Ship the release"))
        .await
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("olex.md")).unwrap();
    assert_eq!(content, original, "a missing marker is never inserted");
}

#[tokio::test]
async fn empty_current_task_writes_none() {
    let dir = TempDir::new().unwrap();
    write_card(&dir, "olex", "**State:** busy\n**Current Task:** Old work\n");

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    registry.update("olex", None, Some("")).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("olex.md")).unwrap();
    assert!(content.contains("**Current Task:** none"));
}

#[tokio::test]
async fn update_of_unknown_agent_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let registry = AgentRegistry::new(dir.path().to_path_buf());

    let result = registry.update("ghost", Some("busy"), None).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn read_card_returns_raw_document() {
    let dir = TempDir::new().unwrap();
    write_card(&dir, "olex", "# Olex\n**State:** busy\n");

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    let (card, last_modified) = registry.read_card("olex").await.unwrap().unwrap();
    assert!(card.starts_with("# Olex"));
    assert!(last_modified.is_some());

    assert!(registry.read_card("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn update_leaves_no_temp_file_behind() {
    let dir = TempDir::new().unwrap();
    write_card(&dir, "olex", "**State:** available\n");

    let registry = AgentRegistry::new(dir.path().to_path_buf());
    registry.update("olex", Some("offline"), None).await.unwrap();

    assert!(!dir.path().join("olex.md.tmp").exists());
}
