use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_PUSH_PORT: u16 = 4401;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TasksConfig ──────────────────────────────────────────────────────────────

/// Task graph configuration (`[tasks]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Permit dependency edges that are self-referential or close a cycle.
    /// Default: true. Existing stored edges are never re-validated when this
    /// is turned off — only new edges are checked.
    pub allow_dependency_cycles: bool,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            allow_dependency_cycles: true,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST API port (default: 4400).
    port: Option<u16>,
    /// WebSocket push channel port (default: 4401).
    push_port: Option<u16>,
    /// Bind address for both servers (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Workspace directory holding TASK-QUEUE.md and agents/ (default: {data_dir}/workspace-shared).
    workspace_dir: Option<PathBuf>,
    /// Log level filter string, e.g. "debug", "info,missiond=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
    /// Task graph configuration (`[tasks]`).
    tasks: Option<TasksConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── MissionConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MissionConfig {
    /// REST API port.
    pub port: u16,
    /// WebSocket push channel port.
    pub push_port: u16,
    /// Bind address for both servers.
    pub bind_address: String,
    /// Data directory: config.toml and the SQLite database.
    pub data_dir: PathBuf,
    /// Workspace directory: TASK-QUEUE.md and the agents/ card directory.
    pub workspace_dir: PathBuf,
    /// Log level filter.
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
    /// Task graph behavior: dependency cycle policy.
    pub tasks: TasksConfig,
}

impl MissionConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        push_port: Option<u16>,
        data_dir: Option<PathBuf>,
        workspace_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let push_port = push_port.or(toml.push_port).unwrap_or(DEFAULT_PUSH_PORT);
        let bind_address = bind_address
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);
        let workspace_dir = workspace_dir
            .or(toml.workspace_dir)
            .unwrap_or_else(|| data_dir.join("workspace-shared"));
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());
        let log_format = toml.log_format.unwrap_or_else(|| "pretty".to_string());

        Self {
            port,
            push_port,
            bind_address,
            data_dir,
            workspace_dir,
            log,
            log_format,
            observability: toml.observability.unwrap_or_default(),
            tasks: toml.tasks.unwrap_or_default(),
        }
    }

    /// Path of the markdown task queue mirror.
    pub fn queue_path(&self) -> PathBuf {
        self.workspace_dir.join("TASK-QUEUE.md")
    }

    /// Directory of per-agent card documents.
    pub fn agents_dir(&self) -> PathBuf {
        self.workspace_dir.join("agents")
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/missiond
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("missiond");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/missiond or ~/.local/share/missiond
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("missiond");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("missiond");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\missiond
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("missiond");
        }
    }
    PathBuf::from(".missiond")
}
