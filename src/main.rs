use anyhow::Result;
use clap::{Parser, Subcommand};
use missiond::{
    config::MissionConfig,
    push,
    queue::{QueueMirror, QUEUE_TEMPLATE},
    rest,
    storage::Storage,
    tasks::TaskStore,
    AppContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "missiond",
    about = "Mission Control — task/agent coordination daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "MISSIOND_PORT")]
    port: Option<u16>,

    /// WebSocket push channel port
    #[arg(long, env = "MISSIOND_PUSH_PORT")]
    push_port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "MISSIOND_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Workspace directory holding TASK-QUEUE.md and agents/
    #[arg(long, env = "MISSIOND_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MISSIOND_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "MISSIOND_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Bind address for both servers (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "MISSIOND_BIND")]
    bind_address: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon (default when no subcommand given).
    ///
    /// Runs the REST API and the WebSocket push channel in the foreground.
    Serve,
    /// Scaffold a workspace: TASK-QUEUE.md with an empty table and an
    /// agents/ directory.
    ///
    /// Safe to re-run: existing files are never overwritten.
    Init {
        /// Workspace path to initialize (default: configured workspace dir)
        path: Option<PathBuf>,
    },
    /// Print the mirror-vs-store reconcile report as JSON and exit.
    ///
    /// Read-only: conflicts are reported, never resolved.
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = MissionConfig::new(
        args.port,
        args.push_port,
        args.data_dir,
        args.workspace_dir,
        args.log,
        args.bind_address,
    );

    match args.command {
        Some(Command::Init { path }) => run_init(path.unwrap_or_else(|| config.workspace_dir.clone())),
        Some(Command::Reconcile) => run_reconcile(config).await,
        Some(Command::Serve) | None => run_server(config, args.log_file).await,
    }
}

async fn run_server(config: MissionConfig, log_file: Option<PathBuf>) -> Result<()> {
    let _guard = setup_logging(&config.log, log_file.as_deref(), &config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        workspace = %config.workspace_dir.display(),
        "missiond starting"
    );

    let ctx = Arc::new(AppContext::init(config).await?);

    // Graceful shutdown: resolve on SIGTERM (Unix) or Ctrl-C (all platforms).
    let shutdown = make_shutdown_future();
    tokio::pin!(shutdown);

    tokio::select! {
        res = rest::start_rest_server(ctx.clone()) => res?,
        res = push::start_push_server(ctx.clone()) => res?,
        _ = &mut shutdown => {
            info!("shutdown signal received — stopping servers");
        }
    }

    Ok(())
}

fn run_init(workspace: PathBuf) -> Result<()> {
    std::fs::create_dir_all(workspace.join("agents"))?;

    let queue_path = workspace.join("TASK-QUEUE.md");
    if queue_path.exists() {
        println!("exists   {}", queue_path.display());
    } else {
        std::fs::write(&queue_path, QUEUE_TEMPLATE)?;
        println!("created  {}", queue_path.display());
    }
    println!("created  {}", workspace.join("agents").display());
    Ok(())
}

async fn run_reconcile(config: MissionConfig) -> Result<()> {
    let storage = Storage::new(&config.data_dir).await?;
    let store = TaskStore::new(storage.pool());
    let mirror = QueueMirror::new(config.queue_path());

    let report = mirror.reconcile(&store).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Initialize tracing with the configured level/format and an optional daily
/// rolling log file.
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("missiond.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

/// Returns a future that resolves when a shutdown signal is received.
///
/// On Unix we listen for SIGTERM *and* Ctrl-C.
/// On other platforms we listen for Ctrl-C only.
async fn make_shutdown_future() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
