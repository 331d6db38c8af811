//! git-diffs - serve the uncommitted changes of a workspace's repositories
//!
//! # Usage
//! ```bash
//! git-diffs                      # Serve repositories under the current directory
//! git-diffs -C ~/src --port 9000 # Serve another workspace on another port
//! git-diffs --open               # Start and open the viewer in a browser
//! curl -H 'Accept: text/x-diff' http://127.0.0.1:8080/
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_diffs::config::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_REQUEST_TIMEOUT};
use git_diffs::{create_router, Config, DiffAggregator, DiscoveryPolicy};

/// How long in-flight requests may run after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// git-diffs - Browse the working changes of every repository in a workspace
#[derive(Parser)]
#[command(name = "git-diffs")]
#[command(about = "Serve uncommitted changes across git repositories", long_about = None)]
struct Cli {
    /// Directory to scan for git repositories
    #[arg(short = 'C', long = "workspace", env = "GIT_DIFFS_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "GIT_DIFFS_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "GIT_DIFFS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// How repositories are discovered under the workspace
    #[arg(long, value_enum, default_value_t = DiscoveryPolicy::Recursive)]
    discovery: DiscoveryPolicy,

    /// Time budget for one diff request, in milliseconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Maximum size of one diff response, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_BYTES)]
    max_bytes: usize,

    /// Default branch names, probed in order
    #[arg(long = "default-branch", value_name = "NAME")]
    default_branches: Vec<String>,

    /// git executable to run
    #[arg(long = "git", value_name = "PATH", default_value = "git")]
    git_program: PathBuf,

    /// Open browser automatically after starting
    #[arg(short, long)]
    open: bool,
}

impl Cli {
    fn into_config(self, workspace_root: PathBuf) -> Config {
        let mut config = Config::new(workspace_root);
        config.discovery = self.discovery;
        config.request_timeout = Duration::from_millis(self.timeout_ms);
        config.max_output_bytes = self.max_bytes;
        config.git_program = self.git_program;
        if !self.default_branches.is_empty() {
            config.default_branches = self.default_branches;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (quieter for production)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workspace_root = match std::fs::canonicalize(&cli.workspace) {
        Ok(path) if path.is_dir() => path,
        Ok(path) => {
            eprintln!("✗ Not a directory: {}", path.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Failed to open workspace: {}", e);
            eprintln!("  Path: {}", cli.workspace.display());
            std::process::exit(1);
        }
    };

    let addr = format!("{}:{}", cli.host, cli.port);
    let open_browser = cli.open;
    let config = cli.into_config(workspace_root);
    let default_branches = config.default_branches.join(", ");
    let workspace_display = config.workspace_root.display().to_string();
    let aggregator = Arc::new(DiffAggregator::with_git_cli(config));

    let app = create_router(aggregator);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to {}: {}", addr, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    let url = format!("http://{}", listener.local_addr()?);
    println!();
    println!("  Workspace:       {}", workspace_display);
    println!("  Default branch:  {}", default_branches);
    println!("  Server:          {}", url);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        if let Err(e) = open::that(&url) {
            eprintln!("  Warning: Could not open browser: {}", e);
        }
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            println!("\n  Shutting down...");
            shutdown.cancel();
        }
    });

    let server = {
        let shutdown = shutdown.clone();
        axum::serve(listener, app).with_graceful_shutdown(async move { shutdown.cancelled().await })
    };

    tokio::select! {
        result = async move { server.await } => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!(
                "In-flight requests still running after {:?}, exiting",
                SHUTDOWN_GRACE
            );
        }
    }

    println!("  Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
