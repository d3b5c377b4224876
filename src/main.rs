//! Linelog Server Binary
//!
//! Appends one line per connection to a shared log and replies with the whole log.

use clap::Parser;
use linelog::config::ServerConfig;
use linelog::daemon::{self, Detached};
use linelog::server::{bind_listener, trigger_on_signal, LogServer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "linelog-server")]
#[command(about = "Concurrent line-append server that replies with the whole log")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Shared log file path
    #[arg(short = 'f', long)]
    data_file: Option<PathBuf>,

    /// Fork into the background after binding
    #[arg(short, long)]
    daemon: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            "linelog=debug,info"
        } else {
            "linelog=info,warn,error"
        })
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting Linelog Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_file) = args.data_file {
        config.storage.data_file = data_file;
    }
    if args.daemon {
        config.server.daemon = true;
    }
    config.storage.data_file = daemon::absolute_path(&config.storage.data_file)?;

    config.validate()?;

    info!("Listen address: {}", config.listen_address());
    info!("Data file: {}", config.storage.data_file.display());
    info!(
        "Annotator: {} every {}s",
        if config.annotator.enabled { "enabled" } else { "disabled" },
        config.annotator.interval_secs
    );

    // Bind before detaching so bind errors reach the terminal
    let listener = bind_listener(&config)?;

    if config.server.daemon {
        if let Detached::Parent(child) = daemon::detach()? {
            info!("Daemon pid: {}", child);
            return Ok(());
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = LogServer::from_listener(config, listener).await?;
        let _signals = trigger_on_signal(server.shutdown_handle())?;

        let report = server.run().await?;
        info!(
            "Served {} connections, joined {} workers, appended {} timestamps",
            report.connections_accepted, report.workers_joined, report.timestamps_appended
        );
        info!("Linelog Server stopped");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
