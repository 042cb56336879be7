use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod sync;

use commands::{
    CacheCommand, ClearCommand, ConfigCommand, QueueCommand, SyncCommand, UsageCommand,
    WatchCommand,
};
use config::Config;
use sync::Session;

#[derive(Parser)]
#[command(name = "caresync")]
#[command(version)]
#[command(about = "Offline-first cache and action queue for the CareSync platform", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record actions to send when online
    Queue(QueueCommand),

    /// Send pending actions to the backend
    Sync(SyncCommand),

    /// Manage the offline copy of reference data
    Cache(CacheCommand),

    /// Show offline storage usage
    Usage(UsageCommand),

    /// Delete cached data and pending actions
    Clear(ClearCommand),

    /// Watch connectivity and sync automatically
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "caresync=info,caresync_core=info"
    } else {
        "caresync=warn,caresync_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(Config::default_config_path);
    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config, &config_path);
    }

    let mut session = Session::open(&config)?;
    tracing::debug!("Data directory: {}", config.data_dir.value.display());

    match command {
        Commands::Queue(cmd) => cmd.run(&session, &config).await?,
        Commands::Sync(cmd) => cmd.run(&session, &config).await?,
        Commands::Cache(cmd) => cmd.run(&mut session).await?,
        Commands::Usage(cmd) => cmd.run(&session)?,
        Commands::Clear(cmd) => cmd.run(&mut session).await?,
        Commands::Watch(cmd) => cmd.run(&session, &config).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}
