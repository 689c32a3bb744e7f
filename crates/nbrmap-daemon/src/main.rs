//! nbrmap - Main entry point
//!
//! Crawls a network from a seed device over CDP and LLDP, prints the
//! resulting topology, or serves the same crawl over a REST API.

mod api;
mod config;
mod server;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::{AppState, RunParams};

#[derive(Parser, Debug)]
#[command(name = "nbrmap")]
#[command(about = "Network topology discovery over CDP and LLDP")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "nbrmap.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the network from a seed device and print the topology
    Discover {
        /// Management address of the seed device
        #[arg(short, long)]
        seed: Option<String>,

        /// Device family of the seed (defaults to discovery.default_family)
        #[arg(short, long)]
        family: Option<String>,

        /// Login username
        #[arg(short, long)]
        username: Option<String>,

        /// Login password; omit to use SSH keys or an agent
        #[arg(short, long, env = "NBRMAP_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Deepest level to record (seed is 0)
        #[arg(short, long)]
        max_depth: Option<u32>,

        /// Print the full result as JSON instead of a tree
        #[arg(long)]
        json: bool,

        /// Crawl the built-in demo lab instead of real devices
        #[arg(long)]
        demo: bool,
    },
    /// Serve the REST API
    Serve {
        /// Bind address for web server
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// List the configured device families
    Families,
    /// Write the default configuration to the --config path
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("nbrmap v{}", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig { force } = args.command {
        if args.config.exists() && !force {
            anyhow::bail!("{} already exists; pass --force to overwrite", args.config.display());
        }
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    if let Command::Serve { bind: Some(bind) } = &args.command {
        config.daemon.bind = bind.clone();
    }

    info!(
        max_depth = config.discovery.max_depth,
        max_sessions = config.discovery.max_sessions,
        "Configuration loaded"
    );

    let state = AppState::new(config)?;

    match args.command {
        Command::Discover {
            seed,
            family,
            username,
            password,
            max_depth,
            json,
            demo,
        } => {
            let request = state.request(RunParams {
                seed,
                family,
                username,
                password,
                max_depth,
                demo,
            })?;
            let outcome = state.discover(request, demo).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.render());
                println!();
                let summary = outcome.summary;
                println!(
                    "Devices: {} ({} crawled, {} unreachable, {} leaves)",
                    summary.devices, summary.crawled, summary.unreachable, summary.leaves
                );
                println!("Links: {} ({} unique adjacencies)", summary.links, summary.adjacencies);
            }
        }
        Command::Serve { .. } => {
            let bind = state.config.daemon.bind.clone();
            server::run(state, &bind).await?;
        }
        Command::Families => {
            for family in state.classifier.families() {
                println!("{}", family);
            }
            println!(
                "Crawlable capabilities: {}",
                state.config.classification.allowed_capabilities.join(", ")
            );
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
