//! Tricorder CLI
//!
//! Runs the transaction cache server, or performs a single lookup through the
//! same cached path.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tricorder_api::{ApiConfig, ApiServer, AppState};
use tricorder_core::types::TxSignature;
use tricorder_rpc::Network;

/// Tricorder - deduplicated Solana transaction cache
#[derive(Parser)]
#[command(name = "tricorder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Endpoint selection shared by all commands.
#[derive(Args)]
struct NetworkArgs {
    /// Use the devnet endpoint
    #[arg(short, long, conflicts_with = "public")]
    devnet: bool,

    /// Use the public mainnet endpoints
    #[arg(short, long)]
    public: bool,
}

impl NetworkArgs {
    fn apply(&self, config: &mut ApiConfig) {
        if self.devnet {
            config.network = Network::Devnet;
        } else if self.public {
            config.network = Network::Public;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Listen address (host:port)
        #[arg(short, long, env = "TRICORDER_ADDR")]
        addr: Option<String>,

        #[command(flatten)]
        network: NetworkArgs,
    },

    /// Fetch one transaction through the cache
    Fetch {
        /// Base58 transaction signature
        signature: String,

        #[command(flatten)]
        network: NetworkArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tricorder=debug,info"
    } else {
        "tricorder=info,warn"
    };

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()));
    if cli.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    match cli.command {
        Commands::Serve { addr, network } => cmd_serve(addr, &network).await,
        Commands::Fetch { signature, network } => cmd_fetch(&signature, &network).await,
    }
}

fn load_config(network: &NetworkArgs) -> Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("Invalid configuration")?;
    network.apply(&mut config);
    Ok(config)
}

/// Run the API server
async fn cmd_serve(addr: Option<String>, network: &NetworkArgs) -> Result<()> {
    let mut config = load_config(network)?;
    if let Some(addr) = addr {
        config.addr = addr;
    }

    println!("{}", "Starting Tricorder API server...".cyan().bold());
    println!("   {} http://{}", "Listening on:".green(), config.addr);
    println!("   {} {}", "Network:".dimmed(), config.network);
    println!("   {} http://{}/health", "Health check:".dimmed(), config.addr);
    println!("\n   Press Ctrl+C to stop.\n");

    let server = ApiServer::new(config).context("Failed to build RPC client")?;
    server.run().await.context("Server error")?;

    Ok(())
}

/// Fetch a single transaction
async fn cmd_fetch(signature: &str, network: &NetworkArgs) -> Result<()> {
    let signature = TxSignature::parse(signature).context("Invalid signature")?;
    let config = load_config(network)?;

    println!(
        "{} {} ({})",
        "Fetching:".cyan().bold(),
        signature,
        config.network
    );

    let state = AppState::new(config).context("Failed to build RPC client")?;

    let start = Instant::now();
    let outcome = state.reader.get_or_fetch(signature.as_str()).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Some(tx)) => {
            println!("{} in {:?}\n", "Found".green().bold(), elapsed);
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        Ok(None) => {
            anyhow::bail!("lookup suppressed after a recent failure")
        }
        Err(err) => {
            println!("{} after {:?}", "Failed".red().bold(), elapsed);
            Err(err).context("Transaction lookup failed")
        }
    }
}
