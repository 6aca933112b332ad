//! Mercato CLI - index and query NFT marketplace listings

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "mercato")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the listing database and the event feed
    /// [default: ./data, or the paths from --config]
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a JSON-lines file of marketplace events to the feed
    Ingest {
        /// File with one event object per line
        file: PathBuf,
    },

    /// Project pending feed events into the listings table
    Project {
        /// Keep tailing the feed until Ctrl+C
        #[arg(long)]
        continuous: bool,
    },

    /// List projected listings
    Listings {
        /// Only listings of this NFT contract
        #[arg(long)]
        nft: Option<String>,

        /// Only listings by this seller
        #[arg(long)]
        seller: Option<String>,

        /// Include sold listings
        #[arg(long)]
        all: bool,

        /// Maximum number of listings to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the most relevant listing of one token
    Show {
        /// NFT contract address
        nft: String,

        /// Token id (decimal or 0x hex)
        token_id: String,

        /// Wallet looking at the token
        #[arg(long)]
        viewer: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Feed and projection status
    Status,

    /// Feed entries that could not be decoded
    Rejected {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context::load(cli.data_dir, cli.config)?;

    match cli.command {
        Commands::Ingest { file } => {
            commands::ingest::execute(&ctx, file)?;
        }
        Commands::Project { continuous } => {
            commands::project::execute(&ctx, continuous)?;
        }
        Commands::Listings {
            nft,
            seller,
            all,
            limit,
            json,
        } => {
            commands::listings::execute(&ctx, nft, seller, all, limit, json)?;
        }
        Commands::Show {
            nft,
            token_id,
            viewer,
            json,
        } => {
            commands::show::execute(&ctx, nft, token_id, viewer, json)?;
        }
        Commands::Status => {
            commands::status::execute(&ctx)?;
        }
        Commands::Rejected { limit } => {
            commands::rejected::execute(&ctx, limit)?;
        }
    }

    Ok(())
}
