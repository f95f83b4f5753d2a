//! Fact Check Control - CLI for the claim verification engine
//!
//! Runs checks locally from a claims file, previews query plans and shows
//! the effective configuration.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "factcheckctl")]
#[command(about = "Verify article claims against trusted web sources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the claims in a file
    Check {
        /// JSON file: {"claims": [...]} or a bare array of claims
        #[arg(long)]
        claims: PathBuf,

        /// Article headline, used for the wire-service source match
        #[arg(long)]
        headline: Option<String>,

        /// Recency filter for searches (e.g. "week", "month")
        #[arg(long)]
        freshness: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the queries each claim would run, without searching
    Plan {
        #[arg(long)]
        claims: PathBuf,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            claims,
            headline,
            freshness,
            json,
        } => commands::check(&claims, headline, freshness, json).await,
        Commands::Plan { claims } => commands::plan(&claims),
        Commands::Config => commands::config(),
    }
}
