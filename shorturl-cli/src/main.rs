// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shorturl CLI
//!
//! Command-line interface and HTTP server for the shorturl service.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod metrics;
mod rpc;
mod server;

/// shorturl - URL shortener with replicated read caches
#[derive(Parser)]
#[command(name = "shorturl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults apply if it does not exist)
    #[arg(short, long, default_value = "shorturl.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a node
    Serve {
        /// Host to listen on
        #[arg(long)]
        host: Option<String>,

        /// HTTP listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Record log file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Serve the RPC endpoints used by cache proxies
        #[arg(long)]
        rpc: bool,

        /// Master address; run as a cache proxy for it
        #[arg(short, long)]
        master: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve {
            host,
            port,
            file,
            rpc,
            master,
        } => {
            let overrides = commands::serve::Overrides {
                host,
                port,
                file,
                rpc,
                master,
            };
            commands::serve::execute(&cli.config, overrides).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
