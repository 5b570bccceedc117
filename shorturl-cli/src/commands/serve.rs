// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shorturl serve` command - Run a node.
//!
//! Without a master address the node is the authority: it replays its record
//! log and owns key generation. With one it becomes a caching read replica
//! that forwards writes and cache misses to the master.

use std::path::PathBuf;
use std::sync::Arc;

use shorturl_core::{Config, ConfigLoader, StoreFacade};

use crate::metrics;
use crate::rpc::HttpRemote;
use crate::server;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub file: Option<PathBuf>,
    pub rpc: bool,
    pub master: Option<String>,
}

impl Overrides {
    fn apply(self, mut config: Config) -> Config {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(file) = self.file {
            config.store.file = file;
        }
        if self.rpc {
            config.server.rpc = true;
        }
        if let Some(master) = self.master {
            config.store.master = Some(master);
        }
        config
    }
}

pub async fn execute(
    config_path: &str,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, "Starting node");

    // Load and validate configuration - fail fast on invalid config
    let config = overrides
        .apply(ConfigLoader::load_or_default(config_path)?)
        .validate()?;

    metrics::init();

    // Replay happens here; a corrupt record log aborts startup.
    let store = Arc::new(StoreFacade::open(&config.store, HttpRemote::connect).await?);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    SHORTURL NODE                             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    match &config.store.master {
        Some(master) => println!("▶ Mode:    cache proxy for {}", master),
        None => println!(
            "▶ Mode:    authority ({} keys from {})",
            store.local_count(),
            config.store.file.display()
        ),
    }
    println!(
        "▶ Listen:  http://{}:{}{}",
        config.server.host,
        config.server.port,
        if config.server.rpc { " (rpc enabled)" } else { "" }
    );
    println!();
    println!("Press Ctrl+C to stop...");

    let app = server::router(Arc::clone(&store), config.server.rpc);
    server::serve(
        (config.server.host.as_str(), config.server.port),
        app,
        shutdown_signal(),
    )
    .await?;

    println!();
    println!("Shutting down...");
    tracing::info!("HTTP server stopped, flushing record log");
    store.shutdown().await?;

    println!("Node stopped.");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Caught Ctrl+C"),
        _ = terminate => tracing::info!("Caught SIGTERM"),
    }
}
