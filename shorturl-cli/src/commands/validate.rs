// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shorturl validate` command - Validate configuration file.
//!
//! An invalid file is returned as an error, which exits with status 1.

use shorturl_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Server Settings:");
            println!("  Listen Address:     {}:{}", config.server.host, config.server.port);
            println!("  RPC Endpoints:      {}", if config.server.rpc { "enabled" } else { "disabled" });
            println!();
            println!("Store Settings:");
            match &config.store.master {
                Some(master) => {
                    println!("  Mode:               cache proxy");
                    println!("  Master:             {}", master);
                    println!("  Remote Timeout:     {:?}", config.store.remote_timeout);
                }
                None => {
                    println!("  Mode:               authority");
                    println!("  Record Log:         {}", config.store.file.display());
                    println!("  Queue Capacity:     {}", config.store.queue_capacity);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            Err(e.into())
        }
    }
}
