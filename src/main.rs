// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;

use vocalis::server::Server;

const DEFAULT_PORT: u16 = 8788;

/// Local voice generation server core.
#[derive(Parser, Debug)]
#[command(name = "vocalis", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to; use 0.0.0.0 to allow network access
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Enable debug-level logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let max_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(false)
        .init();

    Server::new(cli.port)
        .with_bind_address(cli.bind)
        .start()
        .await
}
