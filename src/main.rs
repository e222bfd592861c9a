// src/main.rs

//! vizexec
//!
//! Entry point for the vizexec service and CLI.
//!
//! vizexec runs Python or R plotting snippets in a child process, captures
//! the image or HTML document they produce, and stores it under a fresh
//! namespace. All real work is delegated to the `runner` module.
//!
//! Responsibilities of this file:
//! - Load `.env` and initialise logging
//! - Parse CLI arguments
//! - Hand off execution to the runner

mod classify;
mod cli;
mod config;
mod engine;
mod error;
mod executor;
mod lang;
mod metrics;
mod namespace;
mod prune;
mod runner;
mod runtime;
mod shim;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Program entry point.
///
/// Uses Tokio because executions spawn and await interpreter processes
/// and the HTTP service multiplexes requests.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vizexec=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    runner::run(cli).await
}
