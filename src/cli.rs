// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Render Python / R plotting snippets into stored image or HTML artifacts.
///
/// `vizexec.yaml` is the primary source of truth.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(name = "vizexec", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP service.
    ///
    /// Routes:
    /// - POST /api/visualize
    /// - GET  /visualizations/{id}/{file}
    /// - GET  /health
    Serve {
        /// Path to config file
        #[arg(short, long, default_value = "vizexec.yaml")]
        config: PathBuf,

        /// Override listen address
        ///
        /// Example:
        /// --addr 0.0.0.0:5000
        #[arg(long)]
        addr: Option<String>,
    },

    /// Run one script file through the pipeline and print the JSON result.
    ///
    /// Exits non-zero when no artifact was produced.
    Run {
        /// Script to execute (.py or .R)
        file: PathBuf,

        /// Language, when the extension does not say
        #[arg(short, long, value_parser = ["python", "r"])]
        language: Option<String>,

        /// Path to config file
        #[arg(short, long, default_value = "vizexec.yaml")]
        config: PathBuf,
    },

    /// Delete namespaces older than the retention age.
    Prune {
        /// Path to config file
        #[arg(short, long, default_value = "vizexec.yaml")]
        config: PathBuf,

        /// Override `retention.max_age_hours`
        #[arg(long)]
        older_than_hours: Option<u64>,
    },

    /// Initialise a project scaffold.
    ///
    /// Creates:
    /// - vizexec.yaml
    /// - samples/ with one static and one interactive script per language
    Init,
}

pub const DEFAULT_CONFIG: &str = "vizexec.yaml";
