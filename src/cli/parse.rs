//! CLI parse: clap types for jobacct. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Job accounting backend tool
#[derive(Parser)]
#[command(name = "jobacct")]
#[command(about = "Inspect and exercise pluggable job accounting backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the backend operation contract
    Contract {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List plugins installed on the search path
    Plugins {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Bind the configured backend and report the result
    Verify {
        /// Backend type to verify instead of the configured one
        #[arg(long = "type")]
        backend_type: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Drive one job through the facade
    Simulate {
        /// Job id to use
        #[arg(long)]
        job_id: u32,
        /// Number of steps to run
        #[arg(long, default_value = "1")]
        steps: u32,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}
