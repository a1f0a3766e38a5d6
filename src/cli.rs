//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Dashboard API client with one-shot authorization code exchange
#[derive(Parser, Debug)]
#[command(name = "guardian-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "GUARDIAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Page URL the client starts on; may carry `?code=` from a login redirect
    #[arg(
        long,
        env = "GUARDIAN_PAGE_URL",
        default_value = "http://localhost:5173/",
        global = true
    )]
    pub page_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "GUARDIAN_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "GUARDIAN_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (defaults to `status`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask the backend whether the stored credential is accepted (default)
    Status,

    /// Probe backend liveness
    Health,

    /// Print the external login URL, or navigate to it after a liveness check
    LoginUrl {
        /// Pre-flight the backend before printing
        #[arg(long)]
        check: bool,
    },

    /// End the server session and forget the local credential
    Logout,

    /// Show whether a credential is stored locally
    Whoami,

    /// GET a backend path through the pipelines and print the JSON body
    Get {
        /// Backend path, e.g. /api/risk-score
        #[arg(required = true)]
        path: String,
    },
}
