//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voyager session client CLI
#[derive(Parser, Debug)]
#[command(name = "voyager-session")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Account (login e-mail) the session belongs to
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Cookie storage directory (overrides the config file)
    #[arg(long, global = true)]
    pub cookies_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, reusing stored cookies when they are still valid
    Login {
        /// Password (falls back to VOYAGER_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Skip stored cookies and run the full handshake
        #[arg(long)]
        force: bool,
    },

    /// Check whether a stored session can be restored
    Restore,

    /// Delete the stored session
    Logout,

    /// Issue one authorized GET against an API path
    Get {
        /// Path relative to the API prefix, e.g. `/me`
        path: String,
    },

    /// Fetch a paged collection
    Collect {
        /// Collection path relative to the API prefix
        path: String,

        /// Maximum number of elements (default: everything)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Elements per page (default: from config)
        #[arg(long)]
        page_size: Option<usize>,

        /// Extra query parameter, `key=value` (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Print what was fetched when a later page fails instead of exiting
        #[arg(long)]
        allow_partial: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON, one document per line
    Json,
    /// Indented JSON
    Pretty,
}
