//! CLI module for Delve
//!
//! Provides command-line interface parsing and handling for the `delve` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use crate::utils::toml_config::SearchBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Delve - plan-then-execute research
///
/// Breaks a question into research tasks, gathers cited evidence for each
/// concurrently and synthesizes a sourced report.
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Delve - plan-then-execute research server",
    long_about = "Breaks a research question into tasks, gathers cited evidence for each task\n\
                  concurrently and synthesizes a report that cites only gathered sources.\n\n\
                  Run without arguments to start the server, or use 'research' for a one-off run.",
    after_help = "EXAMPLES:\n    \
                  delve init                                   # Write a starter delve.toml\n    \
                  delve research \"Impact of tariffs on chips\"  # One-off run in the terminal\n    \
                  delve                                        # Start the server\n    \
                  delve --config my.toml serve                 # Use a custom config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "delve.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Research a question once and print the report
    Research {
        /// The research question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Evidence backend, overriding the configuration
        #[arg(short, long, value_enum)]
        backend: Option<SearchBackend>,

        /// Print the full run as JSON instead of step lines and Markdown
        #[arg(long)]
        json: bool,
    },

    /// Write a starter delve.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (none, ollama or openai)
        #[arg(long, default_value = "none", value_parser = ["none", "ollama", "openai"])]
        provider: String,

        /// Evidence backend
        #[arg(long, value_enum, default_value_t = SearchBackend::Simulated)]
        backend: SearchBackend,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Show the effective configuration
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
