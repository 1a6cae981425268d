//! Command-line argument parsing for scopegen
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Backend;
use crate::prompt::PromptTemplate;

/// scopegen - turn client requirement documents into a Scope of Work
#[derive(Parser, Debug)]
#[command(name = "scopegen")]
#[command(version)]
#[command(
    about = "Generate a structured Scope of Work from a requirements document with a local or hosted LLM",
    long_about = None
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors and the final result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a requirements document (.pdf, .docx, .txt)
    Run {
        /// Input document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Objective given to the model (defaults to the configured query)
        #[arg(long)]
        query: Option<String>,

        /// Prompt template: modules, detailed, full-plan
        #[arg(long)]
        template: Option<PromptTemplate>,

        /// Generation backend: ollama-cli, ollama-http, gemini
        #[arg(long)]
        backend: Option<Backend>,

        /// Model name passed to the backend
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Store a reference scope table (JSON) in the relational store
    Sample {
        /// Name to store the example under
        name: String,

        /// JSON file holding the scope table
        #[arg(value_name = "JSON_FILE")]
        json_file: PathBuf,
    },

    /// Look up the chunks nearest to a query in the last run's vector index
    Search {
        /// Text to search for
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// List models installed in the local Ollama server
    Models,

    /// Display current configuration
    Config,

    /// Run environment diagnostics and health checks
    Doctor,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Stage lines, warnings and spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Per-stage detail
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Full prompts and raw model output
    pub fn show_tokens(&self) -> bool {
        matches!(self, Verbosity::VeryVerbose)
    }
}
