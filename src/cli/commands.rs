use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `dynadub` - click tracking and remote DOM instructions for a page.
#[derive(Parser, Debug)]
#[command(name = "dynadub")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Track clicks on a page and apply server-pushed DOM instructions.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.dynadub/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a page, connect to the server and apply instructions until Ctrl-C
    ///
    /// Every line read from stdin is treated as a click on the first element
    /// matching that CSS selector.
    Run {
        /// HTML file to load as the page
        #[arg(long)]
        page: PathBuf,

        /// Page location reported in click descriptors
        #[arg(long, default_value = "/")]
        location: String,

        /// Server endpoint (http, https, ws or wss)
        #[arg(long)]
        endpoint: Option<String>,

        /// Apply unpublished instructions for preview
        #[arg(long)]
        dubbing: bool,

        /// Apply every instruction regardless of publish state
        #[arg(long)]
        force_apply_all: bool,
    },

    /// Apply a file of instructions to a page offline and print the result
    Apply {
        /// HTML file to load as the page
        #[arg(long)]
        page: PathBuf,

        /// JSON array or JSON-lines file of instructions
        #[arg(long)]
        instructions: PathBuf,

        /// Apply unpublished instructions for preview
        #[arg(long)]
        dubbing: bool,

        /// Apply every instruction regardless of publish state
        #[arg(long)]
        force_apply_all: bool,
    },

    /// Print the selector path and click descriptor of the first match
    Path {
        /// HTML file to load as the page
        #[arg(long)]
        page: PathBuf,

        /// CSS selector of the element
        #[arg(long)]
        selector: String,

        /// Page location reported in the descriptor
        #[arg(long, default_value = "/")]
        location: String,
    },

    /// Show the effective configuration
    Status,
}
