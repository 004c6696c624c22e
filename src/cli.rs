use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The command line interface for serial expect.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),

    /// Scan a firmware console until a pattern appears.
    Expect {
        /// The console tty to scan.
        tty: String,

        /// The pattern to scan for.
        pattern: String,

        /// Baud rate of the console.
        /// Overrides the config; 115200 if neither names one.
        #[arg(long)]
        baud: Option<u32>,

        /// Give up after this many seconds. Scans forever if omitted.
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Send one command to the control node and print its answer.
    Send {
        /// The command tokens.
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}
