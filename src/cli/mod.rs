//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{BranchesCommand, RunCommand, ServeCommand};
use std::ffi::OsString;

/// Build pipeline runner with live status streaming
#[derive(Debug, Parser, Clone)]
#[command(name = "buildrelay")]
#[command(version = "0.1.0")]
#[command(about = "Run build pipelines against git branches and stream their status", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Start the HTTP and websocket server
    Serve(ServeCommand),

    /// List the branches of a configured repository
    Branches(BranchesCommand),

    /// Run one pipeline in the terminal
    Run(RunCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
