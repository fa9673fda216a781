//! CLI interface for Simcha

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simcha")]
#[command(version)]
#[command(about = "A small multi-user blog", long_about = None)]
pub struct Cli {
    /// Path to simcha.toml (defaults to searching upward from the current directory)
    #[arg(short, long, global = true, env = "SIMCHA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default simcha.toml configuration file
    Init,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database schema
    Migrate,

    /// Create a user account, prompting for the password
    CreateUser {
        /// Login email for the new account
        #[arg(short, long)]
        email: String,
    },

    /// Log a user out of every device
    RevokeSessions {
        /// Email of the account
        #[arg(short, long)]
        email: String,
    },
}
