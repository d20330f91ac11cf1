//! Callo CLI - operator tooling for Callo servers
//!
//! # Commands
//! - `callo keygen` - Print a random 256-bit key
//! - `callo check --config <file>` - Validate a config file
//! - `callo open --config <file> <token>` - Decrypt a session token

mod check;
mod keygen;
mod open;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Callo CLI
#[derive(Parser)]
#[command(name = "callo")]
#[command(author, version, about = "Command-line interface for Callo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random 256-bit key (base64)
    Keygen {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = KeyFormat::Base64)]
        format: KeyFormat,
    },

    /// Validate a config file, including environment overrides
    Check {
        /// Path to the TOML config file
        #[arg(short, long)]
        config: PathBuf,

        /// Ignore CALLO_* environment variables
        #[arg(long)]
        no_env: bool,
    },

    /// Decrypt a session token with the configured key
    Open {
        /// Path to the TOML config file
        #[arg(short, long)]
        config: PathBuf,

        /// The token, as returned in a reply's `state` field
        token: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KeyFormat {
    /// Bare base64
    Base64,
    /// A ready-to-paste `[crypt]` section
    Toml,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { format } => {
            println!("{}", keygen::run_keygen_command(format));
            Ok(())
        }
        Commands::Check { config, no_env } => check::run_check_command(&config, !no_env),
        Commands::Open { config, token } => open::run_open_command(&config, &token),
    }
}
