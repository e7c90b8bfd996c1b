//! Command-line interface for turnstack maintenance.

use clap::{Parser, Subcommand};

/// Turnstack - revision engine maintenance tool
#[derive(Parser, Debug)]
#[command(name = "turnstack")]
#[command(about = "Inspect and maintain a turnstack game database", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the engine config file (defaults apply when absent)
    #[arg(short, long, default_value = "turnstack.toml")]
    pub config: std::path::PathBuf,

    /// Override the database path from the config
    #[arg(long)]
    pub db_path: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// List the recorded revisions of a game
    Revisions {
        /// Game id
        #[arg(long)]
        game: i64,
    },

    /// Show a user's stored revision stack in a game
    Stack {
        /// Game id
        #[arg(long)]
        game: i64,

        /// User id
        #[arg(long)]
        user: i64,
    },

    /// Show a user's Elo rating and history
    Rating {
        /// User id
        #[arg(long)]
        user: i64,
    },

    /// Show a user's lifetime statistics
    Stats {
        /// User id
        #[arg(long)]
        user: i64,
    },
}
