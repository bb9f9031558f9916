//! CLI argument parsing for the promo daemon.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Promo Radar Daemon
///
/// Watches group chats for promotions and notifies users whose tastes match.
#[derive(Parser, Debug)]
#[command(name = "promo-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/promo-radar/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline over inbound messages read from stdin, one JSON
    /// object per line
    Start,

    /// Run a single message through the pipeline
    Process {
        /// External id of the group the message came from
        #[arg(long)]
        from: String,

        /// Message text
        message: String,

        /// Image file to forward with notifications
        #[arg(long)]
        image: Option<String>,

        /// MIME type of the image
        #[arg(long, default_value = "image/jpeg")]
        mime_type: String,
    },

    /// Manage notification recipients
    #[command(subcommand)]
    User(UserCommands),

    /// Manage monitored groups
    #[command(subcommand)]
    Group(GroupCommands),

    /// Manage user tastes
    #[command(subcommand)]
    Taste(TasteCommands),

    /// Find users whose tastes resemble a label
    Search {
        label: String,

        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Minimum similarity (0.0-1.0), defaults to the configured threshold
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Check every external dependency
    Health,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommands {
    Add {
        name: String,
        /// Messaging address notifications are sent to
        phone: String,
    },

    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    List,

    /// Delete a user together with their tastes
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum GroupCommands {
    Add {
        external_id: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    Update {
        id: String,
        #[arg(long)]
        external_id: Option<String>,
        /// New description; an empty string clears it
        #[arg(short, long)]
        description: Option<String>,
    },

    List,

    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum TasteCommands {
    Add { user_id: String, label: String },

    List { user_id: String },

    Remove { user_id: String, taste_id: String },
}
