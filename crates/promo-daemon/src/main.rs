//! Promo Radar Daemon
//!
//! Detects promotions in monitored group chats and notifies users whose
//! tastes match.
//!
//! # Usage
//!
//! ```bash
//! promo-daemon start < messages.jsonl
//! promo-daemon group add deals@g.us --description "Tech deals"
//! promo-daemon user add Alice 5511999990000
//! promo-daemon taste add <user-id> "mechanical keyboards"
//! promo-daemon search "keyboard"
//! promo-daemon health
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/promo-radar/config.toml)
//! 3. Environment variables (PROMO_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use promo_daemon::{
    build_app, handle_group, handle_health, handle_process, handle_search, handle_taste,
    handle_user, init_logging, load_settings, start_daemon, Cli, CollectionCheck, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    let check = match cli.command {
        Commands::Health => CollectionCheck::Skip,
        _ => CollectionCheck::Required,
    };
    let app = build_app(&settings, check).await?;

    match cli.command {
        Commands::Start => {
            start_daemon(app).await?;
        }
        Commands::Process {
            from,
            message,
            image,
            mime_type,
        } => {
            handle_process(&app, from, message, image, &mime_type).await?;
        }
        Commands::User(command) => {
            handle_user(&app, command).await?;
        }
        Commands::Group(command) => {
            handle_group(&app, command).await?;
        }
        Commands::Taste(command) => {
            handle_taste(&app, command).await?;
        }
        Commands::Search {
            label,
            limit,
            threshold,
        } => {
            handle_search(&app, &label, limit, threshold).await?;
        }
        Commands::Health => {
            handle_health(&app).await?;
        }
    }

    Ok(())
}
