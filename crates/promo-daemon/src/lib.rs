//! Promo daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Composition root and command implementations

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, GroupCommands, TasteCommands, UserCommands};
pub use commands::{
    assemble, build_app, handle_group, handle_health, handle_process, handle_search, handle_taste,
    handle_user, init_logging, load_settings, run_ingress, start_daemon, App, CollectionCheck,
    Providers,
};
