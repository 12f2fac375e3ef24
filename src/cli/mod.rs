//! Command-line interface for Userscript Fetcher
//!
//! The module is organized into specialized components:
//!
//! - [`args`] - Argument parsing with clap
//! - [`commands`] - Command handlers
//! - [`progress`] - Terminal progress display

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, GlobalArgs, InstallArgs, ListArgs, ScriptRefArgs, ShowArgs, UpdateArgs};
pub use commands::{
    handle_install, handle_list, handle_set_enabled, handle_show, handle_uninstall, handle_update,
};
pub use progress::ProgressDisplay;
