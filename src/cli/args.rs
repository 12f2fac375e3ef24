//! Command-line argument parsing for Userscript Fetcher
//!
//! This module defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Userscript Fetcher - install user scripts with all their assets
#[derive(Parser, Debug)]
#[command(
    name = "userscript_fetcher",
    version,
    about = "Download and install user scripts together with their icons, dependencies and resources",
    long_about = "Installs a user script by streaming its body, discovering the icon, dependency and \
resource URLs from the partially-received header, and downloading everything concurrently."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Determine log level from verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "debug"
        } else if self.global.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Registry storage directory
    #[arg(long, global = true, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a user script from a URL or local file
    Install(InstallArgs),

    /// Re-download an installed script, reusing its stored assets
    Update(UpdateArgs),

    /// List installed scripts
    List(ListArgs),

    /// Show details of one installed script
    Show(ShowArgs),

    /// Enable an installed script
    Enable(ScriptRefArgs),

    /// Disable an installed script
    Disable(ScriptRefArgs),

    /// Remove an installed script
    Uninstall(ScriptRefArgs),
}

/// Arguments for the install command
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// URL of the script to install
    #[arg(value_name = "URL", required_unless_present = "file")]
    pub url: Option<String>,

    /// Install from a local file instead of fetching
    #[arg(short, long, value_name = "FILE", conflicts_with = "url")]
    pub file: Option<PathBuf>,

    /// Origin URL for resolving relative asset URLs of a local file
    #[arg(long, value_name = "URL", requires = "file")]
    pub origin: Option<String>,
}

/// Arguments for the update command
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// UUID or namespace/name of the installed script
    #[arg(value_name = "SCRIPT")]
    pub script: String,
}

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Include disabled scripts
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the show command
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// UUID or namespace/name of the installed script
    #[arg(value_name = "SCRIPT")]
    pub script: String,
}

/// Arguments referencing one installed script
#[derive(Args, Debug, Clone)]
pub struct ScriptRefArgs {
    /// UUID or namespace/name of the installed script
    #[arg(value_name = "SCRIPT")]
    pub script: String,
}
