//! Userscript Fetcher CLI application
//!
//! Command-line interface for installing user scripts with concurrent asset
//! downloads, progress tracking, and an installed-script registry.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use userscript_fetcher::cli::{
    handle_install, handle_list, handle_set_enabled, handle_show, handle_uninstall,
    handle_update, Cli, Commands,
};
use userscript_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("Userscript Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Install(args) => handle_install(args, &cli.global).await,
        Commands::Update(args) => handle_update(args, &cli.global).await,
        Commands::List(args) => handle_list(args, &cli.global).await,
        Commands::Show(args) => handle_show(args, &cli.global).await,
        Commands::Enable(args) => handle_set_enabled(args, &cli.global, true).await,
        Commands::Disable(args) => handle_set_enabled(args, &cli.global, false).await,
        Commands::Uninstall(args) => handle_uninstall(args, &cli.global).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env().add_directive(
        format!("userscript_fetcher={}", log_level)
            .parse()
            .expect("static log directive is valid"),
    );

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
