//! Prelude module for Userscript Fetcher Library
//!
//! Re-exports the most commonly used items from the library, so typical
//! integrations need only `use userscript_fetcher::prelude::*;`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use userscript_fetcher::prelude::*;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let client = ScriptClient::new()?;
//!     let registry = ScriptRegistry::open(Path::new("/tmp/scripts")).await?;
//!
//!     let request = DownloadRequest::from_url(Url::parse("http://example.com/a.user.js")?);
//!     let downloader = Downloader::new(client, request);
//!     let uuid = downloader.install(&registry).await?;
//!     println!("installed {uuid}");
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, InstallError, ParseError, Result, TransferError};

// Essential app components
pub use crate::app::{
    ClientConfig,
    DownloadRequest,
    // Core orchestration
    Downloader,
    KnownAssets,
    ProgressTick,
    ScriptBundle,
    ScriptClient,
    // Data types
    ScriptMetadata,
    // Storage
    ScriptRegistry,
    UserScript,
};

// Configuration
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
