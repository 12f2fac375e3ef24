//! Core application logic for Userscript Fetcher
//!
//! This module contains the main application components: the HTTP client,
//! asset transfers, script metadata extraction, the download orchestrator,
//! and the installed-script registry.
//!
//! # Examples
//!
//! ```rust,no_run
//! use userscript_fetcher::app::{DownloadRequest, Downloader, ScriptClient, ScriptRegistry};
//! use std::path::Path;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScriptClient::new()?;
//! let registry = ScriptRegistry::open(Path::new("/tmp/scripts")).await?;
//!
//! let request = DownloadRequest::from_url(Url::parse("http://example.com/a.user.js")?);
//! let downloader = Downloader::new(client, request);
//! let uuid = downloader.install(&registry).await?;
//! println!("installed {uuid}");
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod client;
pub mod downloader;
pub mod metadata;
pub mod registry;
pub mod transfer;

// Re-export main public API
pub use cell::WaitCell;
pub use client::{ClientConfig, ScriptClient};
pub use downloader::{
    DownloadRequest, Downloader, FetchSet, IconAsset, KnownAssets, ProgressListener,
    ProgressTick, RequiredScript, ResourceAsset, ScriptBundle,
};
pub use metadata::{extract, extract_complete, ScriptMetadata};
pub use registry::{ScriptRegistry, ScriptStore, UserScript};
pub use transfer::{
    AssetFetch, AssetKind, PrecomputedTransfer, Transfer, TransferEvent, TransferPayload,
};
