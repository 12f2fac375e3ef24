//! Asset transfers: streaming fetches and already-known content
//!
//! The downloader treats every asset, remote or already held, through the
//! single [`AssetFetch`] union, whose one capability is an awaitable result
//! with live fractional progress.

pub mod precomputed;
pub mod remote;
pub mod types;

pub use precomputed::PrecomputedTransfer;
pub use remote::Transfer;
pub use types::{AssetKind, ProgressCallback, TransferEvent, TransferPayload};

use crate::errors::TransferResult;

/// Either an in-flight network transfer or content already in memory
#[derive(Debug, Clone)]
pub enum AssetFetch {
    /// Content being fetched over the network
    Remote(Transfer),
    /// Content supplied by the caller
    Known(PrecomputedTransfer),
}

impl AssetFetch {
    /// Wrap already-held content
    pub fn known(payload: TransferPayload) -> Self {
        Self::Known(PrecomputedTransfer::new(payload))
    }

    /// Current fractional progress in [0, 1]
    pub fn progress(&self) -> f64 {
        match self {
            Self::Remote(transfer) => transfer.progress(),
            Self::Known(transfer) => transfer.progress(),
        }
    }

    /// Await the outcome
    ///
    /// # Errors
    ///
    /// Returns `TransferError` if a remote transfer failed or was aborted.
    pub async fn wait(&self) -> TransferResult<TransferPayload> {
        match self {
            Self::Remote(transfer) => transfer.wait().await,
            Self::Known(transfer) => transfer.wait().await,
        }
    }

    /// Whether this fetch goes over the network
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
