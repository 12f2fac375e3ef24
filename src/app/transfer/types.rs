//! Shared types for asset transfers

use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use super::remote::Transfer;

/// How a transferred body will be consumed
///
/// Dependencies are text; icons and resources are binary. The raw bytes are
/// kept either way, so one transfer can serve both roles when a URL is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Script text (the primary script and its dependencies)
    Text,
    /// Opaque bytes (icon and named resources)
    Binary,
}

/// One progress notification from an in-flight transfer
///
/// `completed` is true only on the single final event emitted after the last
/// body byte, before the transfer's result resolves. Observers use it to
/// decide whether a parse failure against the accumulated content is still
/// recoverable.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    /// URL of the transfer that ticked
    pub url: Url,
    /// Bytes received so far
    pub loaded: u64,
    /// Total bytes, when the server declared a content length
    pub total: Option<u64>,
    /// Whether this is the final event for the transfer
    pub completed: bool,
}

/// Successful result of a transfer
#[derive(Debug, Clone)]
pub struct TransferPayload {
    /// The complete body
    pub content: Bytes,
    /// Content-Type reported by the server, if any
    pub mime: Option<String>,
}

impl TransferPayload {
    /// Create a payload from already-held bytes
    pub fn from_bytes(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            mime: None,
        }
    }

    /// Create a payload from already-held text
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: Bytes::from(content.into().into_bytes()),
            mime: None,
        }
    }

    /// View the body as text
    ///
    /// Lossy by design: this mirrors how a text response is decoded by the
    /// platforms user scripts come from.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Callback invoked synchronously on every progress update of a transfer
pub type ProgressCallback = Arc<dyn Fn(&Transfer, &TransferEvent) + Send + Sync + 'static>;
