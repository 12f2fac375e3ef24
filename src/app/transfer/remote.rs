//! Streaming network transfer of one URL
//!
//! A [`Transfer`] issues its GET immediately on construction so several can
//! be started back-to-back without head-of-line stalling. The body is
//! accumulated chunk by chunk; every chunk updates the monotone progress
//! value and synchronously invokes the registered callback, which may read
//! the partial content. The eventual outcome is awaitable by any number of
//! waiters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, warn};
use url::Url;

use crate::app::cell::WaitCell;
use crate::app::client::ScriptClient;
use crate::errors::{TransferError, TransferResult};

use super::types::{AssetKind, ProgressCallback, TransferEvent, TransferPayload};

/// One in-flight (or finished) network transfer
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct Transfer {
    inner: Arc<TransferInner>,
}

struct TransferInner {
    url: Url,
    kind: AssetKind,
    /// f64 bits, updated monotonically by the transfer task only
    progress_bits: AtomicU64,
    /// Body received so far; drained into the payload once complete
    buffer: Mutex<Vec<u8>>,
    outcome: WaitCell<TransferResult<TransferPayload>>,
    aborted: AtomicBool,
    abort_notify: Notify,
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("url", &self.inner.url.as_str())
            .field("kind", &self.inner.kind)
            .field("progress", &self.progress())
            .field("finished", &self.inner.outcome.is_set())
            .finish()
    }
}

impl Transfer {
    /// Start fetching `url`, invoking `callback` on every received chunk
    ///
    /// The underlying request is issued immediately; there is no separate
    /// start step.
    pub fn start(
        client: ScriptClient,
        url: Url,
        kind: AssetKind,
        callback: Option<ProgressCallback>,
    ) -> Self {
        let inner = Arc::new(TransferInner {
            url,
            kind,
            progress_bits: AtomicU64::new(0f64.to_bits()),
            buffer: Mutex::new(Vec::new()),
            outcome: WaitCell::new(),
            aborted: AtomicBool::new(false),
            abort_notify: Notify::new(),
        });

        let task_inner = inner.clone();
        tokio::spawn(async move {
            let transfer = Transfer {
                inner: task_inner.clone(),
            };
            let result = transfer.run(&client, callback.as_ref()).await;
            if let Err(ref e) = result {
                warn!("Transfer failed: {}", e);
            } else {
                debug!("Transfer complete: {}", task_inner.url);
            }
            task_inner.outcome.set(result);
        });

        Self { inner }
    }

    /// The URL this transfer is fetching
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// How the body will be consumed
    pub fn kind(&self) -> AssetKind {
        self.inner.kind
    }

    /// Current fractional progress in [0, 1], monotone over time
    ///
    /// Held at 0 while the total size is unknown, snapped to 1 on completion.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.inner.progress_bits.load(Ordering::Acquire))
    }

    /// Lossy text view of the body received so far
    ///
    /// Safe to call from inside a progress callback; returns a consistent
    /// snapshot of the accumulated buffer.
    pub fn partial_text(&self) -> String {
        let buffer = self.inner.buffer.lock().expect("transfer buffer poisoned");
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Await the transfer outcome
    ///
    /// # Errors
    ///
    /// Returns the `TransferError` the transfer failed with, including abort.
    pub async fn wait(&self) -> TransferResult<TransferPayload> {
        self.inner.outcome.wait().await
    }

    /// Abort the transfer
    ///
    /// A no-op once the transfer has already finished.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.abort_notify.notify_one();
    }

    async fn run(
        &self,
        client: &ScriptClient,
        callback: Option<&ProgressCallback>,
    ) -> TransferResult<TransferPayload> {
        let inner = &self.inner;

        if inner.aborted.load(Ordering::SeqCst) {
            return Err(self.aborted_error());
        }

        let mut response = tokio::select! {
            response = client.begin_get(&inner.url) => response?,
            _ = inner.abort_notify.notified() => return Err(self.aborted_error()),
        };

        let total = response.content_length();
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        loop {
            let chunk = tokio::select! {
                chunk = response.chunk() => {
                    chunk.map_err(|e| TransferError::request(&inner.url, &e))?
                }
                _ = inner.abort_notify.notified() => return Err(self.aborted_error()),
            };

            let Some(bytes) = chunk else { break };

            let loaded = {
                let mut buffer = inner.buffer.lock().expect("transfer buffer poisoned");
                buffer.extend_from_slice(&bytes);
                buffer.len() as u64
            };

            // Progress stays at 0 when the server did not declare a length;
            // it snaps to 1 once the body is complete.
            if let Some(total) = total {
                let fraction = if total == 0 {
                    1.0
                } else {
                    (loaded as f64 / total as f64).min(1.0)
                };
                inner.advance_progress(fraction);
            }

            self.emit(callback, loaded, total, false);
        }

        inner.advance_progress(1.0);
        let loaded = {
            let buffer = inner.buffer.lock().expect("transfer buffer poisoned");
            buffer.len() as u64
        };
        // The final event fires before the outcome resolves, so any observer
        // deciding on the complete content does so ahead of completion being
        // visible to waiters.
        self.emit(callback, loaded, total, true);

        let content = {
            let mut buffer = inner.buffer.lock().expect("transfer buffer poisoned");
            Bytes::from(std::mem::take(&mut *buffer))
        };

        Ok(TransferPayload { content, mime })
    }

    fn emit(
        &self,
        callback: Option<&ProgressCallback>,
        loaded: u64,
        total: Option<u64>,
        completed: bool,
    ) {
        if let Some(callback) = callback {
            let event = TransferEvent {
                url: self.inner.url.clone(),
                loaded,
                total,
                completed,
            };
            callback(self, &event);
        }
    }

    fn aborted_error(&self) -> TransferError {
        TransferError::Aborted {
            url: self.inner.url.to_string(),
        }
    }
}

impl TransferInner {
    /// Raise the progress value, never lowering it
    fn advance_progress(&self, fraction: f64) {
        let mut current = self.progress_bits.load(Ordering::Acquire);
        loop {
            if f64::from_bits(current) >= fraction {
                return;
            }
            match self.progress_bits.compare_exchange_weak(
                current,
                fraction.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}
