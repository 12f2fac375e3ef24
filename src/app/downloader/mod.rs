//! Download orchestration for one install attempt
//!
//! The [`Downloader`] owns one attempt at installing a user script: it starts
//! the primary fetch, feeds every progress tick of the partially-received
//! script into the metadata extractor, and the moment metadata is available
//! fans out concurrent fetches for the icon, each dependency and each named
//! resource, substituting caller-supplied known content wherever the exact
//! URL is already held. Two outcomes are awaitable: metadata-available and
//! full completion. Any transfer failure, or a parse failure against the
//! complete script, fails the whole attempt; there is no partial bundle.
//!
//! # Examples
//!
//! ```rust,no_run
//! use userscript_fetcher::app::{Downloader, DownloadRequest, ScriptClient};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScriptClient::new()?;
//! let request = DownloadRequest::from_url(Url::parse("http://example.com/a.user.js")?);
//!
//! let downloader = Downloader::new(client, request);
//! downloader.start();
//!
//! let metadata = downloader.metadata().await?;
//! println!("Installing {} ({:.0}%)", metadata.name, downloader.progress() * 100.0);
//!
//! let bundle = downloader.completion().await?;
//! println!("{} dependencies fetched", bundle.requires.len());
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod fetches;

pub use bundle::{IconAsset, KnownAssets, RequiredScript, ResourceAsset, ScriptBundle};
pub use fetches::FetchSet;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::app::cell::WaitCell;
use crate::app::client::ScriptClient;
use crate::app::metadata::{self, ScriptMetadata};
use crate::app::registry::ScriptRegistry;
use crate::app::transfer::{
    AssetFetch, AssetKind, ProgressCallback, Transfer, TransferEvent, TransferPayload,
};
use crate::errors::{InstallError, InstallResult, Result};

/// Increments for every attempt created, so concurrent attempts are
/// distinguishable in logs and progress ticks.
static ATTEMPT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What the primary script fetch is driven from
#[derive(Debug, Clone)]
enum ScriptSource {
    /// Fetch the script from a URL
    Remote(Url),
    /// The caller already has the script text (editor save, paste)
    Inline {
        content: String,
        origin: Option<Url>,
    },
}

/// Parse progress over the growing primary content
///
/// An explicit state value stepped by the extractor's result, rather than
/// exception-driven control flow: `Unparsed` retries on the next chunk,
/// the other two states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsePhase {
    Unparsed,
    Parsed,
    Failed,
}

/// One progress notification forwarded to registered listeners
#[derive(Debug, Clone)]
pub struct ProgressTick {
    /// Attempt the tick belongs to
    pub attempt: u64,
    /// URL of the transfer that ticked
    pub url: Url,
    /// Bytes received so far on that transfer
    pub loaded: u64,
    /// Total bytes for that transfer, when known
    pub total: Option<u64>,
    /// Aggregate attempt progress at the time of the tick
    pub aggregate: f64,
}

/// Callback invoked on every child-fetch progress tick
pub type ProgressListener = Arc<dyn Fn(&ProgressTick) + Send + Sync + 'static>;

/// Input to one install attempt
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    script_url: Option<Url>,
    script_content: Option<String>,
    known: KnownAssets,
}

impl DownloadRequest {
    /// Install from a script URL
    pub fn from_url(url: Url) -> Self {
        Self {
            script_url: Some(url),
            ..Default::default()
        }
    }

    /// Install from script text the caller already holds
    ///
    /// Combine with [`with_origin`](Self::with_origin) so relative asset URLs
    /// in the header resolve the same way they would for a fetched script.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            script_content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Set the URL the inline content originally came from
    pub fn with_origin(mut self, url: Url) -> Self {
        self.script_url = Some(url);
        self
    }

    /// Supply already-held content keyed by URL
    pub fn with_known_assets(mut self, known: KnownAssets) -> Self {
        self.known = known;
        self
    }

    /// Supply known icon bytes for a URL
    pub fn with_known_icon(mut self, url: Url, content: Bytes) -> Self {
        self.known.icon = Some((url, content));
        self
    }

    /// Supply known dependency text by URL
    pub fn with_known_requires(mut self, requires: HashMap<Url, String>) -> Self {
        self.known.requires = requires;
        self
    }

    /// Supply known resource bytes by URL
    pub fn with_known_resources(mut self, resources: HashMap<Url, Bytes>) -> Self {
        self.known.resources = resources;
        self
    }
}

/// One install attempt
///
/// Cheap to clone; all clones observe the same attempt.
#[derive(Clone)]
pub struct Downloader {
    inner: Arc<DownloaderInner>,
}

struct DownloaderInner {
    id: u64,
    client: ScriptClient,
    source: Option<ScriptSource>,
    known: KnownAssets,
    fetches: RwLock<FetchSet>,
    parse: Mutex<ParsePhase>,
    metadata: WaitCell<InstallResult<ScriptMetadata>>,
    completion: WaitCell<InstallResult<Arc<ScriptBundle>>>,
    listeners: RwLock<Vec<ProgressListener>>,
    started: AtomicBool,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("id", &self.inner.id)
            .field("progress", &self.progress())
            .field("metadata_known", &self.inner.metadata.is_set())
            .field("completed", &self.inner.completion.is_set())
            .finish()
    }
}

impl Downloader {
    /// Create an attempt from a request
    ///
    /// Nothing is fetched until [`start`](Self::start) is called.
    pub fn new(client: ScriptClient, request: DownloadRequest) -> Self {
        let source = match (request.script_content, request.script_url) {
            (Some(content), origin) => Some(ScriptSource::Inline { content, origin }),
            (None, Some(url)) => Some(ScriptSource::Remote(url)),
            (None, None) => None,
        };

        let inner = Arc::new(DownloaderInner {
            id: ATTEMPT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1,
            client,
            source,
            known: request.known,
            fetches: RwLock::new(FetchSet::new()),
            parse: Mutex::new(ParsePhase::Unparsed),
            metadata: WaitCell::new(),
            completion: WaitCell::new(),
            listeners: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        });

        Self { inner }
    }

    /// Attempt identifier, unique within the process
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Begin the attempt
    ///
    /// Idempotent; only the first call has an effect. The primary fetch is
    /// issued immediately and the attempt runs to completion or failure on a
    /// background task.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(error) = DownloaderInner::run(&inner).await {
                DownloaderInner::fail(&inner, error);
            }
        });
    }

    /// Aggregate fractional progress in [0, 1]
    ///
    /// Recomputed from the currently-registered fetches on every call; safe
    /// to poll at any time, including before `start` (0.0). Before metadata
    /// is known this is simply the primary fetch's own progress.
    pub fn progress(&self) -> f64 {
        self.inner
            .fetches
            .read()
            .expect("fetch set lock poisoned")
            .aggregate_progress()
    }

    /// Read the metadata outcome without waiting, if it is available
    pub fn try_metadata(&self) -> Option<InstallResult<ScriptMetadata>> {
        self.inner.metadata.get().cloned()
    }

    /// Await the parsed script metadata
    ///
    /// Resolves as soon as the header parses, possibly long before the
    /// downloads finish, so callers can proceed with other work.
    ///
    /// # Errors
    ///
    /// Rejects with the attempt's failure if the primary transfer fails or
    /// the complete script cannot be parsed.
    pub async fn metadata(&self) -> InstallResult<ScriptMetadata> {
        self.inner.metadata.wait().await
    }

    /// Await the fully assembled bundle
    ///
    /// # Errors
    ///
    /// Rejects with the first transfer or parse failure of the attempt.
    pub async fn completion(&self) -> InstallResult<Arc<ScriptBundle>> {
        self.inner.completion.wait().await
    }

    /// Register a callback for every child-fetch progress tick
    pub fn add_progress_listener(&self, listener: ProgressListener) {
        self.inner
            .listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// Number of registered fetches that go over the network (primary
    /// excluded); diagnostic accessor
    pub fn remote_child_count(&self) -> usize {
        self.inner
            .fetches
            .read()
            .expect("fetch set lock poisoned")
            .remote_child_count()
    }

    /// Run the attempt to completion and hand the bundle to the registry
    ///
    /// Starts the attempt if the caller has not already. The orchestrator
    /// persists nothing itself; its responsibility ends at producing the
    /// in-memory bundle.
    ///
    /// # Errors
    ///
    /// Returns the attempt's failure, or the registry's conflict error.
    pub async fn install(&self, registry: &ScriptRegistry) -> Result<Uuid> {
        self.start();
        let metadata = self.metadata().await?;
        let bundle = self.completion().await?;
        let uuid = registry.install_from_download(&metadata, &bundle).await?;
        Ok(uuid)
    }
}

impl DownloaderInner {
    async fn run(inner: &Arc<Self>) -> InstallResult<()> {
        let source = inner.source.clone().ok_or(InstallError::NoSource)?;
        debug!("Install attempt {} starting", inner.id);

        // Primary script: inline content is complete by definition, so it
        // gets exactly one parse attempt; a fetched script is parsed on
        // every progress tick through the transfer callback.
        let script_fetch = match source {
            ScriptSource::Inline { content, origin } => {
                let fetch = AssetFetch::known(TransferPayload::from_text(content.clone()));
                inner
                    .fetches
                    .write()
                    .expect("fetch set lock poisoned")
                    .set_script(fetch.clone());

                let mut phase = inner.parse.lock().expect("parse lock poisoned");
                match metadata::extract_complete(&content, origin.as_ref()) {
                    Ok(parsed) => {
                        *phase = ParsePhase::Parsed;
                        Self::register_children(inner, &parsed);
                        inner.metadata.set(Ok(parsed));
                    }
                    Err(error) => {
                        *phase = ParsePhase::Failed;
                        return Err(error.into());
                    }
                }
                fetch
            }
            ScriptSource::Remote(url) => {
                // Construct and register under one write lock: the first
                // progress callback blocks on this lock, so the primary is
                // always in the set before any parse can run against it.
                let mut fetches = inner.fetches.write().expect("fetch set lock poisoned");
                let callback = Self::primary_callback(Arc::downgrade(inner));
                let transfer = Transfer::start(
                    inner.client.clone(),
                    url,
                    AssetKind::Text,
                    Some(callback),
                );
                let fetch = AssetFetch::Remote(transfer);
                fetches.set_script(fetch.clone());
                fetch
            }
        };

        // Child fetches are registered synchronously wherever the parse
        // succeeds, before the metadata signal publishes; once this wait
        // returns, every child already exists.
        let parsed = inner.metadata.wait().await?;
        info!(
            "Install attempt {}: metadata known for {:?} ({} requires, {} resources)",
            inner.id,
            parsed.name,
            parsed.require_urls.len(),
            parsed.resource_urls.len()
        );

        // Join everything; the first failure wins and rejects the attempt.
        // Transfers that fail afterwards still log their own diagnostics.
        let all = {
            let fetches = inner.fetches.read().expect("fetch set lock poisoned");
            fetches.all_fetches()
        };
        futures::future::try_join_all(all.iter().map(|fetch| fetch.wait())).await?;

        let bundle = Self::assemble(inner, &parsed, &script_fetch).await?;
        inner.completion.set(Ok(Arc::new(bundle)));
        info!("Install attempt {} downloads complete", inner.id);
        Ok(())
    }

    /// Register the icon, dependency and resource fetches for freshly
    /// parsed metadata
    ///
    /// Runs synchronously at the parse-success site, before the metadata
    /// signal publishes: an observer that sees metadata known also sees
    /// every child fetch registered. One fetch per distinct URL across all
    /// three roles; `KnownAssets` hits are served from memory.
    fn register_children(inner: &Arc<Self>, parsed: &ScriptMetadata) {
        let mut fetches = inner.fetches.write().expect("fetch set lock poisoned");

        if let Some(icon_url) = &parsed.icon_url {
            fetches.register_icon(icon_url.clone(), || {
                Self::child_fetch_for(inner, icon_url, AssetKind::Binary)
            });
        }
        for url in &parsed.require_urls {
            fetches.register_require(url.clone(), || {
                Self::child_fetch_for(inner, url, AssetKind::Text)
            });
        }
        for (name, url) in &parsed.resource_urls {
            fetches.register_resource(name.clone(), url.clone(), || {
                Self::child_fetch_for(inner, url, AssetKind::Binary)
            });
        }

        debug!(
            "Install attempt {}: {} child fetches registered ({} remote)",
            inner.id,
            fetches.all_fetches().len().saturating_sub(1),
            fetches.remote_child_count()
        );
    }

    /// Choose between known content and a real fetch for a child URL
    fn child_fetch_for(inner: &Arc<Self>, url: &Url, kind: AssetKind) -> AssetFetch {
        if let Some((known_url, content)) = &inner.known.icon {
            if known_url == url {
                return AssetFetch::known(TransferPayload::from_bytes(content.clone()));
            }
        }
        if let Some(text) = inner.known.requires.get(url) {
            return AssetFetch::known(TransferPayload::from_text(text.clone()));
        }
        if let Some(content) = inner.known.resources.get(url) {
            return AssetFetch::known(TransferPayload::from_bytes(content.clone()));
        }

        let callback = Self::child_callback(Arc::downgrade(inner));
        AssetFetch::Remote(Transfer::start(
            inner.client.clone(),
            url.clone(),
            kind,
            Some(callback),
        ))
    }

    /// Build the bundle once every fetch has succeeded
    ///
    /// Each `wait` here resolves immediately: the join in `run` already
    /// observed success for every registered fetch.
    async fn assemble(
        inner: &Arc<Self>,
        parsed: &ScriptMetadata,
        script_fetch: &AssetFetch,
    ) -> InstallResult<ScriptBundle> {
        let (icon_entry, require_entries, resource_entries) = {
            let fetches = inner.fetches.read().expect("fetch set lock poisoned");
            (
                fetches.icon_entry(),
                fetches.require_entries(),
                fetches.resource_entries(),
            )
        };

        let content = script_fetch.wait().await?.text();

        let icon = match icon_entry {
            Some((url, fetch)) => {
                let payload = fetch.wait().await?;
                Some(IconAsset {
                    url,
                    mime: payload.mime,
                    content: payload.content,
                })
            }
            None => None,
        };

        let mut requires = Vec::with_capacity(require_entries.len());
        for (url, fetch) in require_entries {
            let payload = fetch.wait().await?;
            requires.push(RequiredScript {
                url,
                content: payload.text(),
            });
        }

        let mut resources = HashMap::with_capacity(resource_entries.len());
        for (name, url, fetch) in resource_entries {
            let payload = fetch.wait().await?;
            resources.insert(
                name.clone(),
                ResourceAsset {
                    name,
                    url,
                    mime: payload.mime,
                    content: payload.content,
                },
            );
        }

        let source_url = match &inner.source {
            Some(ScriptSource::Remote(url)) => Some(url.clone()),
            Some(ScriptSource::Inline { origin, .. }) => origin.clone(),
            None => None,
        };

        Ok(ScriptBundle {
            source_url,
            content,
            icon,
            requires,
            resources,
        })
    }

    /// Reject both signals with the attempt's first failure
    ///
    /// Later calls are no-ops for signaling; the failure is reported once
    /// per attempt.
    fn fail(inner: &Arc<Self>, error: InstallError) {
        if inner.completion.is_set() && inner.metadata.is_set() {
            return;
        }
        warn!("Install attempt {} failed: {}", inner.id, error);
        inner.metadata.set(Err(error.clone()));
        inner.completion.set(Err(error));
    }

    /// Progress callback for the primary script transfer: attempt metadata
    /// extraction against the partial content, then notify listeners
    fn primary_callback(weak: Weak<Self>) -> ProgressCallback {
        Arc::new(move |transfer: &Transfer, event: &TransferEvent| {
            let Some(inner) = weak.upgrade() else { return };
            Self::observe_primary(&inner, transfer, event);
            Self::notify_listeners(&inner, event);
        })
    }

    /// Progress callback for child transfers: listeners only
    fn child_callback(weak: Weak<Self>) -> ProgressCallback {
        Arc::new(move |_transfer: &Transfer, event: &TransferEvent| {
            let Some(inner) = weak.upgrade() else { return };
            Self::notify_listeners(&inner, event);
        })
    }

    fn observe_primary(inner: &Arc<Self>, transfer: &Transfer, event: &TransferEvent) {
        let mut phase = inner.parse.lock().expect("parse lock poisoned");
        if *phase != ParsePhase::Unparsed {
            return;
        }

        let text = transfer.partial_text();
        let origin = Some(transfer.url());

        if event.completed {
            // Total order for the parse-vs-completion race: the final event
            // is the single point where "not yet" stops being an option.
            match metadata::extract_complete(&text, origin) {
                Ok(parsed) => {
                    *phase = ParsePhase::Parsed;
                    Self::register_children(inner, &parsed);
                    inner.metadata.set(Ok(parsed));
                }
                Err(error) => {
                    *phase = ParsePhase::Failed;
                    drop(phase);
                    Self::fail(inner, error.into());
                }
            }
        } else {
            match metadata::extract(&text, origin) {
                Ok(Some(parsed)) => {
                    *phase = ParsePhase::Parsed;
                    Self::register_children(inner, &parsed);
                    inner.metadata.set(Ok(parsed));
                }
                Ok(None) => {}
                Err(error) => {
                    // Recoverable: the header may complete differently as
                    // more bytes arrive.
                    debug!(
                        "Install attempt {}: partial content not yet parseable: {}",
                        inner.id, error
                    );
                }
            }
        }
    }

    fn notify_listeners(inner: &Arc<Self>, event: &TransferEvent) {
        let listeners = {
            let listeners = inner.listeners.read().expect("listener lock poisoned");
            listeners.clone()
        };
        if listeners.is_empty() {
            return;
        }

        let aggregate = {
            let fetches = inner.fetches.read().expect("fetch set lock poisoned");
            fetches.aggregate_progress()
        };

        let tick = ProgressTick {
            attempt: inner.id,
            url: event.url.clone(),
            loaded: event.loaded,
            total: event.total,
            aggregate,
        };
        for listener in &listeners {
            listener(&tick);
        }
    }
}
