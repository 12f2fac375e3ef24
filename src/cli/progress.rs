//! Progress display for install attempts
//!
//! Drives an indicatif bar from the downloader's aggregate progress
//! accessor, polling at a fixed interval until the attempt completes or
//! fails. Suppressed in quiet mode and when stderr is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::Downloader;
use crate::constants::progress;

/// Terminal progress display for one install attempt
pub struct ProgressDisplay {
    enabled: bool,
}

impl ProgressDisplay {
    /// Create a display; disabled displays are inert
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether a progress bar makes sense for this invocation
    pub fn should_enable(quiet: bool) -> bool {
        !quiet && atty::is(atty::Stream::Stderr)
    }

    /// Follow the attempt until it completes or fails
    ///
    /// Returns once the completion signal settles; the caller still awaits
    /// the signal itself for the actual result.
    pub async fn run(&self, downloader: &Downloader) {
        if !self.enabled {
            let _ = downloader.completion().await;
            return;
        }

        let bar = ProgressBar::new(progress::BAR_SCALE);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut named = false;
        let mut ticker = tokio::time::interval(progress::POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let fraction = downloader.progress().clamp(0.0, 1.0);
                    bar.set_position((fraction * progress::BAR_SCALE as f64) as u64);

                    if !named {
                        if let Some(Ok(metadata)) = downloader.try_metadata() {
                            bar.set_message(metadata.name.clone());
                            named = true;
                        }
                    }
                }
                result = downloader.completion() => {
                    match result {
                        Ok(_) => {
                            bar.set_position(progress::BAR_SCALE);
                            bar.finish();
                        }
                        Err(_) => bar.abandon(),
                    }
                    break;
                }
            }
        }
    }
}
