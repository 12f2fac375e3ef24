//! Once-settable awaitable cell
//!
//! A small synchronization primitive around [`OnceLock`]: the cell starts
//! empty, any number of tasks can wait for a value, and the first `set` wakes
//! them all. Used for transfer outcomes and for the downloader's
//! metadata-available and completion signals.

use std::sync::OnceLock;

use tokio::sync::Notify;

/// A write-once cell whose value can be awaited.
///
/// `set` succeeds exactly once; later calls return `false` and leave the
/// stored value untouched. `wait` returns a clone of the value, whether it
/// was set before or after the wait began.
#[derive(Debug)]
pub struct WaitCell<T> {
    value: OnceLock<T>,
    notify: Notify,
}

impl<T> Default for WaitCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaitCell<T> {
    /// Constructs a new, empty cell.
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            notify: Notify::new(),
        }
    }

    /// Set the value, waking all current and future waiters.
    ///
    /// Returns `false` if the cell was already set.
    pub fn set(&self, value: T) -> bool {
        if self.value.set(value).is_err() {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Read the value without waiting, if it has been set.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Whether a value has been set.
    pub fn is_set(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: Clone> WaitCell<T> {
    /// Wait for the value to become available and return a clone of it.
    pub async fn wait(&self) -> T {
        loop {
            // Register interest before checking, so a set() racing with this
            // call cannot slip between the check and the await.
            let notified = self.notify.notified();
            if let Some(value) = self.value.get() {
                return value.clone();
            }
            notified.await;
        }
    }
}
