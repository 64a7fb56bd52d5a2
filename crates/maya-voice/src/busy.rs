//! Busy flag: lets the UI disable triggers while a long action runs.
//!
//! The practice controller holds the flag while reference playback is being
//! fetched and while a recording is transcribed. The UI keeps a clone and
//! polls [`BusyFlag::is_busy`] to grey out its buttons.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared busy flag.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    /// Create a new flag (initially idle).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the owner busy, unless it already is.
    ///
    /// The flag is cleared when the returned guard is dropped.
    #[must_use]
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| {
                tracing::trace!("Busy flag set");
                BusyGuard {
                    busy: Arc::clone(&self.busy),
                }
            })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Clears the [`BusyFlag`] on drop.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
        tracing::trace!("Busy flag cleared");
    }
}
