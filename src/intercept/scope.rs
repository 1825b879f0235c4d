// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Scoped installation of the process-wide interception hook.

use std::sync::{Arc, RwLock};

use crate::sync::{resilient_read, resilient_write};
use super::tracker::DownloadTracker;

/// The one process-wide hook slot consulted by [`TrackedBar`] construction.
///
/// [`TrackedBar`]: super::TrackedBar
static ACTIVE_TRACKER: RwLock<Option<Arc<DownloadTracker>>> = RwLock::new(None);

/// Install a tracker for the duration of the returned scope.
///
/// While the scope is alive, every [`TrackedBar`] created anywhere in the
/// process reports its updates to the tracker instead of rendering them.
/// Dropping the scope restores exactly the slot value that was installed
/// beforehand, on every exit path including panics, so interception never
/// leaks into unrelated downloads.
///
/// Scopes nest: an inner scope shadows the outer tracker and hands it back
/// on exit.
///
/// [`TrackedBar`]: super::TrackedBar
pub fn begin_interception<F>(callback: F) -> InterceptScope
where
    F: Fn(u64, u64, &str) + Send + Sync + 'static,
{
    let tracker = Arc::new(DownloadTracker::new(callback));
    let previous = {
        let mut slot = resilient_write(&ACTIVE_TRACKER);
        slot.replace(Arc::clone(&tracker))
    };
    tracing::debug!(target: "vocalis::intercept", "interception scope entered");
    InterceptScope { previous, tracker }
}

/// RAII guard for an active interception scope.
pub struct InterceptScope {
    previous: Option<Arc<DownloadTracker>>,
    tracker: Arc<DownloadTracker>,
}

impl InterceptScope {
    /// The tracker installed by this scope.
    pub fn tracker(&self) -> &Arc<DownloadTracker> {
        &self.tracker
    }
}

impl Drop for InterceptScope {
    fn drop(&mut self) {
        let mut slot = resilient_write(&ACTIVE_TRACKER);
        *slot = self.previous.take();
        tracing::debug!(target: "vocalis::intercept", "interception scope exited");
    }
}

/// The currently installed tracker, if any.
pub fn current_tracker() -> Option<Arc<DownloadTracker>> {
    resilient_read(&ACTIVE_TRACKER).clone()
}
