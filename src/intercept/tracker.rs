// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Aggregation of per-file progress bars into total byte counts.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::sync::resilient_lock;

/// Callback invoked with `(total_downloaded, total_size, filename)` on every
/// captured progress tick.
pub type ProgressCallback = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Per-file counters for one interception scope.
///
/// One mutex guards all of it: update ticks arrive from whichever thread the
/// download runs on, while other threads may be reading the aggregate.
#[derive(Default)]
struct TrackerState {
    /// Known total size per file
    file_sizes: HashMap<String, u64>,
    /// Bytes downloaded per file
    file_downloaded: HashMap<String, u64>,
    /// Last file that reported progress (best effort)
    current_filename: String,
    /// Live bar instances, keyed by instance id
    active_bars: HashMap<u64, String>,
}

/// Turns individual progress-bar updates into aggregate byte counts.
///
/// A file only contributes to the totals once its size is known; bars that
/// never report a total are excluded. Closing a bar stops its updates but
/// keeps its last known counters in the aggregate, since other files of the
/// same model may still be downloading.
pub struct DownloadTracker {
    state: Mutex<TrackerState>,
    callback: ProgressCallback,
}

impl DownloadTracker {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u64, u64, &str) + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(TrackerState::default()),
            callback: Box::new(callback),
        }
    }

    /// Register a live bar instance under its extracted filename.
    pub fn register_bar(&self, id: u64, filename: &str) {
        let mut state = resilient_lock(&self.state);
        if !filename.is_empty() {
            state.current_filename = filename.to_string();
        }
        state.active_bars.insert(id, filename.to_string());
    }

    /// Drop a bar instance from the active set. Its per-file counters are
    /// retained so the aggregate does not go backwards.
    pub fn deregister_bar(&self, id: u64) {
        let mut state = resilient_lock(&self.state);
        state.active_bars.remove(&id);
    }

    /// Record a `(position, total)` tick from a registered bar and invoke
    /// the callback with the recomputed aggregate.
    ///
    /// Ticks with an unknown total are ignored, and ticks from bars that are
    /// no longer registered are dropped.
    pub fn report(&self, id: u64, position: u64, total: u64) {
        if total == 0 {
            return;
        }

        let (downloaded, size, filename) = {
            let mut state = resilient_lock(&self.state);
            let Some(filename) = state.active_bars.get(&id).cloned() else {
                return;
            };
            state.file_sizes.insert(filename.clone(), total);
            state.file_downloaded.insert(filename.clone(), position);
            state.current_filename = filename.clone();
            (
                state.file_downloaded.values().sum::<u64>(),
                state.file_sizes.values().sum::<u64>(),
                filename,
            )
        };

        // Callback runs outside the lock; it may take its own locks
        (self.callback)(downloaded, size, &filename);
    }

    /// Current `(total_downloaded, total_size)` aggregate.
    pub fn totals(&self) -> (u64, u64) {
        let state = resilient_lock(&self.state);
        (
            state.file_downloaded.values().sum(),
            state.file_sizes.values().sum(),
        )
    }

    /// The file that most recently contributed progress.
    pub fn current_filename(&self) -> String {
        resilient_lock(&self.state).current_filename.clone()
    }

    /// Number of live bar instances.
    pub fn active_bar_count(&self) -> usize {
        resilient_lock(&self.state).active_bars.len()
    }
}

/// Extract a filename from a bar description.
///
/// Hub-style descriptions look like "model.safetensors: 45%"; the text before
/// the first `:` is the filename. Descriptions without a separator are used
/// whole, and an empty description falls back to "unknown".
pub fn filename_from_description(description: &str) -> String {
    let name = match description.split_once(':') {
        Some((before, _)) => before.trim(),
        None => description.trim(),
    };
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name.to_string()
    }
}
