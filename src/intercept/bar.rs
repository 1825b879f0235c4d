// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Progress-bar wrapper that reports into the active interception scope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::scope::current_tracker;
use super::tracker::{filename_from_description, DownloadTracker};

static BAR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Presentation options for a [`TrackedBar`].
///
/// Callers hand these through from their own configuration; anything the
/// underlying bar cannot use is ignored rather than failing construction.
#[derive(Debug, Clone, Default)]
pub struct BarOptions {
    /// indicatif template string for terminal rendering. An invalid template
    /// falls back to the default style.
    pub style_template: Option<String>,
}

/// A progress bar for one file of a model download.
///
/// Download code constructs these wherever it would otherwise construct a
/// raw [`indicatif::ProgressBar`]. Outside an interception scope that is all
/// a `TrackedBar` is: a plain passthrough bar rendering to the terminal.
/// Inside a scope, the bar is created with a hidden draw target and every
/// position update is captured by the scope's [`DownloadTracker`] instead.
///
/// The filename the bar contributes under is extracted from its description,
/// using the text before the first `:` separator.
pub struct TrackedBar {
    bar: ProgressBar,
    tracker: Option<Arc<DownloadTracker>>,
    id: u64,
}

impl TrackedBar {
    /// Create a bar with default options. `total` may be unknown; such bars
    /// render as spinners and never contribute to aggregate totals.
    pub fn new(total: Option<u64>, description: impl Into<String>) -> Self {
        Self::with_options(total, description, BarOptions::default())
    }

    /// Create a bar with explicit presentation options.
    pub fn with_options(
        total: Option<u64>,
        description: impl Into<String>,
        options: BarOptions,
    ) -> Self {
        let description = description.into();
        let tracker = current_tracker();

        let bar = if tracker.is_some() {
            // Captured, not rendered
            ProgressBar::with_draw_target(total, ProgressDrawTarget::hidden())
        } else {
            match total {
                Some(len) => ProgressBar::new(len),
                None => ProgressBar::new_spinner(),
            }
        };

        if let Some(template) = &options.style_template {
            match ProgressStyle::with_template(template) {
                Ok(style) => bar.set_style(style),
                Err(e) => {
                    // Keep the default style rather than failing construction
                    tracing::debug!(
                        target: "vocalis::intercept",
                        "ignoring unusable bar template: {}",
                        e
                    );
                }
            }
        }
        bar.set_message(description.clone());

        let id = BAR_SEQ.fetch_add(1, Ordering::Relaxed);
        if let Some(tracker) = &tracker {
            tracker.register_bar(id, &filename_from_description(&description));
        }

        Self { bar, tracker, id }
    }

    /// Advance the bar by `delta` bytes.
    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
        self.report();
    }

    /// Set the absolute position in bytes.
    pub fn set_position(&self, position: u64) {
        self.bar.set_position(position);
        self.report();
    }

    /// Set the total length once it becomes known (e.g. from a late
    /// Content-Length header).
    pub fn set_length(&self, total: u64) {
        self.bar.set_length(total);
        self.report();
    }

    /// Current position in bytes.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish the bar and remove it from the terminal. Counters already
    /// reported stay in the scope's aggregate.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
        if let Some(tracker) = &self.tracker {
            tracker.deregister_bar(self.id);
        }
    }

    /// True when this bar reports into an interception scope.
    pub fn is_intercepted(&self) -> bool {
        self.tracker.is_some()
    }

    fn report(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.report(self.id, self.bar.position(), self.bar.length().unwrap_or(0));
        }
    }
}

impl Drop for TrackedBar {
    fn drop(&mut self) {
        // Deregistration is idempotent; finish_and_clear may have run already
        if let Some(tracker) = &self.tracker {
            tracker.deregister_bar(self.id);
        }
    }
}
