// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Capture of third-party progress-bar updates during model downloads
//!
//! Model downloads drive one [`indicatif`] progress bar per file. This module
//! observes those bars without requiring cooperation from the code driving
//! them: while an interception scope is active, every [`TrackedBar`] created
//! in the process reports its `(position, total)` updates to a
//! [`DownloadTracker`], which aggregates per-file counters into a single
//! total and forwards it through a callback.
//!
//! ```text
//! ┌─────────────┐  update(n)  ┌─────────────────┐  (done, total, file)
//! │ TrackedBar  │────────────▶│ DownloadTracker │────────────────────▶ callback
//! │ (per file)  │             │ (per-file sums) │
//! └─────────────┘             └─────────────────┘
//! ```
//!
//! Entering a scope installs the tracker process-wide; dropping the scope
//! guarantees restoration of whatever was installed before, including across
//! panics. Without an active scope a `TrackedBar` degrades to a plain
//! terminal progress bar, so download code works unchanged either way.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vocalis::intercept::{begin_interception, TrackedBar};
//!
//! let scope = begin_interception(|downloaded, total, filename| {
//!     println!("{}: {}/{} bytes", filename, downloaded, total);
//! });
//!
//! let bar = TrackedBar::new(Some(1024), "weights.bin: downloading");
//! bar.inc(512);
//! bar.finish_and_clear();
//!
//! drop(scope); // original behavior restored
//! ```

pub mod bar;
pub mod scope;
pub mod tracker;

// Re-export commonly used items
pub use bar::{BarOptions, TrackedBar};
pub use scope::{begin_interception, current_tracker, InterceptScope};
pub use tracker::{filename_from_description, DownloadTracker, ProgressCallback};
