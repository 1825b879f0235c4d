// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Download progress tracking and notification for vocalis
//!
//! This module bridges blocking downloads running on worker threads into the
//! async HTTP layer:
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Worker thread   │────▶│ ProgressStore   │
//! │ (interceptor    │     │ (latest record  │
//! │  callback)      │     │  per model)     │
//! └─────────────────┘     └────────┬────────┘
//!                                  │ bounded mailboxes
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ Subscribers     │
//!                         │ (SSE handlers)  │
//!                         └─────────────────┘
//! ```
//!
//! `update_progress` is synchronous and never blocks, so it is safe to call
//! from whichever thread the download runs on. Each subscriber gets its own
//! bounded mailbox; a slow subscriber misses updates rather than stalling
//! the producer or growing memory without bound.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vocalis::progress::{DownloadStatus, ProgressStore};
//!
//! let store = ProgressStore::global();
//! store.update_progress("qwen-tts-1.7B", 50, 100, "weights.bin", DownloadStatus::Downloading);
//! store.mark_complete("qwen-tts-1.7B");
//! ```

pub mod store;
pub mod types;

// Re-export commonly used items
pub use store::{ProgressStore, DEFAULT_MAILBOX_DEPTH};
pub use types::{format_bytes, percent, DownloadStatus, ProgressFrame, ProgressRecord};
