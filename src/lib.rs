// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! vocalis - Local voice generation server core
//!
//! The progress-tracking heart of a local voice-generation service: it
//! bridges blocking, callback-driven model downloads running on worker
//! threads into live event streams consumed by HTTP clients.
//!
//! **TrackedBar** -> **DownloadTracker** -> **ProgressStore** -> **SSE subscribers**
//!
//! # Core Modules
//!
//! - [`intercept`] - Captures third-party progress-bar updates and aggregates
//!   per-file counters into total byte counts
//! - [`progress`] - Authoritative per-model progress records with bounded
//!   fan-out to an arbitrary number of live subscribers
//! - [`server`] - HTTP API exposing progress queries and event streams
//! - [`sync`] - Poison-recovering lock helpers shared by the above

pub mod intercept;
pub mod progress;
pub mod server;
pub mod sync;

// Re-export commonly used types from the progress module
pub use progress::{DownloadStatus, ProgressFrame, ProgressRecord, ProgressStore};

// Re-export the interception entry points
pub use intercept::{begin_interception, BarOptions, DownloadTracker, InterceptScope, TrackedBar};

// Re-export the server
pub use server::Server;
