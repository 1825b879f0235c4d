// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Authoritative store of download progress and fan-out hub for subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_stream::stream;
use chrono::Utc;
use futures_util::Stream;
use once_cell::sync::Lazy;
use tokio::sync::mpsc;

use crate::sync::{resilient_lock, resilient_read, resilient_write};
use super::types::{DownloadStatus, ProgressFrame, ProgressRecord};

/// How long a subscriber waits for a mailbox entry before emitting a
/// heartbeat frame to keep the transport alive.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound for subscriber mailboxes. A slow subscriber whose mailbox
/// fills simply misses updates until it drains; the depth is a tunable, not
/// a contract.
pub const DEFAULT_MAILBOX_DEPTH: usize = 10;

/// A bounded per-subscriber queue of record snapshots.
struct Mailbox {
    id: u64,
    tx: mpsc::Sender<ProgressRecord>,
}

/// All state for one model name: the latest record plus the live mailboxes.
/// One mutex per model, so updates for different models never contend.
#[derive(Default)]
struct ResourceEntry {
    record: Option<ProgressRecord>,
    mailboxes: Vec<Mailbox>,
}

/// Removes a subscriber's mailbox when its stream is dropped, whatever the
/// cause: terminal record, client disconnect, or task cancellation.
struct MailboxGuard {
    entry: Arc<Mutex<ResourceEntry>>,
    id: u64,
}

impl Drop for MailboxGuard {
    fn drop(&mut self) {
        let mut entry = resilient_lock(&self.entry);
        entry.mailboxes.retain(|mailbox| mailbox.id != self.id);
    }
}

/// Tracks download progress for every model and distributes updates to live
/// subscribers.
///
/// `update_progress` is a plain synchronous call, safe to invoke from the
/// worker threads that run blocking download code; it never waits on a
/// subscriber. `subscribe` is the only suspension point, and it suspends
/// only the consuming task.
pub struct ProgressStore {
    entries: RwLock<HashMap<String, Arc<Mutex<ResourceEntry>>>>,
    mailbox_depth: usize,
    mailbox_seq: AtomicU64,
}

static GLOBAL_STORE: Lazy<Arc<ProgressStore>> = Lazy::new(|| Arc::new(ProgressStore::new()));

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    /// Create a store with the default mailbox depth.
    pub fn new() -> Self {
        Self::with_mailbox_depth(DEFAULT_MAILBOX_DEPTH)
    }

    /// Create a store with a custom mailbox depth.
    pub fn with_mailbox_depth(mailbox_depth: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            mailbox_depth,
            mailbox_seq: AtomicU64::new(0),
        }
    }

    /// The process-wide store, created lazily on first access.
    pub fn global() -> Arc<ProgressStore> {
        Arc::clone(&GLOBAL_STORE)
    }

    /// Record a progress tick for a model and fan it out to subscribers.
    ///
    /// This is the sole ingestion point: the interceptor callback and any
    /// other download-driving code report through here. A call after a
    /// terminal record starts a fresh session for the same model name.
    pub fn update_progress(
        &self,
        model_name: &str,
        current: u64,
        total: u64,
        filename: &str,
        status: DownloadStatus,
    ) {
        let record = ProgressRecord::new(model_name, current, total, filename, status);
        tracing::debug!(
            target: "vocalis::progress",
            model = model_name,
            "progress {} ({:.1}%)",
            record.bytes_string(),
            record.progress,
        );

        let entry = self.entry(model_name);
        let mut entry = resilient_lock(&entry);
        Self::broadcast(&mut entry, record);
    }

    /// Get the latest record for a model, if a download was ever recorded.
    pub fn get_progress(&self, model_name: &str) -> Option<ProgressRecord> {
        let entry = self.lookup(model_name)?;
        let entry = resilient_lock(&entry);
        entry.record.clone()
    }

    /// Get every record still in flight (downloading or extracting).
    pub fn get_all_active(&self) -> Vec<ProgressRecord> {
        let entries = resilient_read(&self.entries);
        entries
            .values()
            .filter_map(|entry| {
                let entry = resilient_lock(entry);
                entry
                    .record
                    .as_ref()
                    .filter(|record| record.status.is_active())
                    .cloned()
            })
            .collect()
    }

    /// Mark a model's download as complete and broadcast the final record.
    ///
    /// No-op when no download was ever recorded for the model.
    pub fn mark_complete(&self, model_name: &str) {
        let Some(entry) = self.lookup(model_name) else {
            return;
        };
        let mut entry = resilient_lock(&entry);
        let Some(mut record) = entry.record.clone() else {
            return;
        };
        record.status = DownloadStatus::Complete;
        record.progress = 100.0;
        record.timestamp = Utc::now();
        tracing::info!(target: "vocalis::progress", model = model_name, "download complete");
        Self::broadcast(&mut entry, record);
    }

    /// Mark a model's download as failed and broadcast the final record.
    ///
    /// No-op when no download was ever recorded for the model.
    pub fn mark_error(&self, model_name: &str, message: impl Into<String>) {
        let Some(entry) = self.lookup(model_name) else {
            return;
        };
        let mut entry = resilient_lock(&entry);
        let Some(mut record) = entry.record.clone() else {
            return;
        };
        let message = message.into();
        tracing::warn!(
            target: "vocalis::progress",
            model = model_name,
            "download failed: {}",
            message
        );
        record.status = DownloadStatus::Error;
        record.error = Some(message);
        record.timestamp = Utc::now();
        Self::broadcast(&mut entry, record);
    }

    /// Subscribe to progress updates for a model.
    ///
    /// The stream yields the current record immediately if one exists, then
    /// every subsequent update, with heartbeat frames during idle stretches.
    /// It ends after yielding a record whose status is terminal. Dropping the
    /// stream at any point deregisters the mailbox.
    pub fn subscribe(&self, model_name: &str) -> impl Stream<Item = ProgressFrame> + Send + 'static {
        let entry = self.entry(model_name);
        let (tx, mut rx) = mpsc::channel(self.mailbox_depth);
        let id = self.mailbox_seq.fetch_add(1, Ordering::Relaxed);

        // Register the mailbox and snapshot the current record in one
        // critical section, so no update can fall between the two.
        let initial = {
            let mut entry_guard = resilient_lock(&entry);
            entry_guard.mailboxes.push(Mailbox { id, tx });
            entry_guard.record.clone()
        };
        let guard = MailboxGuard { entry, id };

        stream! {
            let _guard = guard;
            let mut done = false;

            if let Some(record) = initial {
                done = record.status.is_terminal();
                yield ProgressFrame::Record(record);
            }

            while !done {
                match tokio::time::timeout(HEARTBEAT_TIMEOUT, rx.recv()).await {
                    Ok(Some(record)) => {
                        done = record.status.is_terminal();
                        yield ProgressFrame::Record(record);
                    }
                    // Sender side gone; nothing more will arrive
                    Ok(None) => break,
                    Err(_) => yield ProgressFrame::Heartbeat,
                }
            }
        }
    }

    /// Number of live subscriber mailboxes for a model.
    pub fn subscriber_count(&self, model_name: &str) -> usize {
        self.lookup(model_name)
            .map(|entry| resilient_lock(&entry).mailboxes.len())
            .unwrap_or(0)
    }

    /// Build a `(downloaded, total, filename)` callback that reports into
    /// this store under the given model name. Ticks with an unknown total
    /// are skipped.
    pub fn progress_callback(
        self: &Arc<Self>,
        model_name: impl Into<String>,
    ) -> impl Fn(u64, u64, &str) + Send + Sync + 'static {
        let store = Arc::clone(self);
        let model_name = model_name.into();
        move |downloaded, total, filename| {
            if total > 0 {
                store.update_progress(
                    &model_name,
                    downloaded,
                    total,
                    filename,
                    DownloadStatus::Downloading,
                );
            }
        }
    }

    /// Overwrite the stored record and push a copy into every live mailbox.
    /// Pushes never block: a full mailbox drops the update for that one
    /// subscriber, who will pick up the next one instead.
    fn broadcast(entry: &mut ResourceEntry, record: ProgressRecord) {
        for mailbox in &entry.mailboxes {
            if mailbox.tx.try_send(record.clone()).is_err() {
                tracing::trace!(
                    target: "vocalis::progress",
                    model = %record.model_name,
                    "subscriber mailbox full, dropping update"
                );
            }
        }
        entry.record = Some(record);
    }

    /// Get the entry for a model, creating it if needed.
    fn entry(&self, model_name: &str) -> Arc<Mutex<ResourceEntry>> {
        if let Some(entry) = resilient_read(&self.entries).get(model_name) {
            return Arc::clone(entry);
        }
        let mut entries = resilient_write(&self.entries);
        Arc::clone(
            entries
                .entry(model_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ResourceEntry::default()))),
        )
    }

    /// Get the entry for a model without creating it.
    fn lookup(&self, model_name: &str) -> Option<Arc<Mutex<ResourceEntry>>> {
        resilient_read(&self.entries).get(model_name).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_stored_exactly() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 50, 100, "weights.bin", DownloadStatus::Downloading);

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.progress, 50.0);
        assert_eq!(record.current, 50);
        assert_eq!(record.total, 100);
        assert_eq!(record.filename, "weights.bin");
    }

    #[test]
    fn test_zero_total_means_zero_percent() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 500, 0, "weights.bin", DownloadStatus::Downloading);

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.progress, 0.0);
    }

    #[test]
    fn test_get_progress_unknown_model() {
        let store = ProgressStore::new();
        assert!(store.get_progress("never-downloaded").is_none());
    }

    #[test]
    fn test_update_overwrites_record() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 10, 100, "a.bin", DownloadStatus::Downloading);
        store.update_progress("modelA", 90, 100, "b.bin", DownloadStatus::Downloading);

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.current, 90);
        assert_eq!(record.filename, "b.bin");
    }

    #[test]
    fn test_get_all_active_filters_terminal() {
        let store = ProgressStore::new();
        store.update_progress("active", 10, 100, "a.bin", DownloadStatus::Downloading);
        store.update_progress("extracting", 100, 100, "b.tar", DownloadStatus::Extracting);
        store.update_progress("finished", 100, 100, "c.bin", DownloadStatus::Downloading);
        store.mark_complete("finished");
        store.update_progress("failed", 10, 100, "d.bin", DownloadStatus::Downloading);
        store.mark_error("failed", "network");

        let active = store.get_all_active();
        let mut names: Vec<_> = active.iter().map(|r| r.model_name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["active", "extracting"]);
    }

    #[test]
    fn test_mark_complete_forces_full_percent() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 73, 100, "weights.bin", DownloadStatus::Downloading);
        store.mark_complete("modelA");

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.status, DownloadStatus::Complete);
        assert_eq!(record.progress, 100.0);
    }

    #[test]
    fn test_mark_error_attaches_message() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 10, 100, "weights.bin", DownloadStatus::Downloading);
        store.mark_error("modelA", "connection reset");

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.status, DownloadStatus::Error);
        assert_eq!(record.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_mark_without_record_is_noop() {
        let store = ProgressStore::new();
        store.mark_complete("ghost");
        store.mark_error("ghost", "nope");
        assert!(store.get_progress("ghost").is_none());
    }

    #[test]
    fn test_new_session_supersedes_terminal_record() {
        let store = ProgressStore::new();
        store.update_progress("modelA", 100, 100, "weights.bin", DownloadStatus::Downloading);
        store.mark_error("modelA", "flaky network");

        // A retry by the orchestrator starts a fresh session
        store.update_progress("modelA", 5, 100, "weights.bin", DownloadStatus::Downloading);
        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.status, DownloadStatus::Downloading);
        assert!(record.error.is_none());
        assert_eq!(record.current, 5);
    }

    #[test]
    fn test_callback_reports_into_store() {
        let store = Arc::new(ProgressStore::new());
        let callback = store.progress_callback("modelA");

        callback(25, 200, "weights.bin");
        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.current, 25);
        assert_eq!(record.total, 200);

        // Unknown totals are skipped
        callback(30, 0, "weights.bin");
        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.current, 25);
    }

    #[test]
    fn test_callback_usable_from_worker_thread() {
        let store = Arc::new(ProgressStore::new());
        let callback = store.progress_callback("modelA");

        let handle = std::thread::spawn(move || {
            callback(64, 128, "weights.bin");
        });
        handle.join().unwrap();

        let record = store.get_progress("modelA").unwrap();
        assert_eq!(record.progress, 50.0);
    }
}
