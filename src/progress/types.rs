// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Progress types for model downloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a model download.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Bytes are being transferred
    Downloading,
    /// Archive extraction after transfer
    Extracting,
    /// Successfully completed
    Complete,
    /// Failed; the record carries the message
    Error,
}

impl DownloadStatus {
    /// Returns true if the download reached a final state (success or failure).
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Complete | DownloadStatus::Error)
    }

    /// Returns true if the download is still in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadStatus::Downloading | DownloadStatus::Extracting)
    }
}

/// Latest known state of one model's download.
///
/// The serialized form is the wire payload pushed to event-stream clients,
/// so the field names here are the API contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    /// Model this record tracks (e.g. "qwen-tts-1.7B", "whisper-base")
    pub model_name: String,
    /// Bytes downloaded so far
    pub current: u64,
    /// Total bytes expected
    pub total: u64,
    /// Derived percentage, 0 when the total is unknown
    pub progress: f64,
    /// File currently contributing progress (best effort, may lag)
    pub filename: String,
    /// Current status
    pub status: DownloadStatus,
    /// When this record was last mutated
    pub timestamp: DateTime<Utc>,
    /// Failure message, present only when status is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Create a record for a new progress tick.
    pub fn new(
        model_name: impl Into<String>,
        current: u64,
        total: u64,
        filename: impl Into<String>,
        status: DownloadStatus,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            current,
            total,
            progress: percent(current, total),
            filename: filename.into(),
            status,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// Get a formatted "12.3 MB / 456.7 MB" string for log output.
    pub fn bytes_string(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.current),
            format_bytes(self.total)
        )
    }
}

/// Percentage of `current` over `total`, defined as 0 when `total` is zero.
pub fn percent(current: u64, total: u64) -> f64 {
    if total > 0 {
        current as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format a byte count with a binary unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// One item of a subscriber's event stream: either a fresh record or a
/// keep-alive marker emitted during idle periods.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressFrame {
    /// A progress record snapshot
    Record(ProgressRecord),
    /// Idle keep-alive
    Heartbeat,
}

impl ProgressFrame {
    /// Render this frame as a `text/event-stream` chunk.
    ///
    /// Records become `data: <json>\n\n`; heartbeats become the SSE comment
    /// frame `: heartbeat\n\n`, which clients ignore but which keeps the
    /// connection from idling out.
    pub fn to_sse(&self) -> String {
        match self {
            ProgressFrame::Record(record) => match serde_json::to_string(record) {
                Ok(json) => format!("data: {}\n\n", json),
                Err(e) => {
                    // Skip the frame rather than corrupt the stream
                    tracing::error!(
                        target: "vocalis::progress",
                        model = %record.model_name,
                        "failed to serialize progress record: {}",
                        e
                    );
                    String::new()
                }
            },
            ProgressFrame::Heartbeat => ": heartbeat\n\n".to_string(),
        }
    }

    /// The record carried by this frame, if any.
    pub fn as_record(&self) -> Option<&ProgressRecord> {
        match self {
            ProgressFrame::Record(record) => Some(record),
            ProgressFrame::Heartbeat => None,
        }
    }
}
