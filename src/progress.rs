// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use crate::sync::{JobState, SkipReason};

/// Events emitted during a run for progress reporting
///
/// Workers report concurrently, so implementations must write each event as
/// a whole (one line or one progress bar update) and never interleave.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched or read
    FetchingFeed { source: String },

    /// Feed has been parsed and the naming plan computed
    FeedParsed {
        podcast_title: String,
        total_entries: usize,
        planned: usize,
        already_present: usize,
    },

    /// Leftover files from an interrupted run were removed
    PartialFilesCleanedUp { count: usize },

    /// Conversion was requested but no transcoder is available
    ConversionUnavailable { transcoder: String },

    /// A job moved to a new state; `ordinal` identifies the episode
    JobStateChanged { ordinal: usize, state: JobState },

    /// An episode needed no download
    EpisodeSkipped {
        ordinal: usize,
        episode_title: String,
        reason: SkipReason,
    },

    /// A download is starting
    DownloadStarting {
        /// Identifies the worker slot (0 to parallel-1)
        worker_id: usize,
        episode_title: String,
        ordinal: usize,
        total: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        worker_id: usize,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed and was moved into place
    DownloadCompleted {
        worker_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed and its partial file was removed
    DownloadFailed {
        worker_id: usize,
        episode_title: String,
        error: String,
    },

    /// Transcoding of a finished download is starting
    ConversionStarting {
        worker_id: usize,
        episode_title: String,
    },

    ConversionCompleted {
        worker_id: usize,
        episode_title: String,
    },

    /// Transcoding failed; the original download was kept
    ConversionFailed {
        worker_id: usize,
        episode_title: String,
        error: String,
    },

    /// Manifest and index were regenerated in a directory
    ManifestWritten { directory: PathBuf },

    /// Run completed
    SyncCompleted {
        downloaded_count: usize,
        converted_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Reports every event as one `tracing` record
///
/// Used for quiet or non-interactive runs; the subscriber writes each record
/// as a single line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

impl ProgressReporter for TracingReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                tracing::info!(%source, "fetching feed");
            }
            ProgressEvent::FeedParsed {
                podcast_title,
                total_entries,
                planned,
                already_present,
            } => {
                tracing::info!(
                    podcast = %podcast_title,
                    total_entries,
                    planned,
                    already_present,
                    "feed parsed"
                );
            }
            ProgressEvent::PartialFilesCleanedUp { count } => {
                tracing::info!(count, "removed leftover partial files");
            }
            ProgressEvent::ConversionUnavailable { transcoder } => {
                tracing::warn!(%transcoder, "transcoder not available, keeping original audio");
            }
            ProgressEvent::JobStateChanged { ordinal, state } => {
                tracing::debug!(ordinal, ?state, "job state");
            }
            ProgressEvent::EpisodeSkipped {
                ordinal,
                episode_title,
                reason,
            } => {
                tracing::info!(ordinal, episode = %episode_title, %reason, "skipped");
            }
            ProgressEvent::DownloadStarting {
                worker_id,
                episode_title,
                ordinal,
                total,
                content_length,
            } => {
                tracing::info!(
                    worker_id,
                    ordinal,
                    total,
                    episode = %episode_title,
                    content_length,
                    "downloading"
                );
            }
            ProgressEvent::DownloadProgress {
                worker_id,
                bytes_downloaded,
                total_bytes,
            } => {
                tracing::trace!(worker_id, bytes_downloaded, total_bytes, "progress");
            }
            ProgressEvent::DownloadCompleted {
                worker_id,
                episode_title,
                bytes_downloaded,
            } => {
                tracing::info!(worker_id, episode = %episode_title, bytes_downloaded, "downloaded");
            }
            ProgressEvent::DownloadFailed {
                worker_id,
                episode_title,
                error,
            } => {
                tracing::warn!(worker_id, episode = %episode_title, %error, "download failed");
            }
            ProgressEvent::ConversionStarting {
                worker_id,
                episode_title,
            } => {
                tracing::info!(worker_id, episode = %episode_title, "converting");
            }
            ProgressEvent::ConversionCompleted {
                worker_id,
                episode_title,
            } => {
                tracing::info!(worker_id, episode = %episode_title, "converted");
            }
            ProgressEvent::ConversionFailed {
                worker_id,
                episode_title,
                error,
            } => {
                tracing::warn!(
                    worker_id,
                    episode = %episode_title,
                    %error,
                    "conversion failed, keeping original"
                );
            }
            ProgressEvent::ManifestWritten { directory } => {
                tracing::info!(directory = %directory.display(), "manifest written");
            }
            ProgressEvent::SyncCompleted {
                downloaded_count,
                converted_count,
                skipped_count,
                failed_count,
            } => {
                tracing::info!(
                    downloaded = downloaded_count,
                    converted = converted_count,
                    skipped = skipped_count,
                    failed = failed_count,
                    "run complete"
                );
            }
        }
    }
}
