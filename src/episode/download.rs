// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Suffix of files still being written by a download
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Context for tracking a download in concurrent scenarios
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Worker slot (0 to parallel-1) for progress display
    pub worker_id: usize,
    /// Chronological position of the episode
    pub ordinal: usize,
    /// Number of episodes in the plan
    pub total: usize,
}

/// Path of the in-progress file for `output_path`
pub fn partial_path(output_path: &Path) -> PathBuf {
    with_suffix(output_path, PARTIAL_SUFFIX)
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Download `url` to `output_path`
///
/// The body is streamed into a `.partial` file that is renamed into place
/// once complete, so `output_path` only ever exists as a finished download.
/// On any error the partial file is removed. Returns the number of bytes
/// written.
pub async fn download_episode<C: HttpClient + ?Sized>(
    client: &C,
    episode_title: &str,
    url: &Url,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let partial = partial_path(output_path);

    let bytes_downloaded =
        match stream_to_file(client, episode_title, url, &partial, context, reporter).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

    if let Err(e) = tokio::fs::rename(&partial, output_path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(DownloadError::FinalizeFailed {
            from: partial,
            source: e,
        });
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        worker_id: context.worker_id,
        episode_title: episode_title.to_string(),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

async fn stream_to_file<C: HttpClient + ?Sized>(
    client: &C,
    episode_title: &str,
    url: &Url,
    partial: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url_str = url.as_str();

    let response = client
        .get_stream(url_str)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url_str.to_string(),
            source: e,
        })?;

    if !(200..300).contains(&response.status) {
        return Err(DownloadError::HttpStatus {
            url: url_str.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        worker_id: context.worker_id,
        episode_title: episode_title.to_string(),
        ordinal: context.ordinal,
        total: context.total,
        content_length: response.content_length,
    });

    let mut file = File::create(partial)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url_str.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            worker_id: context.worker_id,
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}
