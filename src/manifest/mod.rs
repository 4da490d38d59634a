// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod index;
mod readme;

use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::ManifestError;
use crate::feed::Podcast;

pub use index::{INDEX_FILENAME, save_index, summarize_description};
pub use readme::{CompletedSet, MANIFEST_FILENAME, load_manifest, read_manifest, save_manifest};

/// Feed-level information printed at the top of the manifest and index
#[derive(Debug, Clone)]
pub struct ManifestHeader {
    pub title: String,
    pub feed_url: String,
    pub description: Option<String>,
    pub generated_at: DateTime<Local>,
}

impl ManifestHeader {
    /// Header for `podcast`, stamped with the current local time
    pub fn from_podcast(podcast: &Podcast) -> Self {
        Self {
            title: podcast.title.clone(),
            feed_url: podcast.feed_url.to_string(),
            description: podcast.description.clone(),
            generated_at: Local::now(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Replace `path` with `content` without ever exposing a half-written file
fn write_atomic(path: &Path, content: &str) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::CreateDirectoryFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = std::fs::write(&tmp_path, content).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}
