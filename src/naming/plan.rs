// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use crate::feed::Episode;

use super::sanitize::{CleanOptions, ShortenBudget, shorten};

/// Largest number of episodes placed in one directory before batching kicks in
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Extension of every planned audio file
pub const AUDIO_EXTENSION: &str = ".mp3";

const PODCAST_NAME_MAX_LENGTH: usize = 100;
const FALLBACK_PODCAST_NAME: &str = "podcast";

/// Options that shape the naming plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingOptions {
    /// Keep at most this many feed entries (the newest ones)
    pub limit: Option<usize>,
    /// Maximum filename length, extension included
    pub max_filename_length: Option<usize>,
    /// Episodes per directory once the retained set is larger than this
    pub batch_size: usize,
    /// Lower bound for the index width, for archives created with a fixed width
    pub min_index_width: usize,
    pub clean: CleanOptions,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            limit: None,
            max_filename_length: None,
            batch_size: DEFAULT_BATCH_SIZE,
            min_index_width: 1,
            clean: CleanOptions::default(),
        }
    }
}

/// Where a single episode goes on disk
#[derive(Debug, Clone)]
pub struct PlannedEpisode {
    /// 1-based chronological position, oldest first
    pub ordinal: usize,
    /// Batch number when the plan is split over several directories
    pub batch: Option<usize>,
    /// Number written in front of the filename
    pub index: usize,
    /// Directory name relative to the output base
    pub directory: String,
    pub filename: String,
    pub episode: Episode,
}

impl PlannedEpisode {
    /// Path of the audio file relative to the output base
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(&self.filename)
    }
}

/// The complete naming plan for one run, in chronological order
#[derive(Debug, Clone)]
pub struct EpisodePlan {
    pub podcast_name: String,
    pub entries: Vec<PlannedEpisode>,
}

impl EpisodePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct directory names, in the order they first appear
    pub fn directories(&self) -> Vec<&str> {
        let mut directories: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if directories.last() != Some(&entry.directory.as_str()) {
                directories.push(&entry.directory);
            }
        }
        directories
    }

    /// Entries placed in `directory`, in chronological order
    pub fn entries_in<'a>(
        &'a self,
        directory: &'a str,
    ) -> impl Iterator<Item = &'a PlannedEpisode> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.directory == directory)
    }
}

/// Filesystem-safe directory name for a podcast title
pub fn podcast_dir_name(title: &str, clean: &CleanOptions) -> String {
    let budget = ShortenBudget {
        max_total: PODCAST_NAME_MAX_LENGTH,
        prefix_len: 0,
        suffix_len: 0,
    };

    let name = shorten(title, Some(&budget), clean);
    if name.is_empty() {
        FALLBACK_PODCAST_NAME.to_string()
    } else {
        name
    }
}

/// Digits needed to print `max_index`, never less than `min_width`
pub fn index_width(max_index: usize, min_width: usize) -> usize {
    let digits = max_index.checked_ilog10().map_or(1, |log| log as usize + 1);
    digits.max(min_width).max(1)
}

/// Compute the directory and filename of every retained episode
///
/// `episodes` is in feed order (newest first). The first `limit` entries are
/// kept and reversed so that ordinal 1 is the oldest. Identical inputs always
/// produce identical plans.
pub fn plan_episodes(
    podcast_name: &str,
    episodes: &[Episode],
    options: &NamingOptions,
) -> EpisodePlan {
    let retained = &episodes[..options.limit.unwrap_or(usize::MAX).min(episodes.len())];
    let total = retained.len();
    let batch_size = options.batch_size.max(1);
    let batched = total > batch_size;
    let batch_label_width = index_width(total.div_ceil(batch_size).saturating_sub(1), 1);

    let entries = retained
        .iter()
        .rev()
        .enumerate()
        .map(|(position, episode)| {
            let ordinal = position + 1;

            let (batch, index, max_index, directory) = if batched {
                let batch = position / batch_size;
                let batch_len = batch_size.min(total - batch * batch_size);
                (
                    Some(batch),
                    position % batch_size,
                    batch_len - 1,
                    format!("{batch:0batch_label_width$}_{podcast_name}"),
                )
            } else {
                (None, ordinal, total, podcast_name.to_string())
            };

            let width = index_width(max_index, options.min_index_width);
            let prefix = format!("{index:0width$}_");
            let budget = options.max_filename_length.map(|max_total| ShortenBudget {
                max_total,
                prefix_len: prefix.len(),
                suffix_len: AUDIO_EXTENSION.len(),
            });
            let title = shorten(&episode.title, budget.as_ref(), &options.clean);

            PlannedEpisode {
                ordinal,
                batch,
                index,
                directory,
                filename: format!("{prefix}{title}{AUDIO_EXTENSION}"),
                episode: episode.clone(),
            }
        })
        .collect();

    EpisodePlan {
        podcast_name: podcast_name.to_string(),
        entries,
    }
}
