// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::episode::{CONVERTING_SUFFIX, PARTIAL_SUFFIX};
use crate::manifest::{CompletedSet, load_manifest};
use crate::naming::EpisodePlan;

/// What a previous run left behind in the plan's directories
#[derive(Debug, Clone, Default)]
pub struct OutputState {
    /// Completion recorded in the manifests of every plan directory
    pub completed: CompletedSet,
    /// Planned episodes whose audio file already exists
    pub already_present: usize,
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
}

/// Scan the directories of `plan` below `output_dir`
///
/// Loads the manifests, counts planned files that already exist and removes
/// `.partial` / `.converting` leftovers from interrupted runs. Directories
/// are not created here; missing ones are simply empty.
pub fn scan_output_dirs(output_dir: &Path, plan: &EpisodePlan) -> OutputState {
    let mut state = OutputState::default();

    for directory in plan.directories() {
        let dir = output_dir.join(directory);

        for title in load_manifest(&dir).iter() {
            state.completed.insert(title);
        }
        state.partial_files_cleaned += clean_leftovers(&dir);
    }

    state.already_present = plan
        .entries
        .iter()
        .filter(|entry| output_dir.join(entry.relative_path()).is_file())
        .count();

    state
}

/// Remove leftover temporary files, returning how many were deleted
fn clean_leftovers(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            tracing::warn!(
                directory = %dir.display(),
                error = %e,
                "could not scan directory for leftovers"
            );
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_leftover = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.ends_with(PARTIAL_SUFFIX) || name.ends_with(CONVERTING_SUFFIX)
            });

        if is_leftover && path.is_file() && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    removed
}
