// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::ManifestError;
use crate::feed::Episode;
use crate::naming::PlannedEpisode;

use super::{ManifestHeader, write_atomic};

pub const MANIFEST_FILENAME: &str = "README.md";

const EPISODES_HEADING: &str = "## Downloaded Episodes";
const DONE_MARKER: &str = "- [x] ";
const PENDING_MARKER: &str = "- [ ] ";

/// Titles of episodes recorded as completed
///
/// Lookup is by title text. Entries are stored either as the bare title or
/// in the rendered `title (published)` form read back from a manifest, and
/// both forms match. Two episodes sharing a title cannot be told apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedSet {
    entries: HashSet<String>,
}

impl CompletedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an episode with this title (and publication string) is completed
    pub fn contains(&self, title: &str, published: Option<&str>) -> bool {
        let title = normalize(title);
        self.entries.contains(&title)
            || published
                .map(|published| render_entry(&title, Some(published)))
                .is_some_and(|rendered| self.entries.contains(&rendered))
    }

    pub fn contains_episode(&self, episode: &Episode) -> bool {
        self.contains(&episode.title, episode.published_display().as_deref())
    }

    pub fn insert(&mut self, title: &str) {
        self.entries.insert(normalize(title));
    }

    /// Forget an episode in both of its stored forms
    pub fn remove_episode(&mut self, episode: &Episode) {
        let title = normalize(&episode.title);
        if let Some(published) = episode.published_display() {
            self.entries.remove(&render_entry(&title, Some(&published)));
        }
        self.entries.remove(&title);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for CompletedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for title in iter {
            set.insert(title.as_ref());
        }
        set
    }
}

/// Collapse internal whitespace so a title always fits on one checklist line
fn normalize(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_entry(title: &str, published: Option<&str>) -> String {
    match published.map(str::trim).filter(|p| !p.is_empty()) {
        Some(published) => format!("{title} ({})", normalize(published)),
        None => title.to_string(),
    }
}

/// Read the completed set from `dir/README.md`
pub fn read_manifest(dir: &Path) -> Result<CompletedSet, ManifestError> {
    let path = dir.join(MANIFEST_FILENAME);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ManifestError::ReadFailed { path, source: e })?;

    Ok(parse_manifest(&content))
}

/// Load the completed set, treating a missing or unreadable manifest as empty
pub fn load_manifest(dir: &Path) -> CompletedSet {
    match read_manifest(dir) {
        Ok(completed) => completed,
        Err(ManifestError::ReadFailed { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            CompletedSet::new()
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "ignoring unreadable manifest, starting from an empty state"
            );
            CompletedSet::new()
        }
    }
}

fn parse_manifest(content: &str) -> CompletedSet {
    // Only the checklist section counts, so a feed description that happens to
    // contain checklist syntax cannot mark anything as done.
    let lines: Vec<&str> = content.lines().collect();
    let checklist = match lines.iter().position(|l| l.trim() == EPISODES_HEADING) {
        Some(heading) => &lines[heading + 1..],
        None => &lines[..],
    };

    checklist
        .iter()
        .filter_map(|line| line.trim().strip_prefix(DONE_MARKER.trim_end()))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Regenerate `dir/README.md` listing every entry with its completion marker
pub fn save_manifest(
    dir: &Path,
    header: &ManifestHeader,
    entries: &[&PlannedEpisode],
    completed: &CompletedSet,
) -> Result<(), ManifestError> {
    let content = render_manifest(header, entries, completed);
    write_atomic(&dir.join(MANIFEST_FILENAME), &content)
}

fn render_manifest(
    header: &ManifestHeader,
    entries: &[&PlannedEpisode],
    completed: &CompletedSet,
) -> String {
    let mut content = String::new();

    let _ = writeln!(content, "# {}\n", header.title);
    let _ = writeln!(content, "**Feed URL:** {}\n", header.feed_url);
    let _ = writeln!(content, "**Last updated:** {}\n", header.timestamp());
    match header.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => {
            let _ = writeln!(content, "**Description:**\n\n{description}\n");
        }
        _ => {
            let _ = writeln!(content, "**Description:**\n");
        }
    }
    let _ = writeln!(content, "---\n");
    let _ = writeln!(content, "{EPISODES_HEADING}\n");

    for entry in entries {
        let episode = &entry.episode;
        let published = episode.published_display();
        let marker = if completed.contains(&episode.title, published.as_deref()) {
            DONE_MARKER
        } else {
            PENDING_MARKER
        };
        let _ = writeln!(
            content,
            "{marker}{}",
            render_entry(&normalize(&episode.title), published.as_deref())
        );
    }

    content
}
