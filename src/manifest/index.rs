// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::ManifestError;
use crate::feed::Episode;
use crate::naming::PlannedEpisode;

use super::{ManifestHeader, write_atomic};

pub const INDEX_FILENAME: &str = "index.md";

const DESCRIPTION_MAX_CHARS: usize = 80;

/// Regenerate `dir/index.md`, a table mapping filenames back to episode metadata
pub fn save_index(
    dir: &Path,
    header: &ManifestHeader,
    entries: &[&PlannedEpisode],
) -> Result<(), ManifestError> {
    let content = render_index(header, entries);
    write_atomic(&dir.join(INDEX_FILENAME), &content)
}

fn render_index(header: &ManifestHeader, entries: &[&PlannedEpisode]) -> String {
    let mut content = String::new();

    let _ = writeln!(content, "# {} - Episode Index\n", header.title);
    let _ = writeln!(content, "**Feed URL:** {}\n", header.feed_url);
    let _ = writeln!(content, "**Generated:** {}\n", header.timestamp());
    let _ = writeln!(content, "| # | File | Title | Description | Date |");
    let _ = writeln!(content, "|---|------|-------|-------------|------|");

    for entry in entries {
        let episode = &entry.episode;
        let description = episode
            .description
            .as_deref()
            .map(summarize_description)
            .unwrap_or_default();

        let _ = writeln!(
            content,
            "| {} | {} | {} | {} | {} |",
            entry.ordinal,
            table_cell(&entry.filename),
            table_cell(&episode.title),
            table_cell(&description),
            table_cell(&simple_date(episode)),
        );
    }

    content
}

/// Plain-text excerpt of an HTML description, at most 80 characters
pub fn summarize_description(html: &str) -> String {
    let text = html_escape::decode_html_entities(&strip_tags(html)).into_owned();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() <= DESCRIPTION_MAX_CHARS {
        text
    } else {
        let cut: String = text.chars().take(DESCRIPTION_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    }
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tags often separate words (<br>, </p>)
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text
}

/// Keep table cells on one line and escape the column separator
fn table_cell(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

fn simple_date(episode: &Episode) -> String {
    match (&episode.published, &episode.published_raw) {
        (Some(date), _) => date.format("%Y-%m-%d").to_string(),
        (None, Some(raw)) => raw.clone(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Local, TimeZone};
    use tempfile::tempdir;

    use crate::naming::{NamingOptions, plan_episodes};

    fn header() -> ManifestHeader {
        ManifestHeader {
            title: "Test Podcast".to_string(),
            feed_url: "https://example.com/feed.xml".to_string(),
            description: None,
            generated_at: Local.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn summary_strips_html_and_decodes_entities() {
        assert_eq!(
            summarize_description("<p>Tom &amp; Jerry<br/>return</p>"),
            "Tom & Jerry return"
        );
    }

    #[test]
    fn summary_is_truncated_to_eighty_chars() {
        let long = "word ".repeat(40);
        let summary = summarize_description(&long);

        assert!(summary.chars().count() <= 80);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn table_cells_escape_pipes() {
        assert_eq!(table_cell("a | b\nc"), "a \\| b c");
    }

    #[test]
    fn index_has_one_row_per_entry() {
        let dir = tempdir().unwrap();
        let feed = vec![
            Episode {
                title: "Second | Part".to_string(),
                description: Some("<b>Bold</b> move".to_string()),
                published: DateTime::parse_from_rfc2822("Tue, 02 Jan 2024 12:00:00 +0000").ok(),
                published_raw: Some("Tue, 02 Jan 2024 12:00:00 +0000".to_string()),
                enclosures: vec![],
            },
            Episode {
                title: "First".to_string(),
                description: None,
                published: None,
                published_raw: Some("sometime".to_string()),
                enclosures: vec![],
            },
        ];
        let plan = plan_episodes("Pod", &feed, &NamingOptions::default());
        let entries: Vec<_> = plan.entries.iter().collect();

        save_index(dir.path(), &header(), &entries).unwrap();
        let content = std::fs::read_to_string(dir.path().join(INDEX_FILENAME)).unwrap();

        assert!(content.starts_with("# Test Podcast - Episode Index\n"));
        assert!(content.contains("**Generated:** 2024-02-01 09:30:00"));

        let rows: Vec<_> = content
            .lines()
            .filter(|l| l.starts_with("| ") && !l.starts_with("| #"))
            .collect();
        assert_eq!(
            rows,
            [
                "| 1 | 1_First.mp3 | First |  | sometime |",
                "| 2 | 2_Second_Part.mp3 | Second \\| Part | Bold move | 2024-01-02 |",
            ]
        );
    }
}
