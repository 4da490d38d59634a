// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::error::FeedError;

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<Url>,
    pub feed_url: Url,
    /// Entries in feed order (newest first for most feeds)
    pub episodes: Vec<Episode>,
}

/// Represents a single feed entry
#[derive(Debug, Clone)]
pub struct Episode {
    pub title: String,
    pub description: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    /// Publication date exactly as it appeared in the feed
    pub published_raw: Option<String>,
    pub enclosures: Vec<Enclosure>,
}

/// A downloadable media link attached to an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Url,
    pub mime_type: Option<String>,
}

impl Enclosure {
    /// Whether the declared content type is audio
    pub fn is_audio(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.trim().to_ascii_lowercase().starts_with("audio/"))
    }
}

impl Episode {
    /// The first enclosure declaring an `audio/` content type
    pub fn audio_enclosure(&self) -> Option<&Enclosure> {
        self.enclosures.iter().find(|enclosure| enclosure.is_audio())
    }

    /// Publication date for display: the feed's own string, or the parsed date
    pub fn published_display(&self) -> Option<String> {
        self.published_raw
            .clone()
            .filter(|raw| !raw.trim().is_empty())
            .or_else(|| self.published.map(|dt| dt.to_rfc2822()))
    }
}

/// Parse RSS feed XML bytes into a Podcast struct
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let episodes = channel.items().iter().map(parse_episode).collect();

    Ok(Podcast {
        title: channel.title().trim().to_string(),
        description: Some(channel.description().trim().to_string()).filter(|s| !s.is_empty()),
        link: Url::parse(channel.link()).ok(),
        feed_url,
        episodes,
    })
}

fn parse_episode(item: &rss::Item) -> Episode {
    let title = item
        .title()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let published_raw = item.pub_date().map(|d| d.trim().to_string());
    let published = published_raw.as_deref().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str)
            .ok()
            .or_else(|| parse_relaxed_date(date_str))
    });

    Episode {
        enclosures: collect_enclosures(item, &title),
        title,
        description: item.description().map(String::from),
        published,
        published_raw,
    }
}

/// Gather the `<enclosure>` element and any `media:content` links, in that order
fn collect_enclosures(item: &rss::Item, title: &str) -> Vec<Enclosure> {
    let mut candidates: Vec<(String, Option<String>)> = Vec::new();

    if let Some(enclosure) = item.enclosure() {
        candidates.push((
            enclosure.url().to_string(),
            Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
        ));
    }

    if let Some(contents) = item.extensions().get("media").and_then(|m| m.get("content")) {
        for content in contents {
            if let Some(url) = content.attrs().get("url") {
                candidates.push((url.clone(), content.attrs().get("type").cloned()));
            }
        }
    }

    candidates
        .into_iter()
        .filter_map(|(url, mime_type)| match Url::parse(&url) {
            Ok(url) => Some(Enclosure { url, mime_type }),
            Err(e) => {
                tracing::warn!(
                    episode = title,
                    url = %url,
                    error = %e,
                    "ignoring enclosure with invalid URL"
                );
                None
            }
        })
        .collect()
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
}
