// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod manifest;
pub mod naming;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::{Config, ConvertConfig, Preset, RunSettings};
pub use episode::{ChannelMode, ConvertSettings, FfmpegTranscoder, Transcoder};
pub use error::{
    ConfigError, ConvertError, DownloadError, FeedError, HttpError, ManifestError, SyncError,
};
pub use feed::{Enclosure, Episode, Podcast, fetch_feed, is_url, load_feed, parse_feed};
pub use http::{HttpClient, HttpConfig, HttpResponse, ReqwestClient};
pub use manifest::{CompletedSet, load_manifest, save_index, save_manifest};
pub use naming::{EpisodePlan, NamingOptions, PlannedEpisode, plan_episodes, shorten};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, TracingReporter,
};
pub use sync::{JobOutcome, JobState, SkipReason, SyncOptions, SyncResult, sync_podcast};
