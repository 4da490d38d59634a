mod plan;
mod sanitize;

pub use plan::{
    AUDIO_EXTENSION, DEFAULT_BATCH_SIZE, EpisodePlan, NamingOptions, PlannedEpisode, index_width,
    plan_episodes, podcast_dir_name,
};
pub use sanitize::{CleanOptions, ShortenBudget, clean, fold_to_ascii, shorten};
