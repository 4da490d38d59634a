mod convert;
mod download;

pub use convert::{
    CONVERTING_SUFFIX, ChannelMode, ConvertSettings, FfmpegTranscoder, Transcoder,
    convert_in_place, converting_path,
};
pub use download::{DownloadContext, PARTIAL_SUFFIX, download_episode, partial_path};
