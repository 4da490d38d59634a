// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{ConfigError, ConvertError};

use super::download::with_suffix;

/// Suffix of files still being written by the transcoder
pub const CONVERTING_SUFFIX: &str = ".converting";

/// How the channels of the output are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    Mono,
    Stereo,
    JointStereo,
}

impl FromStr for ChannelMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(Self::Mono),
            "stereo" => Ok(Self::Stereo),
            "joint-stereo" | "joint_stereo" | "joint" => Ok(Self::JointStereo),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
            Self::JointStereo => "joint-stereo",
        })
    }
}

/// Target format for transcoded episodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSettings {
    pub mode: ChannelMode,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    /// Hard wall-clock limit for one transcoder invocation
    pub timeout: Duration,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            mode: ChannelMode::Mono,
            bitrate_kbps: 64,
            sample_rate_hz: 44_100,
            timeout: Duration::from_secs(600),
        }
    }
}

/// Audio transcoder abstraction
///
/// [`Transcoder::available`] is checked once per run; an unavailable
/// transcoder turns conversion into a no-op.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Whether the transcoder can be used on this host
    fn available(&self) -> bool;

    /// Transcode `input` into a new file at `output`
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConvertSettings,
    ) -> Result<(), ConvertError>;

    fn name(&self) -> &'static str;
}

/// Transcoder backed by the `ffmpeg` binary and its LAME encoder
pub struct FfmpegTranscoder {
    binary_path: Option<PathBuf>,
}

impl FfmpegTranscoder {
    /// Use an explicit ffmpeg binary
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path: Some(binary_path),
        }
    }

    /// Look for `ffmpeg` on PATH; the result is unavailable if it is missing
    pub fn from_path() -> Self {
        Self {
            binary_path: which::which("ffmpeg").ok(),
        }
    }

    fn arguments(
        input: &Path,
        output: &Path,
        settings: &ConvertSettings,
    ) -> Result<Vec<String>, ConvertError> {
        let input = input
            .to_str()
            .ok_or_else(|| ConvertError::InvalidPath(input.to_path_buf()))?;
        let output = output
            .to_str()
            .ok_or_else(|| ConvertError::InvalidPath(output.to_path_buf()))?;

        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            input,
            "-vn",
            "-codec:a",
            "libmp3lame",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        args.extend([
            "-b:a".to_string(),
            format!("{}k", settings.bitrate_kbps),
            "-ar".to_string(),
            settings.sample_rate_hz.to_string(),
        ]);

        match settings.mode {
            ChannelMode::Mono => args.extend(["-ac", "1"].map(String::from)),
            ChannelMode::Stereo => {
                args.extend(["-ac", "2", "-joint_stereo", "0"].map(String::from))
            }
            ChannelMode::JointStereo => {
                args.extend(["-ac", "2", "-joint_stereo", "1"].map(String::from))
            }
        }

        // The temporary output has no audio extension, so name the format
        args.extend(["-f", "mp3", output].map(String::from));

        Ok(args)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn available(&self) -> bool {
        self.binary_path.as_deref().is_some_and(Path::exists)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConvertSettings,
    ) -> Result<(), ConvertError> {
        let binary = self.binary_path.as_ref().ok_or(ConvertError::Unavailable)?;
        let args = Self::arguments(input, output, settings)?;

        let status = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| ConvertError::SpawnFailed {
                program: binary.display().to_string(),
                source: e,
            })?;

        if !status.success() {
            return Err(ConvertError::ExitStatus {
                program: self.name().to_string(),
                status: status.to_string(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Path of the in-progress transcoder output for `path`
pub fn converting_path(path: &Path) -> PathBuf {
    with_suffix(path, CONVERTING_SUFFIX)
}

/// Transcode `path` and replace it with the result
///
/// The transcoder writes to a temporary file that only replaces the original
/// on success. On failure or timeout the temporary file is removed and the
/// original stays untouched.
pub async fn convert_in_place(
    transcoder: &dyn Transcoder,
    path: &Path,
    settings: &ConvertSettings,
) -> Result<(), ConvertError> {
    let tmp = converting_path(path);

    let outcome =
        tokio::time::timeout(settings.timeout, transcoder.transcode(path, &tmp, settings)).await;

    let result = match outcome {
        Ok(Ok(())) => tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| ConvertError::ReplaceFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ConvertError::TimedOut(settings.timeout)),
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }

    result
}
