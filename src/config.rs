// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration: an optional TOML file layered under command line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::episode::{ChannelMode, ConvertSettings};
use crate::error::ConfigError;
use crate::naming::{CleanOptions, DEFAULT_BATCH_SIZE, NamingOptions};
use crate::sync::{DEFAULT_EPISODE_LIMIT, DEFAULT_PARALLEL, SyncOptions};

/// Named transcoding profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Speech,
    Low,
    Medium,
    High,
}

impl Preset {
    /// Target format of the preset, with the default timeout
    pub fn settings(self) -> ConvertSettings {
        let (mode, bitrate_kbps, sample_rate_hz) = match self {
            Self::Speech => (ChannelMode::Mono, 32, 22_050),
            Self::Low => (ChannelMode::Mono, 48, 22_050),
            Self::Medium => (ChannelMode::JointStereo, 64, 44_100),
            Self::High => (ChannelMode::JointStereo, 128, 44_100),
        };

        ConvertSettings {
            mode,
            bitrate_kbps,
            sample_rate_hz,
            ..Default::default()
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speech" => Ok(Self::Speech),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// `[convert]` table of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub enabled: Option<bool>,
    pub preset: Option<Preset>,
    /// Kilobits per second
    pub bitrate: Option<u32>,
    /// Hertz
    pub sample_rate: Option<u32>,
    pub mode: Option<ChannelMode>,
    /// Seconds one transcoder invocation may run
    pub timeout: Option<u64>,
}

/// Every setting of a run, each one optional
///
/// The same shape is filled from the config file and from the command line;
/// [`Config::overlay`] puts one on top of the other and [`Config::resolve`]
/// fills the gaps with built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of feed entries to keep
    pub num: Option<usize>,
    /// Base output directory
    pub output: Option<PathBuf>,
    /// Maximum filename length in bytes, extension included
    pub max_length: Option<usize>,
    pub parallel: Option<usize>,
    pub batch_size: Option<usize>,
    pub min_index_width: Option<usize>,
    /// Transliterate accented Latin letters to ASCII
    pub fold_unicode: Option<bool>,
    pub convert: ConvertConfig,
}

/// Fully resolved configuration of a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output: PathBuf,
    pub sync: SyncOptions,
}

impl Config {
    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Values set in `top` win over values set in `self`
    pub fn overlay(self, top: Config) -> Config {
        Config {
            num: top.num.or(self.num),
            output: top.output.or(self.output),
            max_length: top.max_length.or(self.max_length),
            parallel: top.parallel.or(self.parallel),
            batch_size: top.batch_size.or(self.batch_size),
            min_index_width: top.min_index_width.or(self.min_index_width),
            fold_unicode: top.fold_unicode.or(self.fold_unicode),
            convert: ConvertConfig {
                enabled: top.convert.enabled.or(self.convert.enabled),
                preset: top.convert.preset.or(self.convert.preset),
                bitrate: top.convert.bitrate.or(self.convert.bitrate),
                sample_rate: top.convert.sample_rate.or(self.convert.sample_rate),
                mode: top.convert.mode.or(self.convert.mode),
                timeout: top.convert.timeout.or(self.convert.timeout),
            },
        }
    }

    /// Apply defaults and validate
    ///
    /// Conversion is enabled by `convert.enabled` or by choosing a preset; an
    /// explicit `convert.enabled = false` wins over a preset. Explicit
    /// bitrate, sample rate and mode override the preset.
    pub fn resolve(&self) -> Result<RunSettings, ConfigError> {
        let parallel = positive("parallel", self.parallel.unwrap_or(DEFAULT_PARALLEL))?;
        let batch_size = positive("batch_size", self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))?;

        let naming = NamingOptions {
            limit: Some(self.num.unwrap_or(DEFAULT_EPISODE_LIMIT)),
            max_filename_length: self.max_length,
            batch_size,
            min_index_width: self.min_index_width.unwrap_or(1),
            clean: CleanOptions {
                fold_unicode: self.fold_unicode.unwrap_or(true),
            },
        };

        let convert_requested = self
            .convert
            .enabled
            .unwrap_or(self.convert.preset.is_some());
        let convert = if convert_requested {
            Some(self.convert_settings()?)
        } else {
            None
        };

        Ok(RunSettings {
            output: self.output.clone().unwrap_or_else(|| PathBuf::from(".")),
            sync: SyncOptions {
                naming,
                parallel,
                convert,
            },
        })
    }

    fn convert_settings(&self) -> Result<ConvertSettings, ConfigError> {
        let convert = &self.convert;
        let mut settings = convert.preset.map(Preset::settings).unwrap_or_default();

        if let Some(bitrate) = convert.bitrate {
            settings.bitrate_kbps = positive("bitrate", bitrate)?;
        }
        if let Some(sample_rate) = convert.sample_rate {
            settings.sample_rate_hz = positive("sample_rate", sample_rate)?;
        }
        if let Some(mode) = convert.mode {
            settings.mode = mode;
        }
        if let Some(timeout) = convert.timeout {
            settings.timeout = Duration::from_secs(positive("convert timeout", timeout)?);
        }

        Ok(settings)
    }
}

fn positive<T: Default + PartialEq>(field: &'static str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let settings = Config::default().resolve().unwrap();

        assert_eq!(settings.output, PathBuf::from("."));
        assert_eq!(settings.sync.parallel, 2);
        assert_eq!(settings.sync.naming.limit, Some(30));
        assert_eq!(settings.sync.naming.batch_size, 100);
        assert_eq!(settings.sync.naming.max_filename_length, None);
        assert!(settings.sync.naming.clean.fold_unicode);
        assert!(settings.sync.convert.is_none());
    }

    #[test]
    fn parses_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcatch.toml");
        std::fs::write(
            &path,
            r#"
num = 50
output = "/srv/podcasts"
max_length = 64
fold_unicode = false

[convert]
preset = "speech"
mode = "stereo"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.num, Some(50));
        assert_eq!(config.convert.preset, Some(Preset::Speech));
        assert_eq!(config.convert.mode, Some(ChannelMode::Stereo));

        let settings = config.resolve().unwrap();
        assert_eq!(settings.output, PathBuf::from("/srv/podcasts"));
        assert_eq!(settings.sync.naming.max_filename_length, Some(64));
        assert!(!settings.sync.naming.clean.fold_unicode);

        let convert = settings.sync.convert.unwrap();
        assert_eq!(convert.bitrate_kbps, 32);
        assert_eq!(convert.sample_rate_hz, 22_050);
        assert_eq!(convert.mode, ChannelMode::Stereo);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("podcatch.toml");
        std::fs::write(&path, "paralel = 4\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("absent.toml")),
            Err(ConfigError::ReadFailed { .. })
        ));
    }

    #[test]
    fn command_line_overrides_file() {
        let file = Config {
            num: Some(10),
            parallel: Some(4),
            convert: ConvertConfig {
                preset: Some(Preset::High),
                bitrate: Some(96),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = Config {
            parallel: Some(1),
            convert: ConvertConfig {
                bitrate: Some(160),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = file.overlay(cli);

        assert_eq!(merged.num, Some(10));
        assert_eq!(merged.parallel, Some(1));
        assert_eq!(merged.convert.preset, Some(Preset::High));
        assert_eq!(merged.convert.bitrate, Some(160));
    }

    #[test]
    fn zero_values_are_rejected() {
        for config in [
            Config {
                parallel: Some(0),
                ..Default::default()
            },
            Config {
                batch_size: Some(0),
                ..Default::default()
            },
            Config {
                convert: ConvertConfig {
                    enabled: Some(true),
                    bitrate: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            },
            Config {
                convert: ConvertConfig {
                    enabled: Some(true),
                    sample_rate: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            },
        ] {
            assert!(matches!(
                config.resolve(),
                Err(ConfigError::Invalid { .. })
            ));
        }
    }

    #[test]
    fn presets_match_their_profiles() {
        let speech = Preset::Speech.settings();
        assert_eq!(
            (speech.mode, speech.bitrate_kbps, speech.sample_rate_hz),
            (ChannelMode::Mono, 32, 22_050)
        );

        let low = Preset::Low.settings();
        assert_eq!(
            (low.mode, low.bitrate_kbps, low.sample_rate_hz),
            (ChannelMode::Mono, 48, 22_050)
        );

        let medium = Preset::Medium.settings();
        assert_eq!(
            (medium.mode, medium.bitrate_kbps, medium.sample_rate_hz),
            (ChannelMode::JointStereo, 64, 44_100)
        );

        let high = Preset::High.settings();
        assert_eq!(
            (high.mode, high.bitrate_kbps, high.sample_rate_hz),
            (ChannelMode::JointStereo, 128, 44_100)
        );
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("Speech".parse::<Preset>().unwrap(), Preset::Speech);
        assert!(matches!(
            "ultra".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(name)) if name == "ultra"
        ));
    }

    #[test]
    fn explicit_disable_wins_over_preset() {
        let config = Config {
            convert: ConvertConfig {
                enabled: Some(false),
                preset: Some(Preset::Speech),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(config.resolve().unwrap().sync.convert.is_none());
    }

    #[test]
    fn command_line_can_disable_conversion_from_file() {
        let file = Config {
            convert: ConvertConfig {
                enabled: Some(true),
                preset: Some(Preset::Low),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = Config {
            convert: ConvertConfig {
                enabled: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };

        let settings = file.overlay(cli).resolve().unwrap();
        assert!(settings.sync.convert.is_none());
    }

    #[test]
    fn enabled_without_preset_uses_default_settings() {
        let config = Config {
            convert: ConvertConfig {
                enabled: Some(true),
                timeout: Some(30),
                ..Default::default()
            },
            ..Default::default()
        };

        let convert = config.resolve().unwrap().sync.convert.unwrap();
        assert_eq!(convert.bitrate_kbps, ConvertSettings::default().bitrate_kbps);
        assert_eq!(convert.timeout, Duration::from_secs(30));
    }
}
