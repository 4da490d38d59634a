// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use podcatch::{
    ChannelMode, Config, ConvertConfig, FfmpegTranscoder, HttpConfig, Preset, ProgressEvent,
    ProgressReporter, ReqwestClient, SharedProgressReporter, SkipReason, TracingReporter,
    Transcoder, sync_podcast,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static CONVERT: Emoji<'_, '_> = Emoji("🔄 ", "[c] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[w] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Catch up on a podcast: download episodes into chronologically sortable files
#[derive(Parser, Debug)]
#[command(name = "podcatch")]
#[command(about = "Download podcast episodes with filenames that sort in publication order")]
#[command(version)]
struct Args {
    /// RSS feed URL or path to local RSS file
    feed: String,

    /// Number of most recent episodes to keep [default: 30]
    #[arg(short = 'n', long = "num")]
    num: Option<usize>,

    /// Base output directory [default: .]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum filename length in bytes, extension included [default: unlimited]
    #[arg(long)]
    max_length: Option<usize>,

    /// Number of concurrent downloads [default: 2]
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Episodes per directory before splitting into batches [default: 100]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Minimum number of digits in the filename index [default: 1]
    #[arg(long)]
    min_index_width: Option<usize>,

    /// Keep accented letters instead of folding them to ASCII
    #[arg(long)]
    no_fold: bool,

    /// Transcode downloaded episodes with ffmpeg
    #[arg(long, conflicts_with = "no_convert")]
    convert: bool,

    /// Do not transcode, even if the config file or a preset enables it
    #[arg(long)]
    no_convert: bool,

    /// Transcoding preset: speech, low, medium or high (implies --convert unless --no-convert)
    #[arg(long)]
    preset: Option<Preset>,

    /// Target bitrate in kbps, overrides the preset
    #[arg(long)]
    bitrate: Option<u32>,

    /// Target sample rate in Hz, overrides the preset
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Channel mode: mono, stereo or joint-stereo, overrides the preset
    #[arg(long)]
    mode: Option<ChannelMode>,

    /// Seconds one transcoding may take [default: 600]
    #[arg(long, value_name = "SECONDS")]
    convert_timeout: Option<u64>,

    /// TOML file with defaults for any of the options above
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quiet mode - no progress bars, only warnings and the final counts
    #[arg(short, long)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// The options given on the command line, as a config layer
    fn to_config(&self) -> Config {
        Config {
            num: self.num,
            output: self.output.clone(),
            max_length: self.max_length,
            parallel: self.parallel,
            batch_size: self.batch_size,
            min_index_width: self.min_index_width,
            fold_unicode: self.no_fold.then_some(false),
            convert: ConvertConfig {
                enabled: if self.no_convert {
                    Some(false)
                } else {
                    self.convert.then_some(true)
                },
                preset: self.preset,
                bitrate: self.bitrate,
                sample_rate: self.sample_rate,
                mode: self.mode,
                timeout: self.convert_timeout,
            },
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(spinner_style());
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, worker_id: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(bar) = bars.get(&worker_id) {
            return bar.clone();
        }

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(download_style());
        bars.insert(worker_id, bar.clone());
        bar
    }

    fn finish_bar(&self, worker_id: usize) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.remove(&worker_id) {
            bar.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", source.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_entries,
                planned,
                already_present,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} entries in feed, {} planned, {} already here",
                    podcast_title.bold().green(),
                    total_entries.to_string().cyan(),
                    planned.to_string().cyan(),
                    already_present.to_string().yellow()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.println(
                    format!("  Removed {count} leftover file(s) from an interrupted run")
                        .dimmed()
                        .to_string(),
                );
            }

            ProgressEvent::ConversionUnavailable { transcoder } => {
                self.println(format!(
                    "{WARNING}{} ({transcoder}), keeping original audio",
                    "Transcoder not available".yellow()
                ));
            }

            ProgressEvent::JobStateChanged { .. } => {}

            ProgressEvent::EpisodeSkipped {
                episode_title,
                reason,
                ..
            } => {
                if reason != SkipReason::AlreadyPresent {
                    self.println(format!(
                        "  {} {} ({reason})",
                        "skipped".yellow(),
                        truncate_title(&episode_title, 50)
                    ));
                }
            }

            ProgressEvent::DownloadStarting {
                worker_id,
                episode_title,
                ordinal,
                total,
                content_length,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    ordinal.to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                worker_id,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted {
                worker_id,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                bar.set_position(bytes_downloaded);
                self.println(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
                self.finish_bar(worker_id);
            }

            ProgressEvent::DownloadFailed {
                worker_id,
                episode_title,
                error,
            } => {
                self.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(worker_id);
            }

            ProgressEvent::ConversionStarting {
                worker_id,
                episode_title,
            } => {
                let bar = self.get_or_create_bar(worker_id);
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar.set_message(format!(
                    "{CONVERT}Converting {}",
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::ConversionCompleted { worker_id, .. } => {
                self.finish_bar(worker_id);
            }

            ProgressEvent::ConversionFailed {
                worker_id,
                episode_title,
                error,
            } => {
                self.println(format!(
                    "{WARNING}{} - {} (original kept)",
                    truncate_title(&episode_title, 30).yellow(),
                    error.yellow()
                ));
                self.finish_bar(worker_id);
            }

            ProgressEvent::ManifestWritten { directory } => {
                self.main_bar.set_message(format!(
                    "Manifest written: {}",
                    directory.display().to_string().cyan()
                ));
            }

            ProgressEvent::SyncCompleted {
                downloaded_count,
                converted_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} converted, {} skipped, {} failed",
                    "Done:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    converted_count.to_string().cyan(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        1 => tracing_subscriber::EnvFilter::new("info"),
        _ => tracing_subscriber::EnvFilter::new("debug"),
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let file_config = match &args.config {
        Some(path) => Config::load(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    let settings = file_config
        .overlay(args.to_config())
        .resolve()
        .context("Invalid configuration")?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podcatch".bold().magenta(),
            "- Podcast Catch-up".dimmed()
        );
    }

    let client = ReqwestClient::with_config(&HttpConfig {
        pool_size: settings.sync.parallel,
        ..Default::default()
    })
    .context("Failed to build HTTP client")?;

    let transcoder: Option<Arc<dyn Transcoder>> = settings
        .sync
        .convert
        .as_ref()
        .map(|_| Arc::new(FfmpegTranscoder::from_path()) as Arc<dyn Transcoder>);

    let reporter: SharedProgressReporter = if args.quiet {
        TracingReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let result = sync_podcast(
        &client,
        &args.feed,
        &settings.output,
        &settings.sync,
        transcoder,
        reporter,
    )
    .await
    .context("Failed to sync podcast")?;

    if args.quiet {
        // Progress goes to the log in quiet mode; the count line is always printed
        println!("{}: {}", result.podcast_title, result.summary());
    } else {
        if !result.failed_episodes.is_empty() {
            println!("\n{}", "Failed episodes:".red().bold());
            for (title, error) in &result.failed_episodes {
                println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
            }
        }

        if !result.skipped_episodes.is_empty() {
            println!("\n{}", "Skipped episodes:".yellow().bold());
            for (title, reason) in &result.skipped_episodes {
                println!("  {}{} - {}", CROSS, title, reason.to_string().dimmed());
            }
        }

        for directory in &result.directories {
            println!(
                "\n{FOLDER}Output: {}",
                settings.output.join(directory).display().to_string().cyan()
            );
        }
        println!();
    }

    Ok(())
}
