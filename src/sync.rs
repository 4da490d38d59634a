// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use url::Url;

use crate::episode::{
    ConvertSettings, DownloadContext, Transcoder, convert_in_place, download_episode,
};
use crate::error::{DownloadError, SyncError};
use crate::feed::load_feed;
use crate::http::HttpClient;
use crate::manifest::{CompletedSet, ManifestHeader, save_index, save_manifest};
use crate::naming::{
    EpisodePlan, NamingOptions, PlannedEpisode, plan_episodes, podcast_dir_name,
};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::scan_output_dirs;

/// Number of episodes kept from the feed when nothing else is configured
pub const DEFAULT_EPISODE_LIMIT: usize = 30;

/// Number of concurrent download workers when nothing else is configured
pub const DEFAULT_PARALLEL: usize = 2;

/// Options for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub naming: NamingOptions,
    /// Number of download workers
    pub parallel: usize,
    /// Transcode each finished download when set
    pub convert: Option<ConvertSettings>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            naming: NamingOptions {
                limit: Some(DEFAULT_EPISODE_LIMIT),
                ..Default::default()
            },
            parallel: DEFAULT_PARALLEL,
            convert: None,
        }
    }
}

/// Why an episode was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPresent,
    NoAudioEnclosure,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyPresent => "already present",
            Self::NoAudioEnclosure => "no audio enclosure",
        })
    }
}

/// What happened to the transcoding step of a downloaded episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    NotRequested,
    Converted,
    /// The original download was kept
    Failed(String),
}

/// Final result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Skipped(SkipReason),
    Downloaded {
        bytes: u64,
        conversion: ConversionOutcome,
    },
    Failed(String),
}

/// Lifecycle of a job
///
/// `Pending -> (Skipped | Downloading -> (Downloaded | Failed))`, followed by
/// `Converting -> (Converted | ConvertFailed)` when conversion is enabled.
/// Every transition is reported as [`ProgressEvent::JobStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Skipped,
    Downloading,
    Downloaded,
    Failed,
    Converting,
    Converted,
    ConvertFailed,
}

impl JobOutcome {
    /// The state the job ended in
    pub fn final_state(&self) -> JobState {
        match self {
            Self::Skipped(_) => JobState::Skipped,
            Self::Failed(_) => JobState::Failed,
            Self::Downloaded { conversion, .. } => match conversion {
                ConversionOutcome::NotRequested => JobState::Downloaded,
                ConversionOutcome::Converted => JobState::Converted,
                ConversionOutcome::Failed(_) => JobState::ConvertFailed,
            },
        }
    }

    /// Whether the target file exists once the job is done
    pub fn is_on_disk(&self) -> bool {
        matches!(
            self,
            Self::Skipped(SkipReason::AlreadyPresent) | Self::Downloaded { .. }
        )
    }
}

/// Message sent from a worker to the collector
#[derive(Debug, Clone)]
pub struct JobReport {
    pub ordinal: usize,
    pub outcome: JobOutcome,
}

/// Result of a run
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub podcast_title: String,
    /// Directories (relative to the output base) that hold the plan
    pub directories: Vec<String>,
    /// Episodes fetched in this run
    pub downloaded: usize,
    /// Episodes fetched and transcoded in this run
    pub converted: usize,
    /// Episodes that needed no fetch, for any reason
    pub skipped: usize,
    pub failed: usize,
    /// Failed episodes in chronological order (title, error message)
    pub failed_episodes: Vec<(String, String)>,
    /// Episodes skipped for a reason other than being present on disk
    pub skipped_episodes: Vec<(String, SkipReason)>,
}

impl SyncResult {
    /// One-line count summary, e.g. `3 downloaded, 0 converted, 1 skipped, 0 failed`
    pub fn summary(&self) -> String {
        format!(
            "{} downloaded, {} converted, {} skipped, {} failed",
            self.downloaded, self.converted, self.skipped, self.failed
        )
    }
}

struct Conversion {
    transcoder: Arc<dyn Transcoder>,
    settings: ConvertSettings,
}

/// Everything a worker needs, shared read-only between workers
struct RunContext<C> {
    client: C,
    output_dir: PathBuf,
    total: usize,
    conversion: Option<Conversion>,
    reporter: SharedProgressReporter,
}

/// Synchronize a podcast feed into `output_dir`
///
/// This is the main entry point for the library. It:
/// 1. Loads the feed (a failure here aborts before anything is written)
/// 2. Computes the naming plan
/// 3. Loads the manifests and cleans up leftovers of interrupted runs
/// 4. Runs one job per planned episode on a pool of `parallel` workers
/// 5. Rewrites manifest and index of every plan directory
///
/// Per-episode failures are counted in the result, never returned as errors.
pub async fn sync_podcast<C: HttpClient + Clone + 'static>(
    client: &C,
    feed_source: &str,
    output_dir: &Path,
    options: &SyncOptions,
    transcoder: Option<Arc<dyn Transcoder>>,
    reporter: SharedProgressReporter,
) -> Result<SyncResult, SyncError> {
    reporter.report(ProgressEvent::FetchingFeed {
        source: feed_source.to_string(),
    });

    let podcast = load_feed(client, feed_source).await?;

    let podcast_name = podcast_dir_name(&podcast.title, &options.naming.clean);
    let plan = plan_episodes(&podcast_name, &podcast.episodes, &options.naming);

    let state = scan_output_dirs(output_dir, &plan);
    if state.partial_files_cleaned > 0 {
        reporter.report(ProgressEvent::PartialFilesCleanedUp {
            count: state.partial_files_cleaned,
        });
    }

    reporter.report(ProgressEvent::FeedParsed {
        podcast_title: podcast.title.clone(),
        total_entries: podcast.episodes.len(),
        planned: plan.len(),
        already_present: state.already_present,
    });

    let directories: Vec<String> = plan.directories().into_iter().map(String::from).collect();

    if plan.is_empty() {
        reporter.report(ProgressEvent::SyncCompleted {
            downloaded_count: 0,
            converted_count: 0,
            skipped_count: 0,
            failed_count: 0,
        });

        return Ok(SyncResult {
            podcast_title: podcast.title,
            directories,
            ..Default::default()
        });
    }

    let conversion = options
        .convert
        .clone()
        .and_then(|settings| check_transcoder(transcoder, settings, &reporter));

    let context = Arc::new(RunContext {
        client: client.clone(),
        output_dir: output_dir.to_path_buf(),
        total: plan.len(),
        conversion,
        reporter: reporter.clone(),
    });

    let mut completed = state.completed;
    let reports = run_jobs(context, &plan, options.parallel, &mut completed).await;

    let header = ManifestHeader::from_podcast(&podcast);
    for directory in &directories {
        let dir = output_dir.join(directory);
        let entries: Vec<&PlannedEpisode> = plan.entries_in(directory).collect();

        save_manifest(&dir, &header, &entries, &completed)?;
        save_index(&dir, &header, &entries)?;

        reporter.report(ProgressEvent::ManifestWritten { directory: dir });
    }

    let mut result = SyncResult {
        podcast_title: podcast.title,
        directories,
        ..Default::default()
    };
    for report in &reports {
        let title = &plan.entries[report.ordinal - 1].episode.title;
        match &report.outcome {
            JobOutcome::Skipped(reason) => {
                result.skipped += 1;
                if *reason != SkipReason::AlreadyPresent {
                    result.skipped_episodes.push((title.clone(), *reason));
                }
            }
            JobOutcome::Downloaded { conversion, .. } => {
                result.downloaded += 1;
                if *conversion == ConversionOutcome::Converted {
                    result.converted += 1;
                }
            }
            JobOutcome::Failed(error) => {
                result.failed += 1;
                result.failed_episodes.push((title.clone(), error.clone()));
            }
        }
    }

    reporter.report(ProgressEvent::SyncCompleted {
        downloaded_count: result.downloaded,
        converted_count: result.converted,
        skipped_count: result.skipped,
        failed_count: result.failed,
    });

    Ok(result)
}

/// Check the transcoder once; conversion is a no-op for the whole run if it is missing
fn check_transcoder(
    transcoder: Option<Arc<dyn Transcoder>>,
    settings: ConvertSettings,
    reporter: &SharedProgressReporter,
) -> Option<Conversion> {
    match transcoder {
        Some(transcoder) if transcoder.available() => Some(Conversion {
            transcoder,
            settings,
        }),
        Some(transcoder) => {
            reporter.report(ProgressEvent::ConversionUnavailable {
                transcoder: transcoder.name().to_string(),
            });
            None
        }
        None => {
            reporter.report(ProgressEvent::ConversionUnavailable {
                transcoder: "none configured".to_string(),
            });
            None
        }
    }
}

/// Run every planned job on the worker pool and collect the reports
///
/// The returned reports are sorted by ordinal. `completed` is updated by this
/// function alone, as reports arrive.
async fn run_jobs<C: HttpClient + 'static>(
    context: Arc<RunContext<C>>,
    plan: &EpisodePlan,
    parallel: usize,
    completed: &mut CompletedSet,
) -> Vec<JobReport> {
    // Every job is queued up front, so the queue is sized to hold all of them
    let (job_tx, job_rx) = mpsc::channel::<PlannedEpisode>(plan.len());
    for entry in &plan.entries {
        if job_tx.send(entry.clone()).await.is_err() {
            break;
        }
        report_state(&context.reporter, entry.ordinal, JobState::Pending);
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<JobReport>();

    let workers = parallel.clamp(1, plan.len());
    let mut handles = Vec::with_capacity(workers);

    for worker_id in 0..workers {
        let context = context.clone();
        let job_rx = job_rx.clone();
        let report_tx = report_tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                // Hold the lock only while taking the next job
                let job = job_rx.lock().await.recv().await;
                let Some(job) = job else { break };

                let outcome = run_job(&context, worker_id, &job).await;
                let report = JobReport {
                    ordinal: job.ordinal,
                    outcome,
                };
                if report_tx.send(report).is_err() {
                    break;
                }
            }
        }));
    }
    drop(report_tx);

    let mut reports = Vec::with_capacity(plan.len());
    while let Some(report) = report_rx.recv().await {
        let episode = &plan.entries[report.ordinal - 1].episode;
        if report.outcome.is_on_disk() {
            completed.insert(&episode.title);
        } else {
            completed.remove_episode(episode);
        }

        report_state(
            &context.reporter,
            report.ordinal,
            report.outcome.final_state(),
        );
        reports.push(report);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "download worker terminated abnormally");
        }
    }

    reports.sort_by_key(|report| report.ordinal);
    reports
}

async fn run_job<C: HttpClient>(
    context: &RunContext<C>,
    worker_id: usize,
    job: &PlannedEpisode,
) -> JobOutcome {
    let episode = &job.episode;
    let target = context.output_dir.join(job.relative_path());

    let skip = |reason: SkipReason| {
        context.reporter.report(ProgressEvent::EpisodeSkipped {
            ordinal: job.ordinal,
            episode_title: episode.title.clone(),
            reason,
        });
        JobOutcome::Skipped(reason)
    };

    if tokio::fs::metadata(&target)
        .await
        .is_ok_and(|metadata| metadata.is_file())
    {
        return skip(SkipReason::AlreadyPresent);
    }

    let Some(enclosure) = episode.audio_enclosure() else {
        return skip(SkipReason::NoAudioEnclosure);
    };

    report_state(&context.reporter, job.ordinal, JobState::Downloading);
    let bytes = match fetch_to_target(context, worker_id, job, &enclosure.url, &target).await {
        Ok(bytes) => bytes,
        Err(e) => {
            context.reporter.report(ProgressEvent::DownloadFailed {
                worker_id,
                episode_title: episode.title.clone(),
                error: e.to_string(),
            });
            return JobOutcome::Failed(e.to_string());
        }
    };

    let conversion = match &context.conversion {
        None => ConversionOutcome::NotRequested,
        Some(conversion) => {
            report_state(&context.reporter, job.ordinal, JobState::Converting);
            context.reporter.report(ProgressEvent::ConversionStarting {
                worker_id,
                episode_title: episode.title.clone(),
            });

            match convert_in_place(conversion.transcoder.as_ref(), &target, &conversion.settings)
                .await
            {
                Ok(()) => {
                    context.reporter.report(ProgressEvent::ConversionCompleted {
                        worker_id,
                        episode_title: episode.title.clone(),
                    });
                    ConversionOutcome::Converted
                }
                Err(e) => {
                    context.reporter.report(ProgressEvent::ConversionFailed {
                        worker_id,
                        episode_title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    ConversionOutcome::Failed(e.to_string())
                }
            }
        }
    };

    JobOutcome::Downloaded { bytes, conversion }
}

fn report_state(reporter: &SharedProgressReporter, ordinal: usize, state: JobState) {
    reporter.report(ProgressEvent::JobStateChanged { ordinal, state });
}

/// Download into `target`, creating its directory if this job is the first to use it
async fn fetch_to_target<C: HttpClient>(
    context: &RunContext<C>,
    worker_id: usize,
    job: &PlannedEpisode,
    url: &Url,
    target: &Path,
) -> Result<u64, DownloadError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::DirectoryCreateFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let download_context = DownloadContext {
        worker_id,
        ordinal: job.ordinal,
        total: context.total,
    };
    download_episode(
        &context.client,
        &job.episode.title,
        url,
        target,
        &download_context,
        &context.reporter,
    )
    .await
}
