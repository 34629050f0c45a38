use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::errors::TranslationError;
use crate::file_utils::FileManager;
use crate::providers::ChatProvider;
use crate::providers::openai::OpenAI;
use crate::subtitle_processor::{ParsedSubtitles, SubtitleFormat, SubtitleParser};
use crate::translation::{
    CancellationFlag, RunOutcome, RunReport, SubtitleStore, TranslationEvent, TranslationJob, TranslationService,
    TABULAR_HEADER,
};

// @module: Application controller for subtitle processing

/// One kind of export file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Srt,
    Tsv,
    Xlsx,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Tsv => "tsv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Which export files to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Same format as the input
    #[default]
    Auto,
    Srt,
    Tsv,
    /// Spreadsheet with the same columns as the TSV export
    Xlsx,
    /// SRT and TSV
    Both,
}

impl ExportFormat {
    /// Concrete outputs for a parsed input
    pub fn resolve(self, parsed_format: SubtitleFormat) -> Vec<OutputKind> {
        match self {
            Self::Auto => match parsed_format {
                SubtitleFormat::Srt => vec![OutputKind::Srt],
                SubtitleFormat::Tabular => vec![OutputKind::Tsv],
            },
            Self::Srt => vec![OutputKind::Srt],
            Self::Tsv => vec![OutputKind::Tsv],
            Self::Xlsx => vec![OutputKind::Xlsx],
            Self::Both => vec![OutputKind::Srt, OutputKind::Tsv],
        }
    }
}

/// Per-invocation options of the translate command
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Overwrite existing output files
    pub force_overwrite: bool,
    pub format: ExportFormat,
}

/// What happened to one input file
#[derive(Debug)]
pub enum FileOutcome {
    /// Every output already existed
    Skipped,
    /// A run happened; `outputs` lists the files written.
    /// An unfinished run writes only its resume file.
    Finished { outputs: Vec<PathBuf>, report: RunReport },
}

/// Counts for a folder run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FolderSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Stop flag shared with every run started by this controller
    cancel: CancellationFlag,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the current run when set, e.g. from a Ctrl-C handler
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Build the OpenAI-compatible service from the configuration
    pub fn build_service(&self) -> Result<TranslationService<OpenAI>> {
        TranslationService::from_run_config(self.config.run_config())
            .context("Invalid translation settings")
    }

    /// Send a one-word request to check endpoint, key and model
    pub async fn check_connection(&self) -> Result<()> {
        let service = self.build_service()?;
        let run_config = service.config();
        info!("Testing connection to {} with model {}", run_config.endpoint, run_config.model_id);

        service.test_connection().await
            .with_context(|| format!("Connection test failed for {}", run_config.endpoint))?;

        info!("Connection OK");
        Ok(())
    }

    /// Read and parse a subtitle file
    pub fn parse_file(input_file: &Path) -> Result<ParsedSubtitles> {
        let content = FileManager::read_subtitle_text(input_file)?;
        let parsed = SubtitleParser::parse(&content);
        if parsed.is_empty() {
            return Err(TranslationError::NoSubtitles)
                .with_context(|| format!("Nothing to translate in {:?}", input_file));
        }
        Ok(parsed)
    }

    /// Translate one file with the configured endpoint
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, options: RunOptions) -> Result<FileOutcome> {
        let service = self.build_service()?;
        let multi_progress = MultiProgress::new();
        self.run_with_service(service, &input_file, &output_dir, options, &multi_progress).await
    }

    /// Translate one file with a given service
    pub async fn run_with_service<P>(
        &self,
        service: TranslationService<P>,
        input_file: &Path,
        output_dir: &Path,
        options: RunOptions,
        multi_progress: &MultiProgress,
    ) -> Result<FileOutcome>
    where
        P: ChatProvider + 'static,
    {
        let start_time = Instant::now();

        if !input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        FileManager::ensure_dir(output_dir)?;

        let parsed = Self::parse_file(input_file)?;
        let kinds = options.format.resolve(parsed.format);
        let output_paths = self.output_paths(input_file, output_dir, &kinds);
        let language_tag = FileManager::language_tag(&self.config.target_language);
        let partial_path = FileManager::generate_partial_path(input_file, output_dir, &language_tag);

        if !options.force_overwrite && output_paths.iter().all(|(_, path)| path.exists()) {
            warn!("Skipping {:?}, translation already exists (use -f to force overwrite)", input_file);
            return Ok(FileOutcome::Skipped);
        }

        let store = SubtitleStore::new();
        let loaded = store.replace(parsed);
        info!(
            "Loaded {} lines from {:?} ({})",
            loaded,
            input_file,
            store.format().map(|format| format.label()).unwrap_or("unknown")
        );

        if !options.force_overwrite && partial_path.exists() {
            let previous = FileManager::read_subtitle_text(&partial_path)?;
            let restored = store.restore_from_tabular(&previous);
            info!("Resuming from {}: {} lines already translated", partial_path.display(), restored);
        }

        let (report, run_log) = self.translate_store_with_progress(service, &store, multi_progress).await?;

        let mut outputs = Vec::new();
        if report.outcome == RunOutcome::Completed {
            for (kind, path) in &output_paths {
                Self::write_output(&store, *kind, path)?;
                info!("Success: {}", path.display());
                outputs.push(path.clone());
            }
            if partial_path.exists() {
                FileManager::remove_file(&partial_path)?;
            }
        } else {
            if store.translated_count() > 0 {
                FileManager::write_to_file(&partial_path, &store.to_tabular())?;
                info!("Partial translation saved to {}, run again to resume", partial_path.display());
                outputs.push(partial_path);
            }
            self.write_issues_log(output_dir, input_file, &report, &run_log);
        }

        match &report.outcome {
            RunOutcome::Completed => info!(
                "Translation completed in {}.",
                Self::format_duration(start_time.elapsed())
            ),
            RunOutcome::Stopped => warn!(
                "Translation stopped: {}/{} lines translated",
                store.translated_count(),
                store.len()
            ),
            RunOutcome::Failed(message) => error!("Translation failed: {}", message),
        }

        Ok(FileOutcome::Finished { outputs, report })
    }

    /// Drive one run, rendering its events on a progress bar
    async fn translate_store_with_progress<P>(
        &self,
        service: TranslationService<P>,
        store: &SubtitleStore,
        multi_progress: &MultiProgress,
    ) -> Result<(RunReport, Vec<String>)>
    where
        P: ChatProvider + 'static,
    {
        let pending = store.select_pending().len();
        let batch_size = service.config().batch_size.max(1);
        let model_id = service.config().model_id.clone();

        let progress_bar = multi_progress.add(ProgressBar::new(pending.div_ceil(batch_size) as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));

        info!("🚀 subbatch: {}", model_id);
        progress_bar.set_message("Translating");

        let mut job = TranslationJob::spawn(service, store.clone(), self.cancel.clone())?;
        let mut run_log = Vec::new();

        while let Some(event) = job.next_event().await {
            match event {
                TranslationEvent::Status(message) => progress_bar.set_message(message),
                TranslationEvent::Log(line) => {
                    progress_bar.suspend(|| info!("{}", line));
                    run_log.push(line);
                }
                TranslationEvent::Merge(mapping) => debug!("Merged {} translations", mapping.len()),
                TranslationEvent::Progress { completed, total } => {
                    progress_bar.set_length(total as u64);
                    progress_bar.set_position(completed as u64);
                }
                TranslationEvent::Done => progress_bar.finish_and_clear(),
                TranslationEvent::Stopped => progress_bar.abandon_with_message("Stopped"),
                TranslationEvent::Error(message) => {
                    progress_bar.abandon_with_message("Failed");
                    run_log.push(format!("Run aborted: {}", message));
                }
            }
        }

        let report = job.wait().await?;
        if report.token_usage.total_tokens > 0 {
            info!("🔢 {}", report.token_usage.summary());
        }

        Ok((report, run_log))
    }

    /// Output file per requested kind
    fn output_paths(&self, input_file: &Path, output_dir: &Path, kinds: &[OutputKind]) -> Vec<(OutputKind, PathBuf)> {
        let language_tag = FileManager::language_tag(&self.config.target_language);
        kinds
            .iter()
            .map(|kind| {
                let path = FileManager::generate_output_path(input_file, output_dir, &language_tag, kind.extension());
                (*kind, path)
            })
            .collect()
    }

    fn write_output(store: &SubtitleStore, kind: OutputKind, path: &Path) -> Result<()> {
        match kind {
            OutputKind::Srt => FileManager::write_to_file(path, &store.to_srt()),
            OutputKind::Tsv => FileManager::write_to_file(path, &store.to_tabular()),
            OutputKind::Xlsx => FileManager::write_xlsx(path, &TABULAR_HEADER, &store.tabular_rows()),
        }
    }

    /// Write the run log of an unfinished run next to its input's outputs
    fn write_issues_log(&self, output_dir: &Path, input_file: &Path, report: &RunReport, run_log: &[String]) {
        let mut log_content = String::new();
        log_content.push_str(&format!(
            "Translation Log - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        log_content.push_str(&format!(
            "Context: {:?} - {} ({:?}, {}/{} batches)\n\n",
            input_file,
            self.config.model_id(),
            report.outcome,
            report.batches_completed,
            report.batches_total
        ));
        for line in run_log {
            log_content.push_str(line);
            log_content.push('\n');
        }

        let log_file_path = FileManager::generate_issues_log_path(input_file, output_dir);
        if let Err(e) = FileManager::write_to_file(&log_file_path, &log_content) {
            warn!("Failed to write logs to file: {}", e);
        } else {
            info!("Logs written to {}", log_file_path.display());
        }
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Run the workflow in folder mode with the configured endpoint
    pub async fn run_folder(&self, input_dir: PathBuf, options: RunOptions) -> Result<FolderSummary> {
        let service = self.build_service()?;
        self.run_folder_with_service(service, &input_dir, options).await
    }

    /// Translate every subtitle file under a directory.
    /// Files that already have translated outputs are skipped.
    pub async fn run_folder_with_service<P>(
        &self,
        service: TranslationService<P>,
        input_dir: &Path,
        options: RunOptions,
    ) -> Result<FolderSummary>
    where
        P: ChatProvider + 'static,
    {
        let start_time = Instant::now();

        if !FileManager::dir_exists(input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let language_tag = FileManager::language_tag(&self.config.target_language);
        let files: Vec<PathBuf> = FileManager::find_subtitle_files(input_dir)?
            .into_iter()
            .filter(|path| !FileManager::is_generated_output(path, &language_tag))
            .collect();

        if files.is_empty() {
            return Err(anyhow!("No subtitle files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));
        folder_pb.set_message("Processing files");

        let mut summary = FolderSummary::default();

        for file in &files {
            if self.cancel.is_stop_requested() {
                warn!("Stop requested, remaining files are left untouched");
                break;
            }

            let file_name = file.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.to_path_buf());

            match self.run_with_service(service.clone(), file, &output_dir, options, &multi_progress).await {
                Ok(FileOutcome::Skipped) => summary.skipped += 1,
                Ok(FileOutcome::Finished { report, .. }) => match report.outcome {
                    RunOutcome::Failed(_) => summary.errors += 1,
                    _ => summary.processed += 1,
                },
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.errors += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        info!(
            "Folder processing completed: {} processed, {} skipped, {} errors ({})",
            summary.processed,
            summary.skipped,
            summary.errors,
            Self::format_duration(start_time.elapsed())
        );

        Ok(summary)
    }
}
