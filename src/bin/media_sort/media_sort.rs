use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use indicatif::ProgressBar;
#[cfg(not(test))]
use indicatif::ProgressStyle;
use itertools::Itertools;

use media_sorter::organize::{
    CancelToken, FileEntry, FileList, ProgressSink, TransferEngine, TransferReport,
};
use media_sorter::settings::{
    DESTINATION_FOLDER_KEY, FOLDERS_SECTION, SOURCE_FOLDER_KEY, SettingsStore, TomlSettings,
};
use media_sorter::{path_to_string_relative, print_bold, print_error, print_warning};

use crate::config::Config;
use crate::logger::TransferLog;

#[cfg(not(test))]
const PROGRESS_BAR_CHARS: &str = "=> ";
#[cfg(not(test))]
const PROGRESS_BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:80.cyan/blue} {pos}/{len} {percent}%";

#[derive(Debug)]
pub struct MediaSort {
    config: Config,
    list: FileList,
}

/// Progress bar and error output for a transfer running on the worker thread.
///
/// Tracks the file names of the snapshot so verbose output can name each file as it finishes.
struct ConsoleSink {
    progress_bar: ProgressBar,
    file_names: Vec<String>,
    attempted: usize,
    verbose: bool,
}

impl ConsoleSink {
    fn new(progress_bar: ProgressBar, snapshot: &[FileEntry], verbose: bool) -> Self {
        Self {
            progress_bar,
            file_names: snapshot.iter().map(|entry| entry.file_name().to_string()).collect(),
            attempted: 0,
            verbose,
        }
    }

    /// Name of the file the engine just finished with.
    fn next_file_name(&mut self) -> &str {
        let name = self.file_names.get(self.attempted).map_or("", String::as_str);
        self.attempted += 1;
        name
    }
}

impl ProgressSink for ConsoleSink {
    fn advance(&mut self, completed: usize, total: usize) {
        let verbose = self.verbose;
        let name = self.next_file_name().to_string();
        if verbose {
            println!("{} [{completed}/{total}] {name}", "✓".green());
        }
        self.progress_bar.set_position(completed as u64);
    }

    fn report_error(&mut self, file_name: &str, detail: &str) {
        self.attempted += 1;
        self.progress_bar.suspend(|| print_error!("{file_name}: {detail}"));
    }
}

impl MediaSort {
    pub fn new(config: Config) -> Result<Self> {
        let mut settings = TomlSettings::open_default()?;
        let (source, destination) = resolve_folders(&config, &settings)?;

        if config.save {
            save_folders(&mut settings, &source, &destination)?;
            println!("Saved folders to {}", settings.path().display());
        }

        if config.debug {
            eprintln!("Config: {config:#?}");
            eprintln!("Source: {}", source.display());
            eprintln!("Destination: {}", destination.display());
        }

        let list = FileList::new(
            source,
            destination,
            config.convention.clone(),
            config.policy.clone(),
        );

        Ok(Self { config, list })
    }

    pub fn run(&mut self) -> Result<()> {
        self.list.scan()?;
        self.apply_patterns();

        if self.list.is_empty() {
            println!("No files found in {}", path_to_string_relative(self.list.source_root()));
            return Ok(());
        }

        self.print_plan();

        let snapshot = self.list.snapshot();
        if snapshot.is_empty() {
            println!("No files selected for transfer");
            return Ok(());
        }

        let verb = self.config.mode.as_str();
        print_bold!(
            "{verb} {} file(s) ({}) to {}",
            snapshot.len(),
            media_sorter::format_size(self.total_size(&snapshot)),
            self.list.destination_root().display()
        );

        if self.config.dryrun {
            return Ok(());
        }

        if !self.config.auto && !confirm(&format!("{verb} files? (y/n): "))? {
            println!("Skipped");
            return Ok(());
        }

        let report = self.transfer(snapshot)?;
        Self::print_summary(&report);

        // List what is left behind after the run
        self.list.scan()?;
        println!(
            "{} file(s) remaining in {}",
            self.list.len(),
            path_to_string_relative(self.list.source_root())
        );

        if report.failed() > 0 {
            anyhow::bail!("{} failed for {} file(s)", report.mode, report.failed());
        }
        Ok(())
    }

    /// Force-include and force-exclude files by name pattern.
    /// Excludes win over includes.
    fn apply_patterns(&mut self) {
        for pattern in &self.config.include {
            let count = self.list.set_include_matching(pattern, true);
            if self.config.verbose {
                println!("Include \"{pattern}\": {count} file(s)");
            }
        }
        for pattern in &self.config.exclude {
            let count = self.list.set_include_matching(pattern, false);
            if self.config.verbose {
                println!("Exclude \"{pattern}\": {count} file(s)");
            }
        }
    }

    fn print_plan(&self) {
        let root = self.list.destination_root();
        for (target, files) in group_by_target(self.list.entries()) {
            let name = target
                .strip_prefix(root)
                .ok()
                .filter(|relative| !relative.as_os_str().is_empty())
                .map_or_else(|| ".".to_string(), |relative| relative.display().to_string());

            println!("{}: {} file(s)", name.cyan().bold(), files.len());
            for entry in files {
                println!("  {}", entry.file_name());
            }
        }

        if self.config.verbose {
            for entry in self.list.entries().iter().filter(|entry| !entry.include()) {
                println!("{}", format!("Excluded: {}", entry.file_name()).dimmed());
            }
        }
        println!();
    }

    fn total_size(&self, entries: &[FileEntry]) -> u64 {
        entries
            .iter()
            .filter_map(|entry| fs::metadata(self.list.source_root().join(entry.file_name())).ok())
            .map(|metadata| metadata.len())
            .sum()
    }

    fn transfer(&self, snapshot: Vec<FileEntry>) -> Result<TransferReport> {
        let mut logger = if self.config.log {
            Some(TransferLog::new()?)
        } else {
            None
        };
        if let Some(logger) = logger.as_mut() {
            logger.log_init(
                &self.config,
                self.list.source_root(),
                self.list.destination_root(),
                snapshot.len(),
            );
        }

        let cancel = CancelToken::new();
        set_abort_handler(cancel.clone())?;

        let progress_bar = create_progress_bar(snapshot.len() as u64, self.config.verbose);
        let sink = ConsoleSink::new(progress_bar.clone(), &snapshot, self.config.verbose);

        let engine =
            TransferEngine::new(self.list.source_root().to_path_buf(), self.config.mode).with_cancel_token(cancel);
        let report = engine
            .spawn(snapshot, sink)?
            .join()
            .map_err(|_| anyhow!("Transfer thread panicked"))?;

        progress_bar.finish_and_clear();

        if let Some(logger) = logger.as_mut() {
            logger.log_report(&report);
            if self.config.verbose {
                println!("Log written to {}", logger.path().display());
            }
        }

        Ok(report)
    }

    fn print_summary(report: &TransferReport) {
        if report.cancelled {
            println!("\n{}", "Aborted by user".bold().red());
        }

        let summary = summary_line(report);
        if report.failed() == 0 && !report.cancelled {
            println!("{}", format!("✓ {summary}").green());
        } else {
            print_warning!("{summary}");
        }

        let failures = failure_lines(report);
        if !failures.is_empty() {
            print_bold!("Failed files:");
            for line in failures {
                print_warning!("{line}");
            }
        }
    }
}

/// Counts and duration of a finished run.
fn summary_line(report: &TransferReport) -> String {
    format!("{report} in {}", media_sorter::format_duration(report.duration))
}

/// One line per failed file with its error.
fn failure_lines(report: &TransferReport) -> Vec<String> {
    report
        .failures()
        .map(|(file_name, error)| format!("  {file_name}: {error}"))
        .collect()
}

/// Pick the source and destination folders from arguments, falling back to saved settings.
///
/// The source defaults to the current directory, the destination is required.
fn resolve_folders(config: &Config, settings: &impl SettingsStore) -> Result<(PathBuf, PathBuf)> {
    let source = config
        .source
        .clone()
        .or_else(|| non_empty_path(&settings.read(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "")));
    let source = media_sorter::resolve_input_path(source.as_deref())?;

    let destination = config
        .destination
        .clone()
        .or_else(|| non_empty_path(&settings.read(FOLDERS_SECTION, DESTINATION_FOLDER_KEY, "")))
        .context("No destination folder given: use --dest or save one with --save")?;
    let destination = media_sorter::resolve_output_path(&destination)?;

    Ok((source, destination))
}

fn save_folders(settings: &mut impl SettingsStore, source: &Path, destination: &Path) -> Result<()> {
    settings.write(
        FOLDERS_SECTION,
        SOURCE_FOLDER_KEY,
        &media_sorter::path_to_string(source),
    )?;
    settings.write(
        FOLDERS_SECTION,
        DESTINATION_FOLDER_KEY,
        &media_sorter::path_to_string(destination),
    )
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Included entries grouped by target folder, sorted by folder.
fn group_by_target(entries: &[FileEntry]) -> Vec<(&Path, Vec<&FileEntry>)> {
    entries
        .iter()
        .filter(|entry| entry.include())
        .map(|entry| (entry.target_folder(), entry))
        .into_group_map()
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .collect()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt.magenta());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// First Ctrl+C finishes the current file and stops, a second one exits immediately.
fn set_abort_handler(cancel: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        println!("\n{}", "Received Ctrl+C, finishing current file...".yellow().bold());
        cancel.cancel();
    })
    .context("Failed to set Ctrl+C handler")
}

/// Create a progress bar that is hidden during tests and in verbose mode.
fn create_progress_bar(len: u64, verbose: bool) -> ProgressBar {
    #[cfg(test)]
    {
        let _ = (len, verbose);
        ProgressBar::hidden()
    }
    #[cfg(not(test))]
    {
        if verbose {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(len);
        match ProgressStyle::default_bar().template(PROGRESS_BAR_TEMPLATE) {
            Ok(style) => progress_bar.set_style(style.progress_chars(PROGRESS_BAR_CHARS)),
            Err(error) => print_warning!("Invalid progress bar template: {error}"),
        }
        progress_bar
    }
}
