//! Sequential batch transfer of file entries into their target folders.
//!
//! A run works on a snapshot of the included entries and processes them one at a time in order.
//! A failing file is reported and skipped, it never stops the rest of the batch.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::organize::FileEntry;

/// How files are transferred to their destination.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Duplicate the file and keep the source.
    Copy,
    /// Relocate the file.
    #[default]
    Move,
}

/// Receives progress from a transfer run.
///
/// Called synchronously from the thread executing the run.
pub trait ProgressSink {
    /// A file was transferred successfully.
    fn advance(&mut self, completed: usize, total: usize);

    /// A file failed. The run continues with the next file.
    fn report_error(&mut self, file_name: &str, detail: &str);
}

/// Adapts a pair of closures into a [`ProgressSink`].
pub struct CallbackSink<P, E> {
    on_progress: P,
    on_error: E,
}

/// Shared flag checked between files to stop a run early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

/// Result of transferring a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Transferred { destination: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub file_name: String,
    pub outcome: TransferOutcome,
}

/// Summary of a finished transfer run.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub mode: TransferMode,
    /// Number of included entries when the run started.
    pub total: usize,
    /// One result per attempted file, in processing order.
    pub results: Vec<TransferResult>,
    /// True if the run stopped before attempting every file.
    pub cancelled: bool,
    pub duration: Duration,
}

/// Copies or moves file entries from a source root into their target folders.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    source_root: PathBuf,
    mode: TransferMode,
    cancel: CancelToken,
}

impl TransferMode {
    /// Capitalized verb for console and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "Copy",
            Self::Move => "Move",
        }
    }

    #[must_use]
    pub const fn from_copy_flag(copy: bool) -> Self {
        if copy { Self::Copy } else { Self::Move }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<P, E> CallbackSink<P, E>
where
    P: FnMut(usize, usize),
    E: FnMut(&str, &str),
{
    pub const fn new(on_progress: P, on_error: E) -> Self {
        Self { on_progress, on_error }
    }
}

impl<P, E> ProgressSink for CallbackSink<P, E>
where
    P: FnMut(usize, usize),
    E: FnMut(&str, &str),
{
    fn advance(&mut self, completed: usize, total: usize) {
        (self.on_progress)(completed, total);
    }

    fn report_error(&mut self, file_name: &str, detail: &str) {
        (self.on_error)(file_name, detail);
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for &mut T {
    fn advance(&mut self, completed: usize, total: usize) {
        (**self).advance(completed, total);
    }

    fn report_error(&mut self, file_name: &str, detail: &str) {
        (**self).report_error(file_name, detail);
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl TransferResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Transferred { .. })
    }
}

impl TransferReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|result| result.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Files that were not attempted because the run was cancelled.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.total.saturating_sub(self.results.len())
    }

    /// Failed file names with their error details.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|result| match &result.outcome {
            TransferOutcome::Failed { error } => Some((result.file_name.as_str(), error.as_str())),
            TransferOutcome::Transferred { .. } => None,
        })
    }

    /// True when every file in the snapshot was transferred.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.total
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded(), self.failed())?;
        if self.cancelled {
            write!(f, ", {} not processed", self.skipped())?;
        }
        Ok(())
    }
}

impl TransferEngine {
    #[must_use]
    pub fn new(source_root: PathBuf, mode: TransferMode) -> Self {
        Self {
            source_root,
            mode,
            cancel: CancelToken::new(),
        }
    }

    /// Use an existing cancel token, for example one shared with a Ctrl+C handler.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn mode(&self) -> TransferMode {
        self.mode
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Transfer all included entries in order.
    ///
    /// The total is fixed to the number of included entries before the first file is touched.
    /// Successes call [`ProgressSink::advance`] and failures call [`ProgressSink::report_error`].
    pub fn run<S: ProgressSink + ?Sized>(&self, entries: &[FileEntry], sink: &mut S) -> TransferReport {
        let start = Instant::now();
        let snapshot: Vec<&FileEntry> = entries.iter().filter(|entry| entry.include()).collect();
        let total = snapshot.len();

        let mut results = Vec::with_capacity(total);
        let mut completed: usize = 0;
        let mut cancelled = false;

        for entry in snapshot {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = match self.transfer(entry) {
                Ok(destination) => {
                    completed += 1;
                    sink.advance(completed, total);
                    TransferOutcome::Transferred { destination }
                }
                Err(error) => {
                    let error = format!("{error:#}");
                    sink.report_error(entry.file_name(), &error);
                    TransferOutcome::Failed { error }
                }
            };

            results.push(TransferResult {
                file_name: entry.file_name().to_string(),
                outcome,
            });
        }

        TransferReport {
            mode: self.mode,
            total,
            results,
            cancelled,
            duration: start.elapsed(),
        }
    }

    /// Run the transfer on a worker thread.
    ///
    /// Takes ownership of the entries so the run is unaffected by later changes to the caller's list.
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be started.
    pub fn spawn<S>(self, entries: Vec<FileEntry>, mut sink: S) -> Result<JoinHandle<TransferReport>>
    where
        S: ProgressSink + Send + 'static,
    {
        thread::Builder::new()
            .name("transfer".to_string())
            .spawn(move || self.run(&entries, &mut sink))
            .context("Failed to start transfer thread")
    }

    /// Transfer a single entry and return its destination path.
    fn transfer(&self, entry: &FileEntry) -> Result<PathBuf> {
        let source = self.source_root.join(entry.file_name());
        let target_folder = entry.target_folder();

        fs::create_dir_all(target_folder)
            .with_context(|| format!("Failed to create directory {}", target_folder.display()))?;

        let destination = entry.destination_path();
        if destination.exists() && is_same_file(&source, &destination) {
            return match self.mode {
                TransferMode::Copy => {
                    anyhow::bail!("Source and destination are the same file: {}", source.display())
                }
                TransferMode::Move => Ok(destination),
            };
        }

        match self.mode {
            TransferMode::Copy => copy_file(&source, &destination)?,
            TransferMode::Move => move_file(&source, &destination)?,
        }

        Ok(destination)
    }
}

/// Copy a file, overwriting the destination.
///
/// Data is written to a temporary file next to the destination which replaces it only after the copy succeeds,
/// so a failed copy leaves an existing destination untouched.
fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let mut reader = fs::File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    let metadata = reader
        .metadata()
        .with_context(|| format!("Failed to read {}", source.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("Not a file: {}", source.display());
    }

    let folder = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(folder)
        .with_context(|| format!("Failed to create temporary file in {}", folder.display()))?;

    io::copy(&mut reader, &mut temp_file).with_context(|| format!("Failed to copy to {}", destination.display()))?;
    temp_file
        .as_file()
        .set_permissions(metadata.permissions())
        .with_context(|| format!("Failed to set permissions for {}", destination.display()))?;

    temp_file
        .persist(destination)
        .map_err(|error| error.error)
        .with_context(|| format!("Failed to replace {}", destination.display()))?;
    Ok(())
}

/// Move a file, overwriting the destination.
/// Falls back to copy and delete across file systems.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            copy_file(source, destination)?;
            fs::remove_file(source).with_context(|| format!("Failed to remove {} after copy", source.display()))
        }
        Err(error) => Err(error).with_context(|| format!("Failed to move to {}", destination.display())),
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
