use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use media_sorter::organize::{TransferOutcome, TransferReport};

use crate::config::Config;

/// Transfer log with buffered writes
pub struct TransferLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TransferLog {
    /// Create a new log file at ~/logs/media-sorter/transfer_<timestamp>.log
    pub(crate) fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Self::in_directory(&home_dir.join("logs").join(env!("CARGO_PKG_NAME")))
    }

    fn in_directory(log_dir: &Path) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let path = log_dir.join(format!("transfer_{}.log", Local::now().format("%Y-%m-%d_%H-%M-%S")));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log the run settings before the first transfer
    pub(crate) fn log_init(&mut self, config: &Config, source: &Path, destination: &Path, total: usize) {
        let _ = writeln!(
            self.writer,
            "[{}] INIT {} {total} file(s)",
            Self::timestamp(),
            config.mode.as_str().to_uppercase()
        );
        let _ = writeln!(self.writer, "  source: \"{}\"", source.display());
        let _ = writeln!(self.writer, "  destination: \"{}\"", destination.display());
        let _ = writeln!(self.writer, "  pattern: {}", config.convention.as_str());
        let _ = writeln!(self.writer, "  extensions: {:?}", config.policy.extensions());
        if !config.include.is_empty() {
            let _ = writeln!(self.writer, "  include: {:?}", config.include);
        }
        if !config.exclude.is_empty() {
            let _ = writeln!(self.writer, "  exclude: {:?}", config.exclude);
        }
        let _ = self.writer.flush();
    }

    /// Log every attempted file and the final statistics
    pub(crate) fn log_report(&mut self, report: &TransferReport) {
        let num_digits = report.total.to_string().chars().count();
        for (index, result) in report.results.iter().enumerate() {
            let file_index = format!("[{:>width$}/{}]", index + 1, report.total, width = num_digits);
            match &result.outcome {
                TransferOutcome::Transferred { destination } => {
                    let _ = writeln!(
                        self.writer,
                        "[{}] SUCCESS {} {file_index} - \"{}\" -> \"{}\"",
                        Self::timestamp(),
                        report.mode.as_str().to_uppercase(),
                        result.file_name,
                        destination.display()
                    );
                }
                TransferOutcome::Failed { error } => {
                    let _ = writeln!(
                        self.writer,
                        "[{}] ERROR   {} {file_index} - \"{}\" | {error}",
                        Self::timestamp(),
                        report.mode.as_str().to_uppercase(),
                        result.file_name,
                    );
                }
            }
        }

        let _ = writeln!(self.writer, "[{}] STATISTICS", Self::timestamp());
        let _ = writeln!(self.writer, "  Files transferred: {}", report.succeeded());
        let _ = writeln!(self.writer, "  Files failed:      {}", report.failed());
        if report.cancelled {
            let _ = writeln!(self.writer, "  Not processed:     {}", report.skipped());
        }
        let _ = writeln!(
            self.writer,
            "  Total time: {}",
            media_sorter::format_duration(report.duration)
        );
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}
