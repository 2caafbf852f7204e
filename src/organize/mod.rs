//! Sort episode files into per-series folders.
//!
//! Resolution maps a file name to its target folder,
//! the file list tracks what was found in the source directory,
//! and the transfer engine copies or moves the included files.

mod entry;
mod resolve;
mod transfer;

pub use entry::{DEFAULT_EXTENSIONS, ExtensionPolicy, FileEntry, FileList, WILDCARD_EXTENSION};
pub use resolve::{EPISODE_PATTERN, NamingConvention, SERIES_GROUP, resolve};
pub use transfer::{
    CallbackSink, CancelToken, ProgressSink, TransferEngine, TransferMode, TransferOutcome, TransferReport,
    TransferResult,
};
