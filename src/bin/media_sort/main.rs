mod config;
mod logger;
mod media_sort;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::config::Config;
use crate::media_sort::MediaSort;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Copy or move TV episodes into per-series folders"
)]
pub struct Args {
    /// Source directory, defaults to the saved folder or the current directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    source: Option<PathBuf>,

    /// Destination root directory, defaults to the saved folder
    #[arg(short, long, value_hint = clap::ValueHint::DirPath, name = "DESTINATION")]
    dest: Option<PathBuf>,

    /// Include all files regardless of extension
    #[arg(short, long)]
    all: bool,

    /// Copy files instead of moving them
    #[arg(short, long)]
    copy: bool,

    /// Print debug information
    #[arg(short = 'D', long)]
    debug: bool,

    /// File extensions to include by default
    #[arg(short, long, num_args = 1, action = clap::ArgAction::Append, name = "EXTENSION")]
    extension: Vec<String>,

    /// Include files that contain the given pattern
    #[arg(short = 'n', long, num_args = 1, action = clap::ArgAction::Append, name = "INCLUDE")]
    include: Vec<String>,

    /// Exclude files that contain the given pattern
    #[arg(short = 'x', long, num_args = 1, action = clap::ArgAction::Append, name = "EXCLUDE")]
    exclude: Vec<String>,

    /// Naming pattern regex with a named group "series"
    #[arg(short = 'g', long, name = "REGEX")]
    pattern: Option<String>,

    /// Write a transfer log file
    #[arg(short = 'L', long)]
    log: bool,

    /// Only print changes without transferring files
    #[arg(short, long)]
    print: bool,

    /// Save the source and destination folders as defaults
    #[arg(short, long)]
    save: bool,

    /// Transfer without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Some(ref shell) = args.completion {
        media_sorter::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        let config = Config::from_args(args)?;
        MediaSort::new(config)?.run()
    }
}
