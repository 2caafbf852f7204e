use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use itertools::Itertools;
use serde::Deserialize;

use media_sorter::organize::{ExtensionPolicy, NamingConvention, TransferMode};

use crate::Args;

/// Final config combined from CLI arguments and user config file.
#[derive(Debug)]
pub struct Config {
    pub(crate) auto: bool,
    pub(crate) convention: NamingConvention,
    pub(crate) debug: bool,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) dryrun: bool,
    pub(crate) exclude: Vec<String>,
    pub(crate) include: Vec<String>,
    pub(crate) log: bool,
    pub(crate) mode: TransferMode,
    pub(crate) policy: ExtensionPolicy,
    pub(crate) save: bool,
    pub(crate) source: Option<PathBuf>,
    pub(crate) verbose: bool,
}

/// Config from the user config file
#[derive(Debug, Default, Deserialize)]
struct MediaSortConfig {
    #[serde(default)]
    all: bool,
    #[serde(default)]
    auto: bool,
    #[serde(default)]
    copy: bool,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    dryrun: bool,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    log: bool,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    verbose: bool,
}

/// Wrapper needed for parsing the user config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    mediasort: MediaSortConfig,
}

impl MediaSortConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    fn get_user_config() -> anyhow::Result<Self> {
        let Some(path) = media_sorter::config_path() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.mediasort)
            .context("Failed to parse mediasort config TOML")
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or parsed,
    /// or if the naming pattern is invalid.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let user_config = MediaSortConfig::get_user_config()?;
        Self::from_args_and_user_config(args, user_config)
    }

    fn from_args_and_user_config(args: Args, user_config: MediaSortConfig) -> anyhow::Result<Self> {
        let include: Vec<String> = user_config.include.into_iter().chain(args.include).unique().collect();
        let exclude: Vec<String> = user_config.exclude.into_iter().chain(args.exclude).unique().collect();

        // Extensions: args > config > default
        let policy = if args.all || user_config.all {
            ExtensionPolicy::all()
        } else if !args.extension.is_empty() {
            ExtensionPolicy::new(&args.extension)
        } else if !user_config.extensions.is_empty() {
            ExtensionPolicy::new(&user_config.extensions)
        } else {
            ExtensionPolicy::default()
        };

        let convention = match args.pattern.or(user_config.pattern) {
            Some(pattern) if !pattern.trim().is_empty() => NamingConvention::new(pattern.trim())?,
            _ => NamingConvention::default(),
        };

        Ok(Self {
            auto: args.yes || user_config.auto,
            convention,
            debug: args.debug || user_config.debug,
            destination: args.dest,
            dryrun: args.print || user_config.dryrun,
            exclude,
            include,
            log: args.log || user_config.log,
            mode: TransferMode::from_copy_flag(args.copy || user_config.copy),
            policy,
            save: args.save,
            source: args.source,
            verbose: args.verbose || user_config.verbose,
        })
    }
}
