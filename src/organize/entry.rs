//! Source file listing and per-file destination metadata.

use std::path::{Path, PathBuf};

use anyhow::Context;
use itertools::Itertools;
use walkdir::WalkDir;

use crate::organize::NamingConvention;

/// Extensions included by default when nothing else is configured.
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["mkv", "mp4"];

/// Extension entry that includes every file.
pub const WILDCARD_EXTENSION: &str = "*";

/// Decides which files are included by default based on their extension.
///
/// Extensions are compared case-insensitively and may be given with or without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPolicy {
    extensions: Vec<String>,
    include_all: bool,
}

/// A single source file and where it should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    file_name: String,
    target_folder: PathBuf,
    include: bool,
}

/// Files found in the source directory with their resolved target folders.
///
/// Target folders always reflect the current destination root:
/// changing the root recomputes every entry.
#[derive(Debug, Clone)]
pub struct FileList {
    source_root: PathBuf,
    destination_root: PathBuf,
    convention: NamingConvention,
    policy: ExtensionPolicy,
    entries: Vec<FileEntry>,
}

impl ExtensionPolicy {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|extension| extension.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|extension| !extension.is_empty())
            .unique()
            .collect();

        let include_all = extensions.iter().any(|extension| extension == WILDCARD_EXTENSION);

        Self {
            extensions,
            include_all,
        }
    }

    /// Policy that includes every file.
    #[must_use]
    pub fn all() -> Self {
        Self::new([WILDCARD_EXTENSION])
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns true if a file with this name should be included by default.
    #[must_use]
    pub fn includes(&self, file_name: &str) -> bool {
        if self.include_all {
            return true;
        }
        let extension = crate::path_to_file_extension_string(Path::new(file_name));
        !extension.is_empty() && self.extensions.contains(&extension)
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl FileEntry {
    #[must_use]
    pub fn new(file_name: impl Into<String>, target_folder: impl Into<PathBuf>, include: bool) -> Self {
        Self {
            file_name: file_name.into(),
            target_folder: target_folder.into(),
            include,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn target_folder(&self) -> &Path {
        &self.target_folder
    }

    #[must_use]
    pub const fn include(&self) -> bool {
        self.include
    }

    /// Full destination path for this file.
    #[must_use]
    pub fn destination_path(&self) -> PathBuf {
        self.target_folder.join(&self.file_name)
    }
}

impl FileList {
    /// Create an empty list. Call [`FileList::scan`] to populate it.
    #[must_use]
    pub const fn new(
        source_root: PathBuf,
        destination_root: PathBuf,
        convention: NamingConvention,
        policy: ExtensionPolicy,
    ) -> Self {
        Self {
            source_root,
            destination_root,
            convention,
            policy,
            entries: Vec::new(),
        }
    }

    /// Rebuild the list from the files directly under the source root.
    ///
    /// Subdirectories are not traversed.
    /// Entries are ordered by file name, ignoring case.
    ///
    /// # Errors
    /// Returns an error if the source root is not a readable directory.
    pub fn scan(&mut self) -> anyhow::Result<()> {
        if !self.source_root.is_dir() {
            anyhow::bail!("Source is not a directory: {}", self.source_root.display());
        }
        std::fs::read_dir(&self.source_root)
            .with_context(|| format!("Failed to read source directory: {}", self.source_root.display()))?;

        let file_names: Vec<String> = WalkDir::new(&self.source_root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| crate::path_to_filename_string(entry.path()))
            .filter(|name| !name.is_empty())
            .sorted_by_key(|name| name.to_lowercase())
            .collect();

        self.entries.clear();
        for file_name in file_names {
            self.add_file(file_name);
        }
        Ok(())
    }

    /// Change the destination root and recompute every target folder.
    pub fn set_destination_root(&mut self, destination_root: PathBuf) {
        self.destination_root = destination_root;
        for entry in &mut self.entries {
            entry.target_folder = Self::target_folder(&self.convention, &entry.file_name, &self.destination_root);
        }
    }

    /// Toggle inclusion for the entry at `index`.
    /// Returns false if there is no such entry.
    pub fn set_include(&mut self, index: usize, include: bool) -> bool {
        self.entries.get_mut(index).is_some_and(|entry| {
            entry.include = include;
            true
        })
    }

    /// Set inclusion for all entries whose name contains `pattern`, ignoring case.
    /// Returns the number of matching entries.
    pub fn set_include_matching(&mut self, pattern: &str, include: bool) -> usize {
        let pattern = pattern.to_lowercase();
        let mut count = 0;
        for entry in &mut self.entries {
            if entry.file_name.to_lowercase().contains(&pattern) {
                entry.include = include;
                count += 1;
            }
        }
        count
    }

    /// Copy of the included entries in list order, for handing to a transfer run.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FileEntry> {
        self.entries.iter().filter(|entry| entry.include).cloned().collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    #[must_use]
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    #[must_use]
    pub fn included_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.include).count()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add_file(&mut self, file_name: String) {
        let target_folder = Self::target_folder(&self.convention, &file_name, &self.destination_root);
        let include = self.policy.includes(&file_name);
        self.entries.push(FileEntry {
            file_name,
            target_folder,
            include,
        });
    }

    fn target_folder(convention: &NamingConvention, file_name: &str, destination_root: &Path) -> PathBuf {
        convention.resolve(file_name, destination_root)
    }
}
