//! Persistent key-value settings stored in the user config file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml_edit::{DocumentMut, Item};

pub const FOLDERS_SECTION: &str = "Folders";
pub const SOURCE_FOLDER_KEY: &str = "SourceFolder";
pub const DESTINATION_FOLDER_KEY: &str = "DestinationFolder";

/// String settings addressed by section and key.
pub trait SettingsStore {
    /// Read a value, returning `default` if the section or key is missing.
    fn read(&self, section: &str, key: &str, default: &str) -> String;

    /// Write a value and persist it.
    ///
    /// # Errors
    /// Returns an error if the settings cannot be saved.
    fn write(&mut self, section: &str, key: &str, value: &str) -> Result<()>;
}

/// Settings kept in a TOML file.
///
/// Edits keep the formatting and comments of everything else in the file.
#[derive(Debug)]
pub struct TomlSettings {
    path: PathBuf,
    document: DocumentMut,
}

impl TomlSettings {
    /// Load settings from the given file.
    /// A missing file starts out empty and is created on the first write.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(content) => content
                .parse::<DocumentMut>()
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?,
            Err(error) if error.kind() == io::ErrorKind::NotFound => DocumentMut::new(),
            Err(error) => {
                return Err(error).with_context(|| format!("Failed to read settings file {}", path.display()));
            }
        };
        Ok(Self { path, document })
    }

    /// Load settings from the user config file.
    ///
    /// # Errors
    /// Returns an error if the home directory is unknown or the file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        let path = crate::config_path().context("Failed to get home directory for settings file")?;
        Self::open(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
        }
        fs::write(&self.path, self.document.to_string())
            .with_context(|| format!("Failed to write settings file {}", self.path.display()))
    }
}

impl SettingsStore for TomlSettings {
    fn read(&self, section: &str, key: &str, default: &str) -> String {
        self.document
            .get(section)
            .and_then(|table| table.get(key))
            .and_then(Item::as_str)
            .map_or_else(|| default.to_string(), ToString::to_string)
    }

    fn write(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        if !self.document.get(section).is_some_and(Item::is_table_like) {
            self.document.insert(section, toml_edit::table());
        }
        self.document[section][key] = toml_edit::value(value);
        self.save()
    }
}

#[cfg(test)]
mod settings_tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_defaults() {
        let dir = tempdir().unwrap();
        let settings = TomlSettings::open(dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings.read(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "fallback"), "fallback");
    }

    #[test]
    fn written_value_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = TomlSettings::open(&path).unwrap();
        settings
            .write(FOLDERS_SECTION, DESTINATION_FOLDER_KEY, "/media/TV")
            .unwrap();
        assert_eq!(settings.read(FOLDERS_SECTION, DESTINATION_FOLDER_KEY, ""), "/media/TV");

        let reopened = TomlSettings::open(&path).unwrap();
        assert_eq!(reopened.read(FOLDERS_SECTION, DESTINATION_FOLDER_KEY, ""), "/media/TV");
        assert_eq!(reopened.read(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "none"), "none");
    }

    #[test]
    fn write_creates_a_regular_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = TomlSettings::open(&path).unwrap();
        settings.write(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "/downloads").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[Folders]"));
        assert!(content.contains(r#"SourceFolder = "/downloads""#));
    }

    #[test]
    fn write_keeps_other_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "# user comment\n[mediasort]\ncopy = true\n\n[Folders]\nSourceFolder = \"/old\"\n",
        )
        .unwrap();

        let mut settings = TomlSettings::open(&path).unwrap();
        settings.write(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "/new").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# user comment"));
        assert!(content.contains("copy = true"));
        assert!(content.contains(r#"SourceFolder = "/new""#));
        assert!(!content.contains("/old"));
    }

    #[test]
    fn non_string_value_reads_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[Folders]\nSourceFolder = 5\n").unwrap();

        let settings = TomlSettings::open(&path).unwrap();
        assert_eq!(settings.read(FOLDERS_SECTION, SOURCE_FOLDER_KEY, "default"), "default");
    }

    #[test]
    fn invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(TomlSettings::open(&path).is_err());
    }
}
