//! Destination folder resolution from episode file names.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context;
use regex::{Regex, RegexBuilder};

/// Series name, whitespace, then a season and episode marker like `S01E02`.
///
/// The series group is non-greedy so it stops at the first marker from the left.
pub const EPISODE_PATTERN: &str = r"^(?<series>.+?)\s+s\d+e\d+";

/// Name of the capture group holding the series name.
pub const SERIES_GROUP: &str = "series";

static RE_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(EPISODE_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("Failed to create regex pattern for episode names")
});

/// Resolve the destination folder for a file name using the default episode naming convention.
///
/// Matching names go to `destination_root/<series name>`,
/// everything else goes directly to `destination_root`.
/// The series folder name is composed to Unicode NFC.
///
/// ```rust
/// use std::path::Path;
/// use media_sorter::organize::resolve;
///
/// let target = resolve("Breaking Bad S01E02.mkv", Path::new("/dest"));
/// assert_eq!(target, Path::new("/dest/Breaking Bad"));
///
/// let target = resolve("random_movie.mp4", Path::new("/dest"));
/// assert_eq!(target, Path::new("/dest"));
/// ```
#[must_use]
pub fn resolve(file_name: &str, destination_root: &Path) -> PathBuf {
    resolve_with(&RE_EPISODE, file_name, destination_root)
}

/// Naming convention used to extract a series name from a file name.
#[derive(Debug, Clone)]
pub struct NamingConvention {
    regex: Regex,
}

impl NamingConvention {
    /// Compile a custom naming convention.
    ///
    /// The pattern is matched case-insensitively and must contain a named group `series`.
    ///
    /// # Errors
    /// Returns an error if the pattern is not a valid regex or has no `series` group.
    pub fn new(pattern: &str) -> anyhow::Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid naming pattern: {pattern}"))?;

        if !regex.capture_names().flatten().any(|name| name == SERIES_GROUP) {
            anyhow::bail!("Naming pattern must contain a named group '{SERIES_GROUP}': {pattern}");
        }

        Ok(Self { regex })
    }

    /// The regex pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Extract the series name from a file name.
    #[must_use]
    pub fn series_name<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        series_name(&self.regex, file_name)
    }

    /// Resolve the destination folder for the given file name.
    #[must_use]
    pub fn resolve(&self, file_name: &str, destination_root: &Path) -> PathBuf {
        resolve_with(&self.regex, file_name, destination_root)
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            regex: RE_EPISODE.clone(),
        }
    }
}

fn series_name<'a>(regex: &Regex, file_name: &'a str) -> Option<&'a str> {
    let name = regex.captures(file_name)?.name(SERIES_GROUP)?.as_str().trim();
    // Anything that would escape the destination root counts as no match
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

fn resolve_with(regex: &Regex, file_name: &str, destination_root: &Path) -> PathBuf {
    series_name(regex, file_name).map_or_else(
        || destination_root.to_path_buf(),
        |series| destination_root.join(crate::normalize_name(series)),
    )
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn matching_name_goes_to_series_folder() {
        assert_eq!(
            resolve("Breaking Bad S01E02.mkv", Path::new("/dest")),
            Path::new("/dest/Breaking Bad")
        );
    }

    #[test]
    fn non_matching_name_goes_to_root() {
        assert_eq!(resolve("random_movie.mp4", Path::new("/dest")), Path::new("/dest"));
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert_eq!(
            resolve("the office s03e11.mp4", Path::new("/dest")),
            Path::new("/dest/the office")
        );
        assert_eq!(resolve("Dark S1E2.mkv", Path::new("/dest")), Path::new("/dest/Dark"));
    }

    #[test]
    fn only_first_marker_counts() {
        assert_eq!(
            resolve("Show S01E01 Recap S02E03.mkv", Path::new("/dest")),
            Path::new("/dest/Show")
        );
    }

    #[test]
    fn name_without_extension() {
        assert_eq!(resolve("Fargo S02E05", Path::new("/dest")), Path::new("/dest/Fargo"));
    }

    #[test]
    fn series_name_is_trimmed() {
        assert_eq!(
            resolve("  Better Call Saul   S04E01.mkv", Path::new("/dest")),
            Path::new("/dest/Better Call Saul")
        );
    }

    #[test]
    fn leading_tokens_are_kept() {
        assert_eq!(
            resolve("[Group] Severance S01E01.mkv", Path::new("/dest")),
            Path::new("/dest/[Group] Severance")
        );
    }

    #[test]
    fn marker_requires_whitespace_before_it() {
        assert_eq!(resolve("Show.Name.S01E01.mkv", Path::new("/dest")), Path::new("/dest"));
        assert_eq!(resolve("ShowS01E01.mkv", Path::new("/dest")), Path::new("/dest"));
        assert_eq!(resolve("Show S01 E01.mkv", Path::new("/dest")), Path::new("/dest"));
    }

    #[test]
    fn marker_must_not_start_the_name() {
        assert_eq!(resolve("S01E01.mkv", Path::new("/dest")), Path::new("/dest"));
        assert_eq!(resolve("  S01E01.mkv", Path::new("/dest")), Path::new("/dest"));
    }

    #[test]
    fn dot_names_never_escape_root() {
        assert_eq!(resolve(".. S01E01.mkv", Path::new("/dest")), Path::new("/dest"));
        assert_eq!(resolve(". S01E01.mkv", Path::new("/dest")), Path::new("/dest"));
    }

    #[test]
    fn decomposed_series_name_is_composed() {
        let expected = Path::new("/dest").join("H\u{00e4}agen");
        assert_eq!(resolve("Ha\u{0308}agen S01E01.mkv", Path::new("/dest")), expected);
        assert_eq!(resolve("H\u{00e4}agen S01E01.mkv", Path::new("/dest")), expected);
        assert_eq!(
            NamingConvention::default().resolve("Ha\u{0308}agen S01E01.mkv", Path::new("/dest")),
            expected
        );
    }

    #[test]
    fn empty_root_is_passed_through() {
        assert_eq!(resolve("Lost S01E01.mkv", Path::new("")), Path::new("Lost"));
        assert_eq!(resolve("movie.mkv", Path::new("")), Path::new(""));
    }

    #[test]
    fn resolving_twice_gives_same_result() {
        let root = Path::new("/dest");
        let first = resolve("Chernobyl S01E03.mkv", root);
        let second = resolve("Chernobyl S01E03.mkv", root);
        assert_eq!(first, second);
    }

    #[test]
    fn default_convention_matches_free_function() {
        let convention = NamingConvention::default();
        assert_eq!(convention.as_str(), EPISODE_PATTERN);
        for name in ["Breaking Bad S01E02.mkv", "random_movie.mp4", "Dark S1E2.mkv"] {
            assert_eq!(
                convention.resolve(name, Path::new("/dest")),
                resolve(name, Path::new("/dest"))
            );
        }
    }

    #[test]
    fn custom_convention_uses_series_group() {
        let convention = NamingConvention::new(r"^(?<series>.+?)\s+-\s+\d+x\d+").unwrap();
        assert_eq!(convention.series_name("Twin Peaks - 1x03.mkv"), Some("Twin Peaks"));
        assert_eq!(
            convention.resolve("TWIN PEAKS - 2X01.mkv", Path::new("/dest")),
            Path::new("/dest/TWIN PEAKS")
        );
        assert_eq!(convention.series_name("Twin Peaks S01E03.mkv"), None);
    }

    #[test]
    fn custom_convention_without_series_group_is_rejected() {
        assert!(NamingConvention::new(r"^(.+?)\s+s\d+e\d+").is_err());
    }

    #[test]
    fn invalid_custom_convention_is_rejected() {
        assert!(NamingConvention::new(r"^(?<series>.+?").is_err());
    }
}
