//! Discovery of lossless source files under a source root.
//!
//! Recursively walks the root, skipping hidden directories, and keeps regular
//! files whose extension is in the configured set.

use audio_fanout_config::DiscoveryConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Raised when a walk finds nothing to convert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No lossless files found under {}", .root.display())]
pub struct EmptyDiscovery {
    pub root: PathBuf,
}

/// Extension matcher built from the discovery configuration.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    case_sensitive: bool,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim_start_matches('.');
                if case_sensitive {
                    e.to_string()
                } else {
                    e.to_lowercase()
                }
            })
            .collect();
        Self {
            extensions,
            case_sensitive,
        }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self::new(&cfg.extensions, cfg.case_sensitive)
    }

    /// Returns the configured extension this path matches, if any.
    pub fn matching_extension(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        let found = if self.case_sensitive {
            self.extensions.iter().find(|e| e.as_str() == ext)
        } else {
            let ext = ext.to_lowercase();
            self.extensions.iter().find(|e| **e == ext)
        };
        found.map(String::as_str)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

/// Files found under a source root, with per-extension counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub files: Vec<PathBuf>,
    /// Only extensions with at least one match appear here
    pub counts: BTreeMap<String, usize>,
}

impl DiscoveryReport {
    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn count(&self, extension: &str) -> usize {
        self.counts.get(extension).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

/// Walks `root` and collects every file accepted by `filter`.
///
/// Hidden entries below the root (files such as `._01.flac` and directories
/// alike) are ignored. Symlinked files and directories are followed; link
/// loops and other unreadable entries are logged and skipped. Order is
/// deterministic (sorted by name at each level).
pub fn discover(root: &Path, filter: &ExtensionFilter) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        // The root itself may be hidden
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = filter.matching_extension(path) else {
            continue;
        };

        debug!(path = %path.display(), "discovered");
        *report.counts.entry(ext.to_string()).or_insert(0) += 1;
        report.files.push(path.to_path_buf());
    }

    report
}

/// Like [`discover`], but an empty result is an error.
///
/// Logs the per-extension counts when files were found.
pub fn discover_nonempty(
    root: &Path,
    filter: &ExtensionFilter,
) -> Result<DiscoveryReport, EmptyDiscovery> {
    let report = discover(root, filter);
    if report.is_empty() {
        return Err(EmptyDiscovery {
            root: root.to_path_buf(),
        });
    }

    for (ext, count) in &report.counts {
        info!("Number of {} files: {}", ext, count);
    }
    info!("Total number of files: {}", report.total());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
    }

    #[test]
    fn test_default_filter_recognizes_lossless_extensions() {
        let filter = ExtensionFilter::default();
        for ext in ["m4a", "flac", "dsf", "wav", "aif", "aiff"] {
            let path = PathBuf::from(format!("/music/track.{}", ext));
            assert_eq!(filter.matching_extension(&path), Some(ext));
        }
        assert_eq!(filter.matching_extension(Path::new("/music/track.mp3")), None);
        assert_eq!(filter.matching_extension(Path::new("/music/track")), None);
    }

    #[test]
    fn test_case_sensitivity_is_configurable() {
        let sensitive = ExtensionFilter::new(["flac"], true);
        assert_eq!(sensitive.matching_extension(Path::new("a.FLAC")), None);

        let insensitive = ExtensionFilter::new(["FLAC"], false);
        assert_eq!(insensitive.matching_extension(Path::new("a.FLAC")), Some("flac"));
        assert_eq!(insensitive.matching_extension(Path::new("a.flac")), Some("flac"));
    }

    #[test]
    fn test_leading_dot_in_config_is_ignored() {
        let filter = ExtensionFilter::new([".wav"], true);
        assert_eq!(filter.matching_extension(Path::new("x.wav")), Some("wav"));
    }

    #[test]
    fn test_discovery_counts_per_extension() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("a/one.flac"));
        touch(&root.join("a/two.flac"));
        touch(&root.join("b/c/three.flac"));
        touch(&root.join("b/four.m4a"));
        touch(&root.join("five.m4a"));
        touch(&root.join("six.wav"));
        touch(&root.join("a/seven.wav"));
        touch(&root.join("a/cover.jpg"));
        touch(&root.join("notes.txt"));

        let report = discover(root, &ExtensionFilter::default());

        assert_eq!(report.total(), 7);
        assert_eq!(report.count("flac"), 3);
        assert_eq!(report.count("m4a"), 2);
        assert_eq!(report.count("wav"), 2);
        assert_eq!(report.count("dsf"), 0);
        assert_eq!(report.counts.len(), 3);
    }

    #[test]
    fn test_directories_named_like_audio_are_not_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("album.flac")).unwrap();

        let report = discover(temp_dir.path(), &ExtensionFilter::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_discover_nonempty_reports_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("readme.txt"));

        let err = discover_nonempty(temp_dir.path(), &ExtensionFilter::default()).unwrap_err();
        assert_eq!(err.root, temp_dir.path());
    }

    #[test]
    fn test_missing_root_yields_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let report = discover(&temp_dir.path().join("absent"), &ExtensionFilter::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_appledouble_files_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("01.flac"));
        touch(&root.join("._01.flac"));
        touch(&root.join("album/._02.wav"));
        touch(&root.join("album/02.wav"));

        let report = discover(root, &ExtensionFilter::default());

        assert_eq!(report.files, vec![root.join("01.flac"), root.join("album/02.wav")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_and_directories_are_followed() {
        use std::os::unix::fs::symlink;

        let library = TempDir::new().unwrap();
        touch(&library.path().join("solo.flac"));
        touch(&library.path().join("album/t.flac"));

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        symlink(library.path().join("solo.flac"), root.join("solo.flac")).unwrap();
        symlink(library.path().join("album"), root.join("album")).unwrap();

        let report = discover(root, &ExtensionFilter::default());

        assert_eq!(report.files, vec![root.join("album/t.flac"), root.join("solo.flac")]);
        assert_eq!(report.count("flac"), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_does_not_hang() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a/one.flac"));
        std::os::unix::fs::symlink(root.join("a"), root.join("a/loop")).unwrap();

        let report = discover(root, &ExtensionFilter::default());

        assert_eq!(report.files, vec![root.join("a/one.flac")]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b.flac"));
        touch(&root.join("a.flac"));
        touch(&root.join("c.flac"));

        let report = discover(root, &ExtensionFilter::default());
        let names: Vec<_> = report
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.flac", "b.flac", "c.flac"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_hidden_directory_exclusion(
            visible_dir in "[a-zA-Z0-9]{1,10}",
            hidden_dir in "\\.[a-zA-Z0-9]{1,10}",
            filename in "[a-zA-Z0-9]{1,10}",
        ) {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();

            let visible = root.join(&visible_dir).join(format!("{}.flac", filename));
            touch(&visible);
            let hidden = root.join(&hidden_dir).join(format!("{}.flac", filename));
            touch(&hidden);
            let hidden_file = root.join(&visible_dir).join(format!("._{}.flac", filename));
            touch(&hidden_file);

            let report = discover(root, &ExtensionFilter::default());

            prop_assert!(report.files.contains(&visible));
            prop_assert!(!report.files.contains(&hidden));
            prop_assert!(!report.files.contains(&hidden_file));
            prop_assert_eq!(report.total(), 1);
        }

        #[test]
        fn prop_counts_sum_to_total(
            flac in 0usize..5,
            wav in 0usize..5,
            other in 0usize..5,
        ) {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();
            for i in 0..flac {
                touch(&root.join(format!("f{}.flac", i)));
            }
            for i in 0..wav {
                touch(&root.join(format!("sub/w{}.wav", i)));
            }
            for i in 0..other {
                touch(&root.join(format!("o{}.ogg", i)));
            }

            let report = discover(root, &ExtensionFilter::default());

            prop_assert_eq!(report.total(), flac + wav);
            prop_assert_eq!(report.counts.values().sum::<usize>(), report.total());
        }
    }
}
