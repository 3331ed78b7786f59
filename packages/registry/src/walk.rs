//! Directory traversal that produces a fresh set of registry entries.
//!
//! Symbolic links are never followed: a link anywhere below the root is
//! counted in [`WalkReport::skipped_symlinks`] and otherwise ignored, so every
//! entry is backed by a regular file physically inside the root.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;

use crate::error::WalkError;
use crate::options::RegistryOptions;
use crate::path::CanonicalPath;

/// What a filter gets to see about a candidate file.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo<'a> {
    /// The key the file will be stored under.
    pub key: &'a CanonicalPath,
    /// The file's location on disk.
    pub path: &'a Path,
    /// Size in bytes as reported by the file system.
    pub len: u64,
}

/// Decides which files a walk loads.
///
/// Rejected files are skipped quietly; they are not failures.
pub trait WalkFilter {
    fn accept(&self, file: &FileInfo<'_>) -> bool;
}

impl<F> WalkFilter for F
where
    F: Fn(&FileInfo<'_>) -> bool,
{
    fn accept(&self, file: &FileInfo<'_>) -> bool {
        self(file)
    }
}

/// Why a file was left out of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A directory below the root could not be listed.
    Traverse,
    /// The file could not be opened or read.
    Read,
    /// The file's name cannot be turned into a registry key.
    Key,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Traverse => write!(f, "traverse"),
            FailureKind::Read => write!(f, "read"),
            FailureKind::Key => write!(f, "key"),
        }
    }
}

/// A file or directory the walk had to give up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Summary of a completed walk.
#[derive(Debug, Clone, Default)]
pub struct WalkReport {
    /// Generation assigned to the snapshot this walk built.
    pub generation: u64,
    /// Number of files loaded.
    pub files: usize,
    /// Total bytes loaded.
    pub bytes: u64,
    pub skipped_filtered: usize,
    pub skipped_symlinks: usize,
    pub skipped_oversized: usize,
    /// Sockets, FIFOs, devices and the like.
    pub skipped_special: usize,
    pub failures: Vec<WalkFailure>,
    /// False if a newer walk had already published by the time this one
    /// finished, in which case this walk's entries were discarded.
    pub published: bool,
    pub elapsed: Duration,
}

impl WalkReport {
    /// True when every file under the root was either loaded or
    /// deliberately skipped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub(crate) struct Scan {
    pub entries: HashMap<CanonicalPath, Bytes>,
    pub report: WalkReport,
}

/// Load every regular file under `root`.
///
/// `cancelled` is polled before each directory entry is processed.
pub(crate) fn scan(
    root: &Path,
    options: &RegistryOptions,
    filter: Option<&dyn WalkFilter>,
    cancelled: &dyn Fn() -> bool,
) -> Result<Scan, WalkError> {
    let mut entries = HashMap::new();
    let mut report = WalkReport::default();

    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        if cancelled() {
            return Err(WalkError::Cancelled);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(WalkError::RootInaccessible {
                    path: root.to_path_buf(),
                    source: error,
                });
            }
            Err(error) => {
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                log::warn!("Skipping unreadable directory {}: {}", path.display(), error);
                report.failures.push(WalkFailure {
                    path,
                    kind: FailureKind::Traverse,
                    message: error.to_string(),
                });
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            log::debug!("Not following symlink {}", entry.path().display());
            report.skipped_symlinks += 1;
            continue;
        }
        if !file_type.is_file() {
            report.skipped_special += 1;
            continue;
        }

        let absolute_path = entry.path();
        let key = match absolute_path
            .strip_prefix(root)
            .map_err(|e| e.to_string())
            .and_then(|relative| CanonicalPath::from_relative(relative).map_err(|e| e.to_string()))
        {
            Ok(key) if options.fold_case => key.folded(),
            Ok(key) => key,
            Err(message) => {
                log::warn!("Skipping {}: {}", absolute_path.display(), message);
                report.failures.push(WalkFailure {
                    path: absolute_path.to_path_buf(),
                    kind: FailureKind::Key,
                    message,
                });
                continue;
            }
        };

        let len = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                record_read_failure(&mut report, absolute_path, error.to_string());
                continue;
            }
        };

        let info = FileInfo {
            key: &key,
            path: absolute_path,
            len,
        };
        if filter.is_some_and(|filter| !filter.accept(&info)) {
            report.skipped_filtered += 1;
            continue;
        }

        if options.max_file_size.is_some_and(|max| len > max) {
            log::debug!("Skipping oversized file {} ({} bytes)", absolute_path.display(), len);
            report.skipped_oversized += 1;
            continue;
        }

        log::debug!("Loading {}...", absolute_path.display());
        let data = match fs::read(absolute_path) {
            Ok(data) => data,
            Err(error) => {
                record_read_failure(&mut report, absolute_path, error.to_string());
                continue;
            }
        };

        report.files += 1;
        report.bytes += data.len() as u64;
        if let Some(previous) = entries.insert(key, Bytes::from(data)) {
            // Only reachable with case folding, when two names differ by case.
            log::warn!(
                "{} collides with an earlier file; keeping the later one",
                absolute_path.display()
            );
            report.files -= 1;
            report.bytes -= previous.len() as u64;
        }
    }

    Ok(Scan { entries, report })
}

fn record_read_failure(report: &mut WalkReport, path: &Path, message: String) {
    log::warn!("Skipping unreadable file {}: {}", path.display(), message);
    report.failures.push(WalkFailure {
        path: path.to_path_buf(),
        kind: FailureKind::Read,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never() -> bool {
        false
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn scan_loads_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "html/index.html", b"<html></html>");
        write(dir.path(), "css/site.css", b"body {}");
        write(dir.path(), "manifest.json", b"{}");
        fs::create_dir(dir.path().join("empty")).unwrap();

        let scan = scan(dir.path(), &RegistryOptions::default(), None, &never).unwrap();

        assert_eq!(scan.entries.len(), 3);
        assert_eq!(scan.report.files, 3);
        assert_eq!(scan.report.bytes, 13 + 7 + 2);
        assert!(scan.report.is_complete());
        let key = CanonicalPath::parse("html/index.html").unwrap();
        assert_eq!(scan.entries[&key], Bytes::from_static(b"<html></html>"));
    }

    #[test]
    fn filter_rejections_are_not_failures() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.css", b"a");
        write(dir.path(), "drop.tmp", b"b");

        let only_css = |file: &FileInfo<'_>| file.key.extension() == Some("css");
        let scan = scan(
            dir.path(),
            &RegistryOptions::default(),
            Some(&only_css as &dyn WalkFilter),
            &never,
        )
        .unwrap();

        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.report.skipped_filtered, 1);
        assert!(scan.report.is_complete());
    }

    #[test]
    fn oversized_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "small.txt", b"abc");
        write(dir.path(), "large.txt", &[0u8; 64]);

        let options = RegistryOptions::default().with_max_file_size(16);
        let scan = scan(dir.path(), &options, None, &never).unwrap();

        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.report.skipped_oversized, 1);
    }

    #[test]
    fn cancellation_stops_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"a");

        let result = scan(dir.path(), &RegistryOptions::default(), None, &|| true);
        assert!(matches!(result, Err(WalkError::Cancelled)));
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("gone");

        let result = scan(&root, &RegistryOptions::default(), None, &never);
        assert!(matches!(result, Err(WalkError::RootInaccessible { .. })));
    }

    #[test]
    fn case_folding_collapses_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "HTML/Index.html", b"upper");

        let options = RegistryOptions::default().with_fold_case(true);
        let scan = scan(dir.path(), &options, None, &never).unwrap();

        let key = CanonicalPath::parse("html/index.html").unwrap();
        assert_eq!(scan.entries[&key], Bytes::from_static(b"upper"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.txt", b"secret");

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "public.txt", b"public");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked_dir")).unwrap();

        let scan = scan(dir.path(), &RegistryOptions::default(), None, &never).unwrap();

        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.report.skipped_symlinks, 2);
        assert!(scan
            .entries
            .values()
            .all(|content| content.as_ref() != b"secret"));
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(FailureKind::Traverse.to_string(), "traverse");
        assert_eq!(FailureKind::Read.to_string(), "read");
        assert_eq!(FailureKind::Key.to_string(), "key");
    }
}
