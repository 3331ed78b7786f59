use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigurationError, WalkError};
use crate::options::RegistryOptions;
use crate::path::CanonicalPath;
use crate::walk::{self, WalkFilter, WalkReport};

/// One published, immutable view of the registry's content.
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: HashMap<CanonicalPath, Bytes>,
    generation: u64,
    bytes: u64,
}

impl Snapshot {
    pub fn get(&self, key: &CanonicalPath) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk generation that built this snapshot. Zero before the first walk.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Total size of all entries.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Counters describing the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub entries: usize,
    pub bytes: u64,
    pub generation: u64,
}

/// An in-memory copy of every file under a base directory.
///
/// Population is explicit: [`Registry::new`] only validates the base
/// directory, and [`Registry::walk`] loads it. Each walk builds a complete
/// new map and publishes it with a single atomic swap, replacing the previous
/// one wholesale, so files deleted from disk disappear from the registry on
/// the next walk and readers never see a half-built map.
///
/// Lookups are lock-free and never touch the disk. A `Registry` is meant to be
/// shared as `Arc<Registry>` between request handlers.
///
/// ```rust
/// use mediasrv_registry::{Registry, RegistryOptions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// std::fs::create_dir(dir.path().join("html"))?;
/// std::fs::write(dir.path().join("html/index.html"), "<html></html>")?;
///
/// let registry = Registry::new(dir.path(), RegistryOptions::default())?;
/// registry.walk(None)?;
///
/// assert_eq!(registry.get("/html/index.html").as_deref(), Some(&b"<html></html>"[..]));
/// assert!(registry.get("../../etc/passwd").is_none());
///
/// registry.close();
/// registry.close();
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    base_path: PathBuf,
    options: RegistryOptions,
    // `None` once closed.
    snapshot: ArcSwapOption<Snapshot>,
    last_generation: AtomicU64,
    closing: CancellationToken,
}

impl Registry {
    /// Bind a registry to `base_path`.
    ///
    /// The directory must exist and be listable. Nothing is loaded until
    /// [`Registry::walk`] is called.
    pub fn new(
        base_path: impl AsRef<Path>,
        options: RegistryOptions,
    ) -> Result<Registry, ConfigurationError> {
        let path = base_path.as_ref();

        let attr = fs::metadata(path).map_err(|source| ConfigurationError::Missing {
            path: path.to_path_buf(),
            source,
        })?;

        if !attr.is_dir() {
            return Err(ConfigurationError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        fs::read_dir(path).map_err(|source| ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let base_path = path
            .canonicalize()
            .map_err(|source| ConfigurationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

        log::debug!("Registry bound to {}", base_path.display());

        Ok(Registry {
            base_path,
            options,
            snapshot: ArcSwapOption::from_pointee(Snapshot::default()),
            last_generation: AtomicU64::new(0),
            closing: CancellationToken::new(),
        })
    }

    /// Load every regular file under the base directory, replacing the
    /// current content.
    ///
    /// Files that cannot be read are left out and listed in the returned
    /// report. The walk only fails if the base directory itself cannot be
    /// traversed, or if the registry is closed.
    pub fn walk(&self, filter: Option<&dyn WalkFilter>) -> Result<WalkReport, WalkError> {
        self.walk_with_cancel(filter, &CancellationToken::new())
    }

    /// Like [`Registry::walk`], but gives up when `cancel` fires.
    ///
    /// A cancelled walk publishes nothing; the registry keeps serving the
    /// snapshot it had before the walk started. Closing the registry also
    /// cancels any walk in progress.
    ///
    /// Cancellation that arrives after the new snapshot is published is too
    /// late to take effect: the walk returns `Ok` with
    /// [`WalkReport::published`] set, and callers should trust the report
    /// over their own timer.
    pub fn walk_with_cancel(
        &self,
        filter: Option<&dyn WalkFilter>,
        cancel: &CancellationToken,
    ) -> Result<WalkReport, WalkError> {
        if self.is_closed() {
            return Err(WalkError::Closed);
        }

        let generation = self.last_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        log::info!(
            "Walking {} (generation {})...",
            self.base_path.display(),
            generation
        );

        let is_cancelled = || cancel.is_cancelled() || self.closing.is_cancelled();
        let scan = match walk::scan(&self.base_path, &self.options, filter, &is_cancelled) {
            Err(WalkError::Cancelled) if self.is_closed() => return Err(WalkError::Closed),
            Err(error) => return Err(error),
            Ok(_) if cancel.is_cancelled() => return Err(WalkError::Cancelled),
            Ok(scan) => scan,
        };

        let mut report = scan.report;
        report.generation = generation;
        report.elapsed = started.elapsed();

        let fresh = Arc::new(Snapshot {
            entries: scan.entries,
            generation,
            bytes: report.bytes,
        });

        // `rcu` may retry; only the decision of the final attempt counts.
        let swapped = Cell::new(false);
        let previous = self.snapshot.rcu(|current| {
            let publish = !cancel.is_cancelled()
                && matches!(current, Some(current) if current.generation < generation);
            swapped.set(publish);
            if publish {
                Some(Arc::clone(&fresh))
            } else {
                current.clone()
            }
        });

        match previous {
            None => Err(WalkError::Closed),
            Some(_) if !swapped.get() && cancel.is_cancelled() => Err(WalkError::Cancelled),
            Some(_) if swapped.get() => {
                report.published = true;
                log::info!(
                    "Published generation {}: {} files, {} bytes, {} failures in {:?}",
                    generation,
                    report.files,
                    report.bytes,
                    report.failures.len(),
                    report.elapsed
                );
                Ok(report)
            }
            Some(previous) => {
                log::info!(
                    "Discarding generation {}: generation {} is already published",
                    generation,
                    previous.generation
                );
                Ok(report)
            }
        }
    }

    /// Look up the content stored for `path`.
    ///
    /// `path` is canonicalized first, so `/css/site.css`, `css/site.css` and
    /// `css/./site.css` all find the same entry. Paths that would resolve
    /// outside the base directory are misses, as is every lookup on a closed
    /// registry.
    pub fn get(&self, path: &str) -> Option<Bytes> {
        match CanonicalPath::parse(path) {
            Ok(key) => self.get_canonical(&key),
            Err(error) => {
                log::debug!("Rejected lookup: {}", error);
                None
            }
        }
    }

    /// Look up an already canonical key.
    pub fn get_canonical(&self, key: &CanonicalPath) -> Option<Bytes> {
        let guard = self.snapshot.load();
        let snapshot = (*guard).as_ref()?;
        if self.options.fold_case {
            snapshot.get(&key.clone().folded())
        } else {
            snapshot.get(key)
        }
    }

    /// Release the content and make the registry unusable.
    ///
    /// Safe to call any number of times, with or without a prior walk. Any
    /// walk still running is cancelled and will not publish.
    pub fn close(&self) {
        self.closing.cancel();
        if let Some(snapshot) = self.snapshot.swap(None) {
            log::debug!(
                "Closed registry for {} ({} entries released)",
                self.base_path.display(),
                snapshot.len()
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// The current snapshot, or `None` once closed.
    ///
    /// Holding the returned snapshot keeps it alive across later walks.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    pub fn stats(&self) -> Option<RegistryStats> {
        let guard = self.snapshot.load();
        (*guard).as_ref().map(|snapshot| RegistryStats {
            entries: snapshot.len(),
            bytes: snapshot.bytes(),
            generation: snapshot.generation(),
        })
    }

    pub fn len(&self) -> usize {
        self.stats().map_or(0, |stats| stats.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonicalized base directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("base_path", &self.base_path)
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}
