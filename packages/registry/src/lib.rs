//! # mediasrv-registry
//!
//! An in-memory content registry for a small media site.
//!
//! The registry walks a directory tree, loads every regular file into
//! memory, and answers lookups by canonical path without touching the disk
//! again. It is a static snapshot, not a cache: there is no eviction and no
//! expiry, and it only changes when it is explicitly walked again.
//!
//! - [`CanonicalPath`]: the key type; resolves `.`/`..` and cannot escape
//!   the root
//! - [`Registry`]: construct, walk, get, close
//! - [`WalkReport`]: what a walk loaded, skipped, and failed to read
//!
//! # Example
//!
//! ```rust,no_run
//! use mediasrv_registry::{Registry, RegistryOptions};
//!
//! let registry = Registry::new("app", RegistryOptions::default())?;
//! let report = registry.walk(None)?;
//! for failure in &report.failures {
//!     eprintln!("skipped {}: {}", failure.path.display(), failure.message);
//! }
//!
//! match registry.get("/css/site.css") {
//!     Some(bytes) => println!("{} bytes", bytes.len()),
//!     None => println!("not found"),
//! }
//!
//! registry.close();
//! # Ok::<(), mediasrv_registry::Error>(())
//! ```

pub use bytes::Bytes;
pub use tokio_util::sync::CancellationToken;

mod error;
mod options;
mod path;
mod registry;
mod walk;

pub use error::{ConfigurationError, Error, Result, WalkError};
pub use options::RegistryOptions;
pub use path::{CanonicalPath, PathError};
pub use registry::{Registry, RegistryStats, Snapshot};
pub use walk::{FailureKind, FileInfo, WalkFailure, WalkFilter, WalkReport};
