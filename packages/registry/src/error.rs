//! Error types for the content registry.

use std::io;
use std::path::PathBuf;

/// The registry's base directory is unusable.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("base path '{}' does not exist or cannot be inspected: {source}", path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("base path '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("base path '{}' is not readable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A walk could not produce a snapshot.
///
/// Problems with individual files never show up here; they are collected in
/// the walk report instead.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    #[error("cannot traverse registry root '{}': {source}", path.display())]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("walk was cancelled")]
    Cancelled,

    #[error("registry is closed")]
    Closed,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn configuration_error_display() {
        let e = ConfigurationError::NotADirectory {
            path: PathBuf::from("app/index.html"),
        };
        assert_eq!(
            e.to_string(),
            "base path 'app/index.html' is not a directory"
        );

        let e = ConfigurationError::Missing {
            path: PathBuf::from("nowhere"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(e.to_string().contains("nowhere"));
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn walk_error_display() {
        assert_eq!(WalkError::Cancelled.to_string(), "walk was cancelled");
        assert_eq!(WalkError::Closed.to_string(), "registry is closed");
    }

    #[test]
    fn error_is_transparent() {
        let e: Error = WalkError::Closed.into();
        assert!(matches!(e, Error::Walk(WalkError::Closed)));
        assert_eq!(e.to_string(), "registry is closed");

        let e: Error = ConfigurationError::NotADirectory {
            path: PathBuf::from("x"),
        }
        .into();
        assert!(matches!(e, Error::Configuration(_)));
    }
}
