//! Canonical registry keys.
//!
//! Every path that reaches the registry, whether produced by a walk or handed
//! in by a request handler, goes through [`CanonicalPath`]. Two paths that
//! name the same file under the registry root canonicalize to the same key,
//! and a path that would leave the root does not canonicalize at all.

use std::fmt;
use std::path::{Component, Path as FsPath};

/// Errors produced while canonicalizing a path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A `..` segment tried to climb above the registry root.
    #[error("path '{path}' escapes the registry root")]
    EscapesRoot { path: String },

    /// A component cannot be part of a registry key.
    #[error("invalid path component '{component}' at position {position}: {message}")]
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },

    /// A file system name is not valid UTF-8.
    #[error("path '{path}' is not valid UTF-8")]
    NonUtf8 { path: String },
}

/// A path relative to the registry root with `.`/`..` resolved and
/// separators normalized to `/`.
///
/// The empty path names the root itself. A `CanonicalPath` can never point
/// outside the root: any input that would is rejected by [`CanonicalPath::parse`].
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalPath {
    key: String,
}

impl CanonicalPath {
    /// The root of the registry.
    pub fn root() -> Self {
        Self::default()
    }

    /// Canonicalize a request-style path.
    ///
    /// # Rules
    ///
    /// - `/` and `\` are both separators
    /// - Empty components and `.` are dropped, so a leading `/` is ignored
    /// - `..` removes the preceding component, and fails if there is none
    /// - Components containing NUL are rejected
    ///
    /// Parsing is idempotent: re-parsing the string form of a canonical
    /// path yields the same path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mediasrv_registry::CanonicalPath;
    ///
    /// let p = CanonicalPath::parse("/css/./fonts/../site.css").unwrap();
    /// assert_eq!(p.as_str(), "css/site.css");
    ///
    /// assert!(CanonicalPath::parse("../../etc/passwd").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let mut components: Vec<&str> = Vec::new();

        for (position, component) in s.split(['/', '\\']).enumerate() {
            match component {
                "" | "." => {}
                ".." => {
                    if components.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            path: s.to_string(),
                        });
                    }
                }
                _ => {
                    Self::validate_component(component, position)?;
                    components.push(component);
                }
            }
        }

        Ok(CanonicalPath {
            key: components.join("/"),
        })
    }

    /// Build a key from a file system path relative to the registry root.
    ///
    /// Unlike [`CanonicalPath::parse`], every component must be a plain
    /// name: rooted paths, `..`, and names containing a separator are
    /// rejected instead of being reinterpreted.
    pub fn from_relative(path: &FsPath) -> Result<Self, PathError> {
        let mut components = Vec::new();

        for (position, component) in path.components().enumerate() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| PathError::NonUtf8 {
                        path: path.to_string_lossy().into_owned(),
                    })?;
                    if name.contains(['/', '\\']) {
                        return Err(PathError::InvalidComponent {
                            component: name.to_string(),
                            position,
                            message: "contains a path separator".to_string(),
                        });
                    }
                    Self::validate_component(name, position)?;
                    components.push(name);
                }
                Component::ParentDir => {
                    return Err(PathError::EscapesRoot {
                        path: path.to_string_lossy().into_owned(),
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::InvalidComponent {
                        component: path.to_string_lossy().into_owned(),
                        position,
                        message: "not a relative path".to_string(),
                    });
                }
            }
        }

        Ok(CanonicalPath {
            key: components.join("/"),
        })
    }

    fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
        if component.contains('\0') {
            return Err(PathError::InvalidComponent {
                component: component.escape_default().to_string(),
                position,
                message: "contains a NUL byte".to_string(),
            });
        }
        Ok(())
    }

    /// Lowercase every component, for registries that ignore case.
    #[must_use]
    pub fn folded(self) -> Self {
        CanonicalPath {
            key: self.key.to_lowercase(),
        }
    }

    /// The key as a `/`-separated string with no leading or trailing `/`.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Iterate over components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.key.split('/').filter(|c| !c.is_empty())
    }

    /// Get the number of components.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Check if this path has no components.
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// The final component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }

    /// The extension of the final component, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some(("", _)) | None => None,
            Some((_, ext)) => Some(ext),
        }
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl std::str::FromStr for CanonicalPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn canon(s: &str) -> String {
        CanonicalPath::parse(s).unwrap().as_str().to_string()
    }

    #[test]
    fn parse_basic_paths() {
        assert_eq!(canon(""), "");
        assert_eq!(canon("index.html"), "index.html");
        assert_eq!(canon("html/index.html"), "html/index.html");
    }

    #[test]
    fn normalize_separators() {
        assert_eq!(canon("/css/site.css"), "css/site.css");
        assert_eq!(canon("css//site.css"), "css/site.css");
        assert_eq!(canon("css/"), "css");
        assert_eq!(canon("css\\site.css"), "css/site.css");
        assert_eq!(canon("\\css\\\\site.css"), "css/site.css");
    }

    #[test]
    fn resolve_dot_segments() {
        assert_eq!(canon("./html/./index.html"), "html/index.html");
        assert_eq!(canon("html/../css/site.css"), "css/site.css");
        assert_eq!(canon("a/b/c/../../d"), "a/d");
        assert_eq!(canon("a/.."), "");
    }

    #[test]
    fn escaping_paths_rejected() {
        for input in [
            "..",
            "../etc/passwd",
            "../../etc/passwd",
            "/../etc/passwd",
            "html/../../etc/passwd",
            "a/b/../../../c",
            "..\\windows\\system32",
        ] {
            let err = CanonicalPath::parse(input).unwrap_err();
            assert!(
                matches!(err, PathError::EscapesRoot { .. }),
                "{input} -> {err:?}"
            );
        }
    }

    #[test]
    fn nul_rejected() {
        let err = CanonicalPath::parse("html/index\0.html").unwrap_err();
        assert!(matches!(
            err,
            PathError::InvalidComponent { position: 1, .. }
        ));
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn parse_is_idempotent() {
        for input in [
            "",
            "/",
            "html/index.html",
            "./a/../b//c/",
            "\\img\\favicon\\favicon.ico",
            "x/./y/../z",
        ] {
            let once = CanonicalPath::parse(input).unwrap();
            let twice = CanonicalPath::parse(once.as_str()).unwrap();
            assert_eq!(once, twice, "{input}");
        }
    }

    #[test]
    fn dotfiles_are_plain_names() {
        assert_eq!(canon(".well-known/security.txt"), ".well-known/security.txt");
        assert_eq!(canon("...").len(), 3);
    }

    #[test]
    fn folded_lowercases() {
        let p = CanonicalPath::parse("HTML/Index.HTML").unwrap().folded();
        assert_eq!(p.as_str(), "html/index.html");
        assert_eq!(p.clone().folded(), p);
    }

    #[test]
    fn from_relative_matches_parse() {
        let rel = PathBuf::from("html").join("index.html");
        assert_eq!(
            CanonicalPath::from_relative(&rel).unwrap(),
            CanonicalPath::parse("html/index.html").unwrap()
        );
        assert!(CanonicalPath::from_relative(FsPath::new("")).unwrap().is_root());
    }

    #[test]
    fn from_relative_rejects_parent_and_root() {
        assert!(matches!(
            CanonicalPath::from_relative(FsPath::new("../secret")),
            Err(PathError::EscapesRoot { .. })
        ));
        assert!(matches!(
            CanonicalPath::from_relative(FsPath::new("/etc/passwd")),
            Err(PathError::InvalidComponent { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn from_relative_rejects_backslash_names() {
        let err = CanonicalPath::from_relative(FsPath::new("css/a\\b.css")).unwrap_err();
        assert!(err.to_string().contains("separator"));
    }

    #[cfg(unix)]
    #[test]
    fn from_relative_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(&[0x66, 0xff, 0x6f]);
        let err = CanonicalPath::from_relative(FsPath::new(name)).unwrap_err();
        assert!(matches!(err, PathError::NonUtf8 { .. }));
    }

    #[test]
    fn file_name_and_extension() {
        let p = CanonicalPath::parse("img/favicon/favicon.ico").unwrap();
        assert_eq!(p.file_name(), Some("favicon.ico"));
        assert_eq!(p.extension(), Some("ico"));
        assert_eq!(p.len(), 3);

        assert_eq!(CanonicalPath::parse(".htaccess").unwrap().extension(), None);
        assert_eq!(CanonicalPath::parse("Makefile").unwrap().extension(), None);
        assert_eq!(CanonicalPath::root().file_name(), None);
    }

    #[test]
    fn display_and_from_str() {
        let p: CanonicalPath = "js//app.js".parse().unwrap();
        assert_eq!(format!("{}", p), "js/app.js");
    }
}
