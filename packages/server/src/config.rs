//! Server configuration.
//!
//! Settings come from an optional JSON file; anything the file leaves out
//! takes its default, and command-line flags override both.
//!
//! ```json
//! {
//!     "listen": "127.0.0.1:8080",
//!     "base_path": "app",
//!     "request_timeout_secs": 10,
//!     "rebuild_timeout_secs": 30,
//!     "registry": { "fold_case": false, "max_file_size": 10485760 }
//! }
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mediasrv_registry::RegistryOptions;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Directory whose content is served.
    pub base_path: PathBuf,
    pub request_timeout_secs: u64,
    /// Upper bound on a registry walk, at startup or on rebuild.
    pub rebuild_timeout_secs: u64,
    pub registry: RegistryOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            base_path: PathBuf::from("app"),
            request_timeout_secs: 10,
            rebuild_timeout_secs: 30,
            registry: RegistryOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rebuild_timeout(&self) -> Duration {
        Duration::from_secs(self.rebuild_timeout_secs)
    }
}
