use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot read config file '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] mediasrv_registry::Error),

    #[error("registry walk did not finish within {0:?}")]
    WalkTimeout(std::time::Duration),

    #[error("registry walk panicked: {0}")]
    WalkTask(#[from] tokio::task::JoinError),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

impl From<mediasrv_registry::ConfigurationError> for Error {
    fn from(error: mediasrv_registry::ConfigurationError) -> Self {
        Error::Registry(error.into())
    }
}

impl From<mediasrv_registry::WalkError> for Error {
    fn from(error: mediasrv_registry::WalkError) -> Self {
        Error::Registry(error.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
