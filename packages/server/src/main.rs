use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use mediasrv_server::ServerConfig;
use tracing_subscriber::EnvFilter;

/// mediasrv - serve a directory of site content from memory
#[derive(Parser, Debug)]
#[command(name = "mediasrv")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long, env = "MEDIASRV_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to serve (overrides the config file)
    #[arg(long, env = "MEDIASRV_BASE_PATH")]
    base_path: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(long, env = "MEDIASRV_LISTEN")]
    listen: Option<SocketAddr>,

    /// Match request paths case-insensitively
    #[arg(long)]
    fold_case: bool,
}

impl Args {
    fn into_config(self) -> mediasrv_server::Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        if let Some(base_path) = self.base_path {
            config.base_path = base_path;
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if self.fold_case {
            config.registry.fold_case = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let result = match args.into_config() {
        Ok(config) => mediasrv_server::run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
