//! dfs-server binary
//!
//! ## Usage
//!
//! ```bash
//! # Serve ./FileSystemDir on 127.0.0.1:1024
//! dfs-server
//!
//! # Explicit config file, overriding the port
//! dfs-server --config ~/dfs.toml --port 9000
//!
//! # Print the effective config and exit
//! dfs-server --dump-config
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use dfs_server::{FileServer, Framing, ServerConfig, ServerExit};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dfs-server", version, about = "Multi-client file server")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/dfs/server.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory the root segment lives in
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Root segment name
    #[arg(long)]
    root: Option<String>,

    /// Message framing
    #[arg(long, value_enum)]
    framing: Option<Framing>,

    /// Seconds between abandoned-lock sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Reject paths that leave the root segment
    #[arg(long)]
    confine: bool,

    /// Release a client's locks as soon as it disconnects
    #[arg(long)]
    release_on_disconnect: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(ServerConfig, bool)> {
        let mut config = ServerConfig::load_or_default(self.config.as_deref())?;

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(base_dir) = self.base_dir {
            config.base_dir = dfs_server::config::expand_tilde(&base_dir);
        }
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(secs) = self.sweep_interval {
            config.sweep_interval_secs = secs;
        }
        config.confine_to_root |= self.confine;
        config.release_on_disconnect |= self.release_on_disconnect;

        config.validate()?;
        Ok((config, self.dump_config))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (config, dump) = args.into_config()?;

    if dump {
        print!("{}", toml::to_string(&config).context("failed to render config")?);
        return Ok(());
    }

    let server = FileServer::bind(config).await?;
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    match server.run_until(stop).await {
        ServerExit::Killed => tracing::info!("killed by client"),
        ServerExit::Stopped => tracing::info!("interrupted"),
    }
    Ok(())
}
