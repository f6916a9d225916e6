//! dfs-client binary
//!
//! Reads commands from stdin, one per line, and prints each response.
//!
//! ```bash
//! dfs-client --port 1024
//! > mkdir docs
//! > cd docs
//! > write notes.txt      # uploads ./notes.txt
//! > read notes.txt
//! > exit
//! ```

use std::process::ExitCode;

use clap::Parser;
use dfs_client::constants::{DEFAULT_HOST, DEFAULT_PORT};
use dfs_client::{Client, Framing};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dfs-client", version, about = "Interactive dfs client")]
struct Args {
    /// Server host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Message framing (must match the server)
    #[arg(long, value_enum, default_value_t = Framing::Raw)]
    framing: Framing,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dfs-client: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let addr = format!("{}:{}", args.host, args.port);
    let mut client = Client::connect(addr.as_str(), args.framing).await?;
    eprintln!("connected to {addr}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match client.send_line(line).await {
            Ok(response) => println!("{}", response.text()),
            Err(e) if e.is_local() => eprintln!("{e}"),
            Err(e) => return Err(e.into()),
        }

        if line == "exit" || line == "KILL_SERVICE" {
            break;
        }
    }
    Ok(())
}
