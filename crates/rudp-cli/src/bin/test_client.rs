//! Reference client: connects to a server and forwards stdin lines
//!
//! Not part of the transport's correctness contract (see `rudp-net`);
//! this is a demonstration/manual-testing tool only.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use rudp_config::AppConfig;
use rudp_core::{Address, Family, Timeouts};
use rudp_net::{Client, ClientHandler, LinkInfo};

const APP_ECHO: u8 = 0;

#[derive(Parser)]
#[command(name = "test-client")]
#[command(about = "Connects to a test-server and forwards stdin lines")]
struct Cli {
    /// Server host, default 127.0.0.1
    host: Option<String>,

    /// Server port, default 4242
    #[arg(long, default_value_t = 4242)]
    port: u16,

    /// Optional TOML config file (CLI flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose (trace-level) logging
    #[arg(short, long)]
    verbose: bool,
}

struct PrintHandler;

impl ClientHandler for PrintHandler {
    fn handle_packet(&mut self, app_cmd: u8, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        println!("{text}");
        if text.trim() == "quit" {
            tracing::info!("server sent quit");
        }
    }

    fn link_info(&mut self, info: LinkInfo) {
        tracing::debug!(rto_ms = info.rto.as_millis(), "link info updated");
    }

    fn server_lost(&mut self) {
        tracing::info!("server lost");
    }

    fn connected(&mut self) {
        tracing::info!("connected");
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };

    setup_logging(cli.verbose || file_config.verbose);

    let host = cli.host.unwrap_or_else(|| "127.0.0.1".to_string());
    let remote = Address::resolve(&host, cli.port, Family::Either)
        .with_context(|| format!("resolving {host}:{}", cli.port))?;
    let timeouts: Timeouts = file_config.timeouts.into();

    let mut client = Client::connect(remote, timeouts, Instant::now()).await?;
    tracing::info!(%remote, "test-client connecting");

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let quit = line.trim() == "quit";
            if tx.send(line.into_bytes()).await.is_err() || quit {
                break;
            }
        }
    });

    let mut handler = PrintHandler;
    client.run_with_input(&mut handler, Some((APP_ECHO, rx))).await?;
    Ok(())
}
