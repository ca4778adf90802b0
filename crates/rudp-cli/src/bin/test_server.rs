//! Reference server: binds an address, echoes typed lines to all peers
//!
//! Not part of the transport's correctness contract (see `rudp-net`);
//! this is a demonstration/manual-testing tool only.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use rudp_config::AppConfig;
use rudp_core::{Address, Timeouts};
use rudp_net::{LinkInfo, Server, ServerHandler};

const APP_ECHO: u8 = 0;

#[derive(Parser)]
#[command(name = "test-server")]
#[command(about = "Binds a UDP address and echoes stdin lines to every connected peer")]
struct Cli {
    /// Address to bind, host:port
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Optional TOML config file (CLI flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose (trace-level) logging
    #[arg(short, long)]
    verbose: bool,
}

struct EchoHandler;

impl ServerHandler for EchoHandler {
    fn handle_packet(&mut self, peer: SocketAddr, app_cmd: u8, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        tracing::info!(%peer, app_cmd, %text, "received");
        if text.trim() == "quit" {
            tracing::info!(%peer, "peer requested quit");
        }
    }

    fn link_info(&mut self, peer: SocketAddr, info: LinkInfo) {
        tracing::debug!(%peer, rto_ms = info.rto.as_millis(), "link info updated");
    }

    fn peer_dropped(&mut self, peer: SocketAddr) {
        tracing::info!(%peer, "peer dropped");
    }

    fn peer_new(&mut self, peer: SocketAddr) {
        tracing::info!(%peer, "peer connected");
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

    let bind: SocketAddr = cli.bind.unwrap_or_else(|| file_config.bind.parse().unwrap_or_else(|_| "0.0.0.0:4242".parse().unwrap()));
    let timeouts: Timeouts = file_config.timeouts.into();

    let mut server = Server::bind(Some(Address::from_raw(bind)), timeouts).await?;
    tracing::info!(%bind, "test-server listening");

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

    let mut handler = EchoHandler;
    server.run_with_broadcast(&mut handler, Some((APP_ECHO, rx))).await?;
    Ok(())
}
