//! ground-station — the telemetry sink entry point (peer id -1, port 33999).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_node::config::{
    KeyPaths, NetworkAssets, DEFAULT_ASSET_DIR, DEFAULT_DATA_DIR, DEFAULT_KEY_DIR,
};
use relay_node::discovery;
use relay_node::server::{self, PeerNode};
use relay_node::sink::SinkPlane;
use relay_types::SINK_ID;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ground-station", about = "Skylink telemetry sink (ground station)")]
struct Args {
    /// Asset directory (ip.txt, other_satellites.txt, device_positions.csv)
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    assets: PathBuf,
    /// Key directory holding private.pem
    #[arg(long, default_value = DEFAULT_KEY_DIR)]
    keys: PathBuf,
    /// Directory for the persistent CSV log
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_node=info".into()),
        )
        .init();

    let args = Args::parse();
    let assets = NetworkAssets::load(&args.assets).context("loading network assets")?;
    let sink = SinkPlane::new(&KeyPaths::in_dir(&args.keys).private, &args.data)
        .context("initializing ground station")?;

    let node = PeerNode::new(SINK_ID, assets, Arc::new(sink))?;
    info!("📡 Ground station starting as peer {SINK_ID}");

    discovery::announce_sweep(&node).await;
    discovery::spawn_scanner(node.clone());

    server::serve(node).await?;
    info!("CSV log finalized; ground station stopped");
    Ok(())
}
