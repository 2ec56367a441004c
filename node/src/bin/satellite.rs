//! satellite — a store-and-forward relay (peer ids 1..=10, ports 33001..33010).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use relay_node::config::{NetworkAssets, DEFAULT_ASSET_DIR};
use relay_node::discovery;
use relay_node::relay::RelayPlane;
use relay_node::server::{self, PeerNode};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "satellite", about = "Skylink store-and-forward relay")]
struct Args {
    /// Satellite id (1..=10); the node listens on 33000 + id
    id: i32,
    /// Asset directory (ip.txt, other_satellites.txt, device_positions.csv)
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    assets: PathBuf,
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
    if !(1..=10).contains(&args.id) {
        bail!("satellite id must be in 1..=10, got {}", args.id);
    }
    let assets = NetworkAssets::load(&args.assets).context("loading network assets")?;

    let node = PeerNode::new(args.id, assets, Arc::new(RelayPlane))?;
    info!("🛰 Satellite {} starting", args.id);

    discovery::announce_sweep(&node).await;
    discovery::spawn_scanner(node.clone());

    server::serve(node).await?;
    info!("Satellite {} stopped", args.id);
    Ok(())
}
