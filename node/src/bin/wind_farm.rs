//! wind-farm — the telemetry source entry point (peer id 0, port 33000).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_node::config::{KeyPaths, NetworkAssets, DEFAULT_ASSET_DIR, DEFAULT_KEY_DIR};
use relay_node::server::{self, PeerNode};
use relay_node::source::{SourcePlane, WindFarm};
use relay_node::{discovery, rsa_envelope};
use relay_types::SOURCE_ID;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "wind-farm", about = "Skylink telemetry source (offshore wind farm)")]
struct Args {
    /// Asset directory (ip.txt, other_satellites.txt, device_positions.csv)
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    assets: PathBuf,
    /// Key directory holding public.pem
    #[arg(long, default_value = DEFAULT_KEY_DIR)]
    keys: PathBuf,
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
    let public_key = rsa_envelope::load_public_key(&KeyPaths::in_dir(&args.keys).public)
        .context("loading envelope public key")?;

    let node = PeerNode::new(SOURCE_ID, assets, Arc::new(SourcePlane))?;
    info!("🌬 Wind farm starting as peer {SOURCE_ID}");

    // Warm the routing table before the first send cycle.
    discovery::announce_sweep(&node).await;
    discovery::spawn_scanner(node.clone());

    let farm = Arc::new(WindFarm::new(node.clone(), public_key));
    tokio::spawn(farm.run());

    server::serve(node).await?;
    info!("Wind farm stopped");
    Ok(())
}
