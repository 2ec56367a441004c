//! discovery.rs — peer discovery scanner and down-gossip
//!
//! A background task sweeps `{known IPs} × {33000..=33010, 33999}` about
//! once a minute, announcing itself to whatever answers and folding replies
//! into the routing table. Probes are paced by the simulated link delay to
//! the peer that would own the probed port. Pre-seeded peers from another
//! administrative domain are honored on every sweep.
//!
//! Down-gossip is the §failure side: when a peer cannot be reached, every
//! other table entry is told `GET /down?device-id=X` in parallel. Gossip
//! failures are logged and otherwise ignored — they never fail the send
//! that triggered them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use relay_types::{
    AnnounceReply, Endpoint, PeerId, SCAN_PORT_FIRST, SCAN_PORT_LAST, SINK_ID, SINK_PORT,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::orbit::{self, slant_distance_km};
use crate::server::PeerNode;

pub const SCAN_INTERVAL: Duration = Duration::from_secs(60);

fn probe_ports() -> impl Iterator<Item = u16> {
    (SCAN_PORT_FIRST..=SCAN_PORT_LAST).chain([SINK_PORT])
}

/// The peer id that would listen on `port` under the overlay's port scheme.
fn peer_id_for_port(port: u16) -> PeerId {
    if port == SINK_PORT {
        SINK_ID
    } else {
        (port - SCAN_PORT_FIRST) as PeerId
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// One full sweep: seed out-of-band peers, then probe every IP × port pair
/// with a 1-second timeout, registering ourselves as we go.
pub async fn announce_sweep(node: &Arc<PeerNode>) {
    for (id, endpoint) in &node.assets.seeded_peers {
        node.routing.insert(*id, endpoint.clone()).await;
    }

    let now = Local::now();
    let self_pos = node.oracle.position(node.id, now);
    let mut found = 0usize;

    for ip in &node.assets.scan_ips {
        for port in probe_ports() {
            if port == node.endpoint.port {
                continue;
            }

            let target_pos = node.oracle.position(peer_id_for_port(port), now);
            let delay = orbit::simulate_leo_delay(slant_distance_km(&self_pos, &target_pos));
            tokio::time::sleep(delay).await;

            let result = node
                .http
                .get(format!("http://{ip}:{port}/"))
                .query(&[
                    ("device-id", node.id.to_string()),
                    ("device-port", node.endpoint.port.to_string()),
                ])
                .send()
                .await;
            tokio::time::sleep(delay).await;

            let Ok(response) = result else { continue };
            if !response.status().is_success() {
                continue;
            }
            let Ok(reply) = response.json::<AnnounceReply>().await else { continue };

            node.routing.insert(reply.device_id, Endpoint::new(ip.clone(), port)).await;
            found += 1;
        }
    }

    debug!("Scan complete: {found} peers answered, table size {}", node.routing.len().await);
}

/// Keep the routing table fresh on the scan cadence. The boot sweep is run
/// by the caller before serving; the interval's immediate first tick is
/// consumed so the next sweep lands a full period later.
pub fn spawn_scanner(node: Arc<PeerNode>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCAN_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            announce_sweep(&node).await;
        }
    })
}

// ── Down-gossip ───────────────────────────────────────────────────────────────

/// Tell every peer except `down` itself (and `exclude`, the peer this news
/// came from) that `down` is unreachable.
pub async fn gossip_down(node: &Arc<PeerNode>, down: PeerId, exclude: Option<PeerId>) {
    let table = node.routing.snapshot().await;
    let mut tasks = JoinSet::new();

    for (id, endpoint) in table {
        if id == down || id == node.id || Some(id) == exclude {
            continue;
        }
        let client = node.http.clone();
        let url = format!("{}/down", endpoint.url());
        tasks.spawn(async move {
            if let Err(e) = client.get(&url).query(&[("device-id", down.to_string())]).send().await
            {
                warn!("Gossip to peer {id} failed: {e}");
            }
        });
    }

    while tasks.join_next().await.is_some() {}
    info!("Gossiped peer {down} down");
}
