//! relay.rs — the store-and-forward plane
//!
//! A relay never looks inside the envelope: FEC decoding happens only at
//! the sink, so a relay's whole job is picking the next hop and moving the
//! bytes. Group traffic is re-planned against the current routing table on
//! every arrival; foreign-group traffic is honored verbatim via its
//! `X-Destination-*` headers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use relay_types::SINK_ID;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::discovery;
use crate::orbit::simulate_leo_delay;
use crate::server::{EnvelopeMeta, IngestPlane, PeerNode};

pub struct RelayPlane;

#[async_trait]
impl IngestPlane for RelayPlane {
    async fn ingest(&self, node: &Arc<PeerNode>, meta: EnvelopeMeta, body: Bytes) -> Value {
        debug!("Envelope received ({} bytes)", body.len());
        let node = node.clone();
        tokio::spawn(async move {
            forward(node, meta, body).await;
        });
        json!({ "message": "received" })
    }
}

async fn forward(node: Arc<PeerNode>, meta: EnvelopeMeta, body: Bytes) {
    if !meta.is_local_group() {
        // Foreign traffic: nothing to re-plan around, one attempt only.
        let Some(dest) = meta.destination.clone() else {
            warn!("Foreign envelope without destination headers; dropping");
            return;
        };
        let peer = meta.destination_id.unwrap_or(SINK_ID);
        match send_hop(&node, &meta, &body, peer, &dest.url(), 0.0).await {
            Ok(()) => info!("Forwarded foreign envelope to {dest}"),
            Err(e) => warn!("{e}; dropping foreign envelope"),
        }
        return;
    }

    let goal = meta.destination_id.unwrap_or(SINK_ID);
    loop {
        let Some(hop) = node.update_nearest_satellite(goal).await else {
            warn!("No route to {goal}; dropping envelope");
            return;
        };
        match send_hop(&node, &meta, &body, hop.peer, &hop.endpoint.url(), hop.first_hop_km).await
        {
            Ok(()) => {
                info!("Forwarded envelope to peer {} (path {:?})", hop.peer, hop.hops);
                return;
            }
            Err(e) => {
                warn!("{e}");
                discovery::gossip_down(&node, hop.peer, None).await;
                node.routing.remove(hop.peer).await;
                // Re-plan over the pruned table and retry the same envelope.
            }
        }
    }
}

async fn send_hop(
    node: &Arc<PeerNode>,
    meta: &EnvelopeMeta,
    body: &Bytes,
    peer: relay_types::PeerId,
    url: &str,
    distance_km: f64,
) -> crate::Result<()> {
    let delay = simulate_leo_delay(distance_km);
    tokio::time::sleep(delay).await;
    meta.apply(node.http.post(url))
        .body(body.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| crate::NodeError::Transport { peer, source })?;
    tokio::time::sleep(delay).await;
    Ok(())
}
