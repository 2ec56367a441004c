//! server.rs — the common peer runtime shared by all three roles
//!
//! Every node exposes the same three endpoints:
//! - `GET /?device-id=X&device-port=Y` — identify; registers the caller
//! - `GET /down?device-id=X` — gossip: drop peer X from the local table
//! - `POST /` — data ingress; behavior is the role's ingest plane
//!
//! Each inbound request runs on its own task; forwarding work is detached
//! from the HTTP response by the relay plane.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Local;
use relay_types::{
    headers, port_for, AnnounceQuery, AnnounceReply, DeviceType, Endpoint, PeerId, GROUP_ID,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::NetworkAssets;
use crate::error::Result;
use crate::orbit::PositionOracle;
use crate::planner;
use crate::routing::RoutingTable;

/// Total timeout on every outbound HTTP call in the overlay.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(1);

// ── Envelope metadata ─────────────────────────────────────────────────────────

/// The `X-*` headers of a data POST, parsed once at ingress and re-applied
/// verbatim on every outbound hop.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeMeta {
    pub destination_id: Option<PeerId>,
    pub destination: Option<Endpoint>,
    pub group_id: Option<u32>,
}

impl EnvelopeMeta {
    /// Metadata for traffic the local group originates toward its sink.
    pub fn for_group_traffic(sink_id: PeerId, sink_endpoint: Option<&Endpoint>) -> Self {
        Self {
            destination_id: Some(sink_id),
            destination: sink_endpoint.cloned(),
            group_id: Some(GROUP_ID),
        }
    }

    pub fn from_headers(map: &HeaderMap) -> Self {
        let text = |name: &str| map.get(name).and_then(|v| v.to_str().ok());
        let destination = match (text(headers::DESTINATION_IP), text(headers::DESTINATION_PORT)) {
            (Some(ip), Some(port)) => {
                port.parse().ok().map(|port| Endpoint::new(ip.to_string(), port))
            }
            _ => None,
        };
        Self {
            destination_id: text(headers::DESTINATION_ID).and_then(|v| v.parse().ok()),
            destination,
            group_id: text(headers::GROUP_ID).and_then(|v| v.parse().ok()),
        }
    }

    /// Attach the headers to an outbound hop.
    pub fn apply(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(id) = self.destination_id {
            req = req.header(headers::DESTINATION_ID, id.to_string());
        }
        if let Some(dest) = &self.destination {
            req = req
                .header(headers::DESTINATION_IP, dest.host.clone())
                .header(headers::DESTINATION_PORT, dest.port.to_string());
        }
        if let Some(group) = self.group_id {
            req = req.header(headers::GROUP_ID, group.to_string());
        }
        req
    }

    /// Does this envelope belong to our administrative group?
    pub fn is_local_group(&self) -> bool {
        self.group_id == Some(GROUP_ID)
    }
}

// ── Role plane ────────────────────────────────────────────────────────────────

/// Role-specific handling of `POST /`. Relays re-enqueue to a forwarder and
/// return immediately; the sink decodes inline; the source acknowledges and
/// drops (it only produces).
#[async_trait]
pub trait IngestPlane: Send + Sync {
    async fn ingest(&self, node: &Arc<PeerNode>, meta: EnvelopeMeta, body: Bytes) -> Value;
}

// ── Node state ────────────────────────────────────────────────────────────────

pub struct PeerNode {
    pub id: PeerId,
    pub endpoint: Endpoint,
    pub routing: RoutingTable,
    pub oracle: PositionOracle,
    pub assets: NetworkAssets,
    pub http: reqwest::Client,
    plane: Arc<dyn IngestPlane>,
}

/// Resolved next hop for one outbound link.
#[derive(Debug, Clone)]
pub struct NextHop {
    pub peer: PeerId,
    pub endpoint: Endpoint,
    pub first_hop_km: f64,
    pub hops: Vec<PeerId>,
}

impl PeerNode {
    pub fn new(id: PeerId, assets: NetworkAssets, plane: Arc<dyn IngestPlane>) -> Result<Arc<Self>> {
        Self::with_endpoint(id, Endpoint::new("0.0.0.0", port_for(id)), assets, plane)
    }

    /// Node with an explicit endpoint. Loopback harnesses use this to run
    /// several peers on ephemeral ports instead of the well-known scheme.
    pub fn with_endpoint(
        id: PeerId,
        endpoint: Endpoint,
        assets: NetworkAssets,
        plane: Arc<dyn IngestPlane>,
    ) -> Result<Arc<Self>> {
        let oracle = PositionOracle::new(assets.source_position, assets.sink_position);
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| crate::NodeError::Config(format!("http client: {e}")))?;
        Ok(Arc::new(Self {
            id,
            routing: RoutingTable::new(id, endpoint.clone()),
            endpoint,
            oracle,
            assets,
            http,
            plane,
        }))
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::for_peer(self.id)
    }

    /// Recompute the cheapest route from this node to `goal` over a snapshot
    /// of the current routing table and the position oracle.
    pub async fn update_nearest_satellite(&self, goal: PeerId) -> Option<NextHop> {
        let table = self.routing.snapshot().await;
        let now = Local::now();
        let positions = table.keys().map(|&id| (id, self.oracle.position(id, now))).collect();

        let path = planner::shortest_path(&positions, self.id, goal)?;
        let peer = *path.hops.get(1)?;
        let endpoint = table.get(&peer)?.clone();
        Some(NextHop { peer, endpoint, first_hop_km: path.first_hop_km, hops: path.hops })
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn announce(
    State(node): State<Arc<PeerNode>>,
    ConnectInfo(caller): ConnectInfo<SocketAddr>,
    Query(query): Query<AnnounceQuery>,
) -> Json<AnnounceReply> {
    let endpoint = Endpoint::new(caller.ip().to_string(), query.device_port);
    debug!("Announce from peer {} at {endpoint}", query.device_id);
    node.routing.insert(query.device_id, endpoint).await;
    Json(AnnounceReply {
        device_type: node.device_type().as_u8(),
        device_id: node.id,
        group_id: GROUP_ID,
    })
}

#[derive(Debug, Deserialize)]
struct DownQuery {
    #[serde(rename = "device-id")]
    device_id: PeerId,
}

async fn peer_down(
    State(node): State<Arc<PeerNode>>,
    Query(query): Query<DownQuery>,
) -> Json<Value> {
    if node.routing.remove(query.device_id).await {
        info!("Gossip: peer {} marked down, removed from routing table", query.device_id);
    }
    Json(json!({ "message": "ok" }))
}

async fn ingest(
    State(node): State<Arc<PeerNode>>,
    header_map: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let meta = EnvelopeMeta::from_headers(&header_map);
    let reply = node.plane.clone().ingest(&node, meta, body).await;
    Json(reply)
}

pub fn router(node: Arc<PeerNode>) -> Router {
    Router::new()
        .route("/", get(announce).post(ingest))
        .route("/down", get(peer_down))
        .with_state(node)
}

/// Bind the node's port and serve until Ctrl-C.
pub async fn serve(node: Arc<PeerNode>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", node.endpoint.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Peer {} ({:?}) listening on {addr}", node.id, node.device_type());

    axum::serve(listener, router(node).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;
    Ok(())
}
