//! source.rs — the wind-farm node: generate, wrap, send, retry
//!
//! Delivery is at-least-once relative to the local queue: a record that
//! cannot leave (no path, or every candidate hop failing) is queued FIFO
//! and drained opportunistically after the next successful send. There is
//! no deduplication downstream — records carry a timestamp, not a sequence
//! number.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use channel_sim::{hamming_encode, noise};
use rand::Rng;
use relay_types::{TelemetryRecord, TurbineReading, SINK_ID};
use rsa::RsaPublicKey;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::discovery;
use crate::error::NodeError;
use crate::orbit::simulate_leo_delay;
use crate::rsa_envelope;
use crate::server::{EnvelopeMeta, IngestPlane, PeerNode};
use crate::turbine::WindTurbineCalculator;
use crate::weather;

pub const NUM_TURBINES: usize = 30;
pub const SEND_INTERVAL: Duration = Duration::from_secs(5);

// ── Ingest plane ──────────────────────────────────────────────────────────────

/// The wind farm only produces; inbound envelopes are acknowledged and
/// dropped so a confused peer cannot wedge the send loop.
pub struct SourcePlane;

#[async_trait]
impl IngestPlane for SourcePlane {
    async fn ingest(&self, _node: &Arc<PeerNode>, _meta: EnvelopeMeta, body: Bytes) -> Value {
        debug!("Ignoring {} inbound bytes; wind farm only produces", body.len());
        json!({ "message": "received" })
    }
}

// ── Wind farm ─────────────────────────────────────────────────────────────────

pub struct WindFarm {
    node: Arc<PeerNode>,
    public_key: RsaPublicKey,
    calculator: WindTurbineCalculator,
    queue: Mutex<VecDeque<TelemetryRecord>>,
}

impl WindFarm {
    pub fn new(node: Arc<PeerNode>, public_key: RsaPublicKey) -> Self {
        Self {
            node,
            public_key,
            calculator: WindTurbineCalculator::default(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Produce one farm-wide record: a base reading from the weather oracle
    /// (random fallback when it is unreachable) jittered per turbine, with
    /// each turbine's reported power derived from its own local conditions.
    pub async fn generate(&self) -> TelemetryRecord {
        let site = self.node.assets.source_position;
        let base = match weather::fetch_current(&self.node.http, site.lat, site.long).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Weather oracle unavailable ({e}); using random fallback");
                weather::random_fallback(&mut rand::thread_rng())
            }
        };

        let mut turbines = BTreeMap::new();
        let mut rng = rand::thread_rng();
        for i in 1..=NUM_TURBINES {
            let temperature = round2(base.temperature + rng.gen_range(-0.5..0.5));
            let wind_speed = round2((base.wind_speed + rng.gen_range(-0.3..0.3)).max(0.0));
            let pressure = round2(base.pressure + rng.gen_range(-50.0..50.0));
            let power_output =
                round2(self.calculator.estimate_power_output(wind_speed, temperature, pressure));
            turbines.insert(
                format!("turbine_{i}"),
                TurbineReading { temperature, pressure, wind_speed, power_output },
            );
        }

        TelemetryRecord { timestamp: now_secs(), turbine_id: self.node.id, turbines }
    }

    /// One send cycle: ship a fresh record, then drain the retry queue while
    /// sends keep succeeding. A no-path verdict parks the record in the
    /// queue; a transport failure prunes the failed hop and retries the same
    /// cycle against a freshly computed path.
    pub async fn send_status_update(&self) {
        let mut fresh = Some(self.generate().await);
        loop {
            let record = match fresh.take() {
                Some(record) => record,
                None => match self.queue.lock().await.pop_front() {
                    Some(record) => record,
                    None => return,
                },
            };

            match self.try_send(&record).await {
                Ok(()) => continue,
                Err(NodeError::NoPath(_)) => {
                    debug!("No path to ground station; queuing record");
                    self.queue.lock().await.push_back(record);
                    return;
                }
                // Transport failure: the hop is already gossiped down and
                // pruned; retry the cycle against a fresh path.
                Err(_) => {
                    self.queue.lock().await.push_back(record);
                }
            }
        }
    }

    /// Encrypt → FEC-encode → noise-inject → POST to the planned next hop,
    /// sleeping the simulated link delay on both sides of the exchange.
    async fn try_send(&self, record: &TelemetryRecord) -> Result<(), NodeError> {
        let Some(hop) = self.node.update_nearest_satellite(SINK_ID).await else {
            return Err(NodeError::NoPath(SINK_ID));
        };

        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Record serialization failed ({e}); dropping");
                return Ok(());
            }
        };
        let cipher = match rsa_envelope::encrypt_blocks(&self.public_key, &payload) {
            Ok(cipher) => cipher,
            Err(e) => {
                warn!("Envelope encryption failed ({e}); dropping record");
                return Ok(());
            }
        };
        let mut encoded = hamming_encode(&cipher);
        let flipped = {
            let mut rng = rand::thread_rng();
            noise::apply_channel(&mut rng, &mut encoded, hop.first_hop_km)
        };
        if flipped > 0 {
            debug!("Channel flipped {flipped} bits over {:.0} km", hop.first_hop_km);
        }

        let sink_endpoint = self.node.routing.get(SINK_ID).await;
        let meta = EnvelopeMeta::for_group_traffic(SINK_ID, sink_endpoint.as_ref());

        let delay = simulate_leo_delay(hop.first_hop_km);
        tokio::time::sleep(delay).await;
        let result = meta
            .apply(self.node.http.post(hop.endpoint.url()))
            .body(encoded)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => {
                tokio::time::sleep(delay).await;
                info!("Status update sent to peer {} (path {:?})", hop.peer, hop.hops);
                Ok(())
            }
            Err(e) => {
                warn!("Send to peer {} failed: {e}", hop.peer);
                discovery::gossip_down(&self.node, hop.peer, None).await;
                self.node.routing.remove(hop.peer).await;
                Err(NodeError::Transport { peer: hop.peer, source: e })
            }
        }
    }

    /// Send loop at the 5-second cadence.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(SEND_INTERVAL);
        loop {
            ticker.tick().await;
            self.send_status_update().await;
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkAssets;
    use relay_types::{Position, SOURCE_ID};
    use std::collections::HashMap;
    use std::sync::OnceLock;

    fn public_key() -> RsaPublicKey {
        static KEY: OnceLock<RsaPublicKey> = OnceLock::new();
        KEY.get_or_init(|| {
            let private =
                rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen");
            RsaPublicKey::from(&private)
        })
        .clone()
    }

    fn farm() -> WindFarm {
        let assets = NetworkAssets {
            scan_ips: vec!["127.0.0.1".to_string()],
            seeded_peers: HashMap::new(),
            sink_position: Position { id: SINK_ID, lat: 53.35, long: -6.26, alt: 0.0 },
            source_position: Position { id: SOURCE_ID, lat: 53.70, long: -5.50, alt: 0.0 },
        };
        let node = PeerNode::new(SOURCE_ID, assets, Arc::new(SourcePlane)).unwrap();
        WindFarm::new(node, public_key())
    }

    #[tokio::test]
    async fn generate_produces_thirty_consistent_turbines() {
        let farm = farm();
        let record = farm.generate().await;

        assert_eq!(record.turbines.len(), NUM_TURBINES);
        assert!(record.turbines.contains_key("turbine_1"));
        assert!(record.turbines.contains_key("turbine_30"));
        assert_eq!(record.turbine_id, SOURCE_ID);
        assert!(record.timestamp > 0.0);

        // Reported power always matches the estimator on the turbine's own
        // jittered conditions, so an uncorrupted record never alerts.
        for (name, t) in &record.turbines {
            let expected =
                round2(farm.calculator.estimate_power_output(t.wind_speed, t.temperature, t.pressure));
            assert_eq!(t.power_output, expected, "{name}");
            assert!(t.wind_speed >= 0.0);
        }
    }

    #[tokio::test]
    async fn unreachable_overlay_queues_every_record() {
        let farm = farm();
        // Routing table holds only the source itself: no path can exist.
        for _ in 0..3 {
            farm.send_status_update().await;
        }
        assert_eq!(farm.queue_len().await, 3);

        // FIFO: the queue preserves generation order.
        let queued = farm.queue.lock().await;
        let stamps: Vec<f64> = queued.iter().map(|r| r.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(stamps, sorted);
    }

    #[tokio::test]
    async fn source_plane_acknowledges_and_drops() {
        let farm = farm();
        let reply = SourcePlane
            .ingest(&farm.node, EnvelopeMeta::default(), Bytes::from_static(b"xx"))
            .await;
        assert_eq!(reply["message"], "received");
    }
}
