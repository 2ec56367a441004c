//! sink.rs — the ground station plane
//!
//! Terminal end of the overlay: FEC-decode, RSA-decrypt, parse, persist,
//! validate. Decode failures of any kind are permanent — the sink reports a
//! structured failure and never asks for a retry. Threshold breaches are
//! alerts, not errors; the record is persisted either way.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use channel_sim::hamming_decode;
use relay_types::TelemetryRecord;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{NodeError, Result};
use crate::rsa_envelope;
use crate::server::{EnvelopeMeta, IngestPlane, PeerNode};
use crate::turbine::WindTurbineCalculator;

pub const CSV_FILE: &str = "turbine_data.csv";
pub const CSV_HEADER: &str =
    "timestamp,turbine_id,turbine,temperature,pressure,wind_speed,power_output";

/// Reported vs estimated power divergence that raises an alert, kW.
pub const POWER_ALERT_THRESHOLD_KW: f64 = 200.0;

/// Body of the structured failure reply (error taxonomy class 2).
pub const FAILURE_MESSAGE: &str = "Decryption failed or message is corrupted";

pub struct SinkPlane {
    private_key: RsaPrivateKey,
    calculator: WindTurbineCalculator,
    csv_path: PathBuf,
    csv_lock: Mutex<()>,
}

impl SinkPlane {
    /// Load the private key and start a fresh CSV log, truncating whatever
    /// a previous run left behind.
    pub fn new(private_key_path: &Path, data_dir: &Path) -> Result<Self> {
        let private_key = rsa_envelope::load_private_key(private_key_path)?;
        std::fs::create_dir_all(data_dir)?;

        let csv_path = data_dir.join(CSV_FILE);
        if csv_path.exists() {
            info!("Erasing previous CSV log at {}", csv_path.display());
        }
        std::fs::write(&csv_path, format!("{CSV_HEADER}\n"))?;
        info!("CSV log ready at {}", csv_path.display());

        Ok(Self {
            private_key,
            calculator: WindTurbineCalculator::default(),
            csv_path,
            csv_lock: Mutex::new(()),
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn decode_record(&self, body: &[u8]) -> Result<TelemetryRecord> {
        let corrected = hamming_decode(body);
        let plaintext = rsa_envelope::decrypt_blocks(&self.private_key, &corrected)?;
        let text = String::from_utf8(plaintext)
            .map_err(|e| NodeError::Decode(format!("utf-8: {e}")))?;
        serde_json::from_str(&text).map_err(|e| NodeError::Decode(format!("json: {e}")))
    }

    /// One CSV row per turbine, appended under the write lock so concurrent
    /// deliveries cannot interleave rows.
    async fn persist(&self, record: &TelemetryRecord) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut rows = String::new();
        for (name, t) in &record.turbines {
            let _ = writeln!(
                rows,
                "{},{},{name},{},{},{},{}",
                record.timestamp, record.turbine_id, t.temperature, t.pressure, t.wind_speed,
                t.power_output
            );
        }

        let _guard = self.csv_lock.lock().await;
        let mut file = OpenOptions::new().append(true).open(&self.csv_path).await?;
        file.write_all(rows.as_bytes()).await
    }

    /// Compare each turbine's reported output against the estimate its own
    /// weather readings support.
    fn alerts(&self, record: &TelemetryRecord) -> BTreeMap<String, String> {
        let mut alerts = BTreeMap::new();
        for (name, t) in &record.turbines {
            let estimated = round2(self.calculator.estimate_power_output(
                t.wind_speed,
                t.temperature,
                t.pressure,
            ));
            if (estimated - t.power_output).abs() > POWER_ALERT_THRESHOLD_KW {
                alerts.insert(
                    name.clone(),
                    format!(
                        "Expected {estimated}kW from local weather variables but received {}kW",
                        t.power_output
                    ),
                );
            }
        }
        alerts
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[async_trait]
impl IngestPlane for SinkPlane {
    async fn ingest(&self, _node: &Arc<PeerNode>, _meta: EnvelopeMeta, body: Bytes) -> Value {
        let record = match self.decode_record(&body) {
            Ok(record) => record,
            Err(e) => {
                warn!("Envelope rejected: {e}");
                return json!({ "message": FAILURE_MESSAGE });
            }
        };

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
        info!(
            "Record from turbine {} ({} turbines), end-to-end delay {:.4}s",
            record.turbine_id,
            record.turbines.len(),
            now - record.timestamp
        );

        if let Err(e) = self.persist(&record).await {
            warn!("CSV write failed: {e}");
        }

        let alerts = self.alerts(&record);
        if !alerts.is_empty() {
            warn!("Alert - parameters exceeded thresholds: {alerts:?}");
        }

        json!({ "message": "Data received at Ground Station", "alerts": alerts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkAssets;
    use channel_sim::hamming_encode;
    use relay_types::{Position, TurbineReading, SINK_ID, SOURCE_ID};
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
    use rsa::RsaPublicKey;
    use std::collections::HashMap;
    use std::sync::OnceLock;

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen"))
    }

    fn sink_in(dir: &Path) -> SinkPlane {
        let key_path = dir.join("private.pem");
        let pem = test_key().to_pkcs1_pem(LineEnding::LF).unwrap();
        std::fs::write(&key_path, pem.as_bytes()).unwrap();
        SinkPlane::new(&key_path, dir).unwrap()
    }

    fn node() -> Arc<PeerNode> {
        let assets = NetworkAssets {
            scan_ips: vec!["127.0.0.1".to_string()],
            seeded_peers: HashMap::new(),
            sink_position: Position { id: SINK_ID, lat: 53.35, long: -6.26, alt: 0.0 },
            source_position: Position { id: SOURCE_ID, lat: 53.70, long: -5.50, alt: 0.0 },
        };
        PeerNode::new(SINK_ID, assets, Arc::new(crate::relay::RelayPlane)).unwrap()
    }

    fn record(power_offset_kw: f64) -> TelemetryRecord {
        let calc = WindTurbineCalculator::default();
        let mut turbines = std::collections::BTreeMap::new();
        for i in 1..=3 {
            let wind = 8.0 + i as f64 * 0.1;
            let power = round2(calc.estimate_power_output(wind, 11.0, 101_325.0));
            turbines.insert(
                format!("turbine_{i}"),
                TurbineReading {
                    temperature: 11.0,
                    pressure: 101_325.0,
                    wind_speed: wind,
                    power_output: power + power_offset_kw,
                },
            );
        }
        TelemetryRecord { timestamp: 1_700_000_000.0, turbine_id: SOURCE_ID, turbines }
    }

    fn envelope(record: &TelemetryRecord) -> Vec<u8> {
        let public = RsaPublicKey::from(test_key());
        let cipher =
            rsa_envelope::encrypt_blocks(&public, &serde_json::to_vec(record).unwrap()).unwrap();
        hamming_encode(&cipher)
    }

    #[tokio::test]
    async fn clean_envelope_lands_one_csv_row_per_turbine() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let record = record(0.0);

        let reply = sink
            .ingest(&node(), EnvelopeMeta::default(), Bytes::from(envelope(&record)))
            .await;
        assert_eq!(reply["message"], "Data received at Ground Station");
        assert_eq!(reply["alerts"], json!({}));

        let csv = std::fs::read_to_string(sink.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 1 + record.turbines.len());
        assert!(lines[1].starts_with("1700000000,0,turbine_1,"));
    }

    #[tokio::test]
    async fn single_bit_flip_is_corrected_by_the_fec_layer() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let record = record(0.0);

        let mut noisy = envelope(&record);
        noisy[17] ^= 0b0001_0000;

        let reply = sink.ingest(&node(), EnvelopeMeta::default(), Bytes::from(noisy)).await;
        assert_eq!(reply["message"], "Data received at Ground Station");
        assert_eq!(reply["alerts"], json!({}));
    }

    #[tokio::test]
    async fn divergent_power_raises_an_alert_but_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let record = record(350.0);

        let reply = sink
            .ingest(&node(), EnvelopeMeta::default(), Bytes::from(envelope(&record)))
            .await;
        assert_eq!(reply["message"], "Data received at Ground Station");
        let alerts = reply["alerts"].as_object().unwrap();
        assert_eq!(alerts.len(), record.turbines.len());
        assert!(alerts["turbine_1"].as_str().unwrap().contains("Expected"));

        let csv = std::fs::read_to_string(sink.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1 + record.turbines.len());
    }

    #[tokio::test]
    async fn undecryptable_envelope_reports_failure_and_leaves_csv_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());

        let garbage = hamming_encode(&[0x42u8; 256]);
        let reply = sink.ingest(&node(), EnvelopeMeta::default(), Bytes::from(garbage)).await;
        assert_eq!(reply["message"], FAILURE_MESSAGE);

        let csv = std::fs::read_to_string(sink.csv_path()).unwrap();
        assert_eq!(csv.trim_end(), CSV_HEADER);
    }

    #[test]
    fn startup_truncates_a_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CSV_FILE), "stale,rows\n1,2\n").unwrap();
        let sink = sink_in(dir.path());
        let csv = std::fs::read_to_string(sink.csv_path()).unwrap();
        assert_eq!(csv.trim_end(), CSV_HEADER);
    }
}
