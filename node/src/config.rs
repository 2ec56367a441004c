//! config.rs — static configuration loaded at startup
//!
//! Three asset files drive a node:
//! - `assets/ip.txt`: newline-separated IPs the discovery scanner probes
//! - `assets/other_satellites.txt`: pre-seeded peers from another
//!   administrative domain, lines of `id ip port`
//! - `assets/device_positions.csv`: static positions for the ground station
//!   (id -1) and the wind farm (id 0), columns `id,lat,long,alt`
//!
//! A missing or malformed ip.txt / positions file is fatal (error taxonomy
//! class 4); the pre-seeded peer list is optional and defaults to empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use relay_types::{Endpoint, PeerId, Position, SINK_ID, SOURCE_ID};
use tracing::info;

use crate::error::{NodeError, Result};

pub const DEFAULT_ASSET_DIR: &str = "assets";
pub const DEFAULT_KEY_DIR: &str = "keys";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const PUBLIC_KEY_FILE: &str = "public.pem";
pub const PRIVATE_KEY_FILE: &str = "private.pem";

/// Everything a node reads from disk before it starts serving.
#[derive(Debug, Clone)]
pub struct NetworkAssets {
    /// Hosts the scanner sweeps.
    pub scan_ips: Vec<String>,
    /// Out-of-band peers honored by the scanner in addition to probe results.
    pub seeded_peers: HashMap<PeerId, Endpoint>,
    /// Static ground-station position (id -1).
    pub sink_position: Position,
    /// Static wind-farm position (id 0).
    pub source_position: Position,
}

impl NetworkAssets {
    pub fn load(asset_dir: &Path) -> Result<Self> {
        let scan_ips = read_scan_ips(&asset_dir.join("ip.txt"))?;
        let seeded_peers = read_seeded_peers(&asset_dir.join("other_satellites.txt"))?;
        let (sink_position, source_position) =
            read_static_positions(&asset_dir.join("device_positions.csv"))?;
        info!(
            "Loaded network assets: {} scan IPs, {} pre-seeded peers",
            scan_ips.len(),
            seeded_peers.len()
        );
        Ok(Self { scan_ips, seeded_peers, sink_position, source_position })
    }
}

fn read_scan_ips(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;
    let ips: Vec<String> =
        raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    if ips.is_empty() {
        return Err(NodeError::Config(format!("{} lists no IPs", path.display())));
    }
    Ok(ips)
}

fn read_seeded_peers(path: &Path) -> Result<HashMap<PeerId, Endpoint>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        // Another-domain peers are optional.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(NodeError::Config(format!("cannot read {}: {e}", path.display())));
        }
    };

    let mut peers = HashMap::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split_whitespace();
        let parsed = (|| {
            let id: PeerId = fields.next()?.parse().ok()?;
            let ip = fields.next()?.to_string();
            let port: u16 = fields.next()?.parse().ok()?;
            Some((id, Endpoint::new(ip, port)))
        })();
        match parsed {
            Some((id, endpoint)) => {
                peers.insert(id, endpoint);
            }
            None => {
                return Err(NodeError::Config(format!(
                    "bad line in {}: {line:?} (expected `id ip port`)",
                    path.display()
                )));
            }
        }
    }
    Ok(peers)
}

fn read_static_positions(path: &Path) -> Result<(Position, Position)> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;

    let mut sink = None;
    let mut source = None;
    // Header: id,lat,long,alt
    for line in raw.lines().skip(1).map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(NodeError::Config(format!(
                "bad row in {}: {line:?} (expected `id,lat,long,alt`)",
                path.display()
            )));
        }
        let position = Position {
            id: parse_field(fields[0], "id", path)?,
            lat: parse_field(fields[1], "lat", path)?,
            long: parse_field(fields[2], "long", path)?,
            alt: parse_field(fields[3], "alt", path)?,
        };
        match position.id {
            SINK_ID => sink = Some(position),
            SOURCE_ID => source = Some(position),
            _ => {} // relay rows are ignored; their positions come from the oracle
        }
    }

    match (sink, source) {
        (Some(sink), Some(source)) => Ok((sink, source)),
        _ => Err(NodeError::Config(format!(
            "{} must contain rows for ids {SINK_ID} and {SOURCE_ID}",
            path.display()
        ))),
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str, path: &Path) -> Result<T> {
    raw.parse()
        .map_err(|_| NodeError::Config(format!("bad {name} {raw:?} in {}", path.display())))
}

/// Key-file locations for the RSA envelope.
#[derive(Debug, Clone)]
pub struct KeyPaths {
    pub public: PathBuf,
    pub private: PathBuf,
}

impl KeyPaths {
    pub fn in_dir(key_dir: &Path) -> Self {
        Self { public: key_dir.join(PUBLIC_KEY_FILE), private: key_dir.join(PRIVATE_KEY_FILE) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_assets(dir: &Path, ips: &str, seeded: Option<&str>, positions: &str) {
        std::fs::write(dir.join("ip.txt"), ips).unwrap();
        if let Some(seeded) = seeded {
            std::fs::write(dir.join("other_satellites.txt"), seeded).unwrap();
        }
        let mut f = std::fs::File::create(dir.join("device_positions.csv")).unwrap();
        writeln!(f, "id,lat,long,alt").unwrap();
        f.write_all(positions.as_bytes()).unwrap();
    }

    #[test]
    fn loads_complete_asset_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(
            dir.path(),
            "127.0.0.1\n10.1.2.3\n",
            Some("42 10.9.9.9 33042\n"),
            "-1,53.35,-6.26,0\n0,53.70,-5.50,0\n",
        );

        let assets = NetworkAssets::load(dir.path()).unwrap();
        assert_eq!(assets.scan_ips, vec!["127.0.0.1", "10.1.2.3"]);
        assert_eq!(assets.seeded_peers[&42], Endpoint::new("10.9.9.9", 33042));
        assert_eq!(assets.sink_position.lat, 53.35);
        assert_eq!(assets.source_position.long, -5.50);
    }

    #[test]
    fn missing_ip_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("device_positions.csv"), "id,lat,long,alt\n").unwrap();
        assert!(matches!(NetworkAssets::load(dir.path()), Err(NodeError::Config(_))));
    }

    #[test]
    fn missing_seeded_peer_file_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), "127.0.0.1\n", None, "-1,1.0,2.0,0\n0,3.0,4.0,0\n");
        let assets = NetworkAssets::load(dir.path()).unwrap();
        assert!(assets.seeded_peers.is_empty());
    }

    #[test]
    fn positions_without_both_static_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), "127.0.0.1\n", None, "-1,1.0,2.0,0\n");
        assert!(matches!(NetworkAssets::load(dir.path()), Err(NodeError::Config(_))));
    }
}
