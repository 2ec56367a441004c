//! # relay-types
//!
//! Shared wire-level types for the Skylink store-and-forward overlay.
//!
//! These types are used by:
//! - `node`: the peer runtime (wind farm, satellite relays, ground station)
//! - `packages/channel-sim`: the channel-layer codec operates on the opaque
//!   envelope bytes and never sees these structures
//!
//! ## ID Conventions
//!
//! - **PeerId `-1`**: the ground station (sink), always on port 33999
//! - **PeerId `0`**: the offshore wind farm (source), always on port 33000
//! - **PeerId `1..=10`**: satellite relays, on ports `33000 + id`
//!
//! Every node belongs to administrative group `8`; traffic carrying another
//! group id is forwarded verbatim to its `X-Destination-*` endpoint instead
//! of being re-routed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Peer identity ─────────────────────────────────────────────────────────────

/// Signed peer identifier. `-1` = sink, `0` = source, positive = relay.
pub type PeerId = i32;

pub const SINK_ID: PeerId = -1;
pub const SOURCE_ID: PeerId = 0;

/// Administrative group shared by source, relays, and sink.
pub const GROUP_ID: u32 = 8;

pub const SOURCE_PORT: u16 = 33000;
pub const SINK_PORT: u16 = 33999;

/// Scanner probe range: source + relay ports, inclusive.
pub const SCAN_PORT_FIRST: u16 = 33000;
pub const SCAN_PORT_LAST: u16 = 33010;

/// Listen port for a peer id (relay `i` binds `33000 + i`).
pub fn port_for(id: PeerId) -> u16 {
    match id {
        SINK_ID => SINK_PORT,
        SOURCE_ID => SOURCE_PORT,
        relay => SOURCE_PORT + relay as u16,
    }
}

// ── Device roles ──────────────────────────────────────────────────────────────

/// Numeric device-type codes carried in announce replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    /// Telemetry producer (offshore wind farm)
    WindFarm = 0,
    /// Store-and-forward relay
    Satellite = 1,
    /// Telemetry consumer (ground station)
    GroundStation = 2,
}

impl DeviceType {
    pub fn for_peer(id: PeerId) -> Self {
        match id {
            SINK_ID => Self::GroundStation,
            SOURCE_ID => Self::WindFarm,
            _ => Self::Satellite,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

/// A reachable peer address (IPv4 host + TCP port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Base URL for this peer's HTTP server.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Positions ─────────────────────────────────────────────────────────────────

/// Geodetic position of a device. Source and sink are static (from
/// `assets/device_positions.csv`); relay positions are computed from the
/// orbital oracle at a given wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PeerId,
    pub lat: f64,
    pub long: f64,
    /// Altitude in kilometres (0 for ground devices, 500 for relays).
    pub alt: f64,
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Sensor readings for a single turbine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurbineReading {
    /// Ambient temperature, °C
    pub temperature: f64,
    /// Air pressure, Pa
    pub pressure: f64,
    /// Wind speed, m/s
    pub wind_speed: f64,
    /// Reported electrical output, kW
    pub power_output: f64,
}

/// One status update from the wind farm: a wall-clock timestamp plus a
/// reading per turbine, keyed `turbine_1` .. `turbine_N`.
///
/// Records carry a timestamp but no sequence number — delivery is
/// at-least-once and the sink orders its log post-hoc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Seconds since the Unix epoch at generation time.
    pub timestamp: f64,
    pub turbine_id: PeerId,
    pub turbines: BTreeMap<String, TurbineReading>,
}

// ── Envelope headers ──────────────────────────────────────────────────────────

/// HTTP header names attached to every data POST. The body is the opaque
/// encoded envelope; these headers are the only metadata relays look at.
pub mod headers {
    /// Numeric sink id (decimal string).
    pub const DESTINATION_ID: &str = "X-Destination-ID";
    /// Fallback next-hop host for traffic from another group.
    pub const DESTINATION_IP: &str = "X-Destination-IP";
    /// Fallback next-hop port for traffic from another group.
    pub const DESTINATION_PORT: &str = "X-Destination-Port";
    /// Administrative group of the originating overlay.
    pub const GROUP_ID: &str = "X-Group-ID";
}

// ── Announce exchange ─────────────────────────────────────────────────────────

/// Query string on `GET /` — the caller identifies itself so the callee can
/// register it in its routing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceQuery {
    #[serde(rename = "device-id")]
    pub device_id: PeerId,
    #[serde(rename = "device-port")]
    pub device_port: u16,
}

/// JSON body of the announce reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceReply {
    #[serde(rename = "device-type")]
    pub device_type: u8,
    #[serde(rename = "device-id")]
    pub device_id: PeerId,
    #[serde(rename = "group-id")]
    pub group_id: u32,
}
