//! # relay-node
//!
//! Peer runtime for the Skylink store-and-forward overlay: one process per
//! node, three roles sharing the same HTTP surface.
//!
//! - `wind-farm` (id 0) generates telemetry, wraps it in the encrypted and
//!   FEC-encoded envelope, and pushes it toward the ground station.
//! - `satellite <id>` (ids 1..=10) accepts envelopes and forwards them
//!   hop-by-hop, re-planning around failed peers.
//! - `ground-station` (id -1) decodes, validates, and persists telemetry.
//!
//! Shared state inside a node is the routing table; everything else is
//! per-task. All outbound HTTP carries a 1-second total timeout.

pub mod config;
pub mod discovery;
pub mod error;
pub mod orbit;
pub mod planner;
pub mod relay;
pub mod routing;
pub mod rsa_envelope;
pub mod server;
pub mod sink;
pub mod source;
pub mod turbine;
pub mod weather;

pub use error::{NodeError, Result};
