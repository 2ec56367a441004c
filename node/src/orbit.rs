//! orbit.rs — orbital position oracle and link geometry
//!
//! Relay positions are not tracked state: any node can compute where relay
//! `i` is at instant `t`. Each relay sweeps a chord between two antipodal
//! points on a 750 km circle around the source/sink midpoint, with the chord
//! angle seeded from the relay id, so every node in the overlay agrees on
//! the geometry without exchanging it. Source and sink positions are static
//! (from `assets/device_positions.csv`).

use std::f64::consts::{FRAC_PI_4, PI, TAU};
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use relay_types::{PeerId, Position, SINK_ID, SOURCE_ID};

pub const RELAY_ALTITUDE_KM: f64 = 500.0;

const SWEEP_RADIUS_KM: f64 = 750.0;
const KM_PER_DEGREE: f64 = 111.0;
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Kilometres per millisecond.
const LIGHT_SPEED_KM_MS: f64 = 299.792_458;

// ── Oracle ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PositionOracle {
    source: Position,
    sink: Position,
}

impl PositionOracle {
    pub fn new(source: Position, sink: Position) -> Self {
        Self { source, sink }
    }

    pub fn position(&self, id: PeerId, at: DateTime<Local>) -> Position {
        match id {
            SOURCE_ID => self.source,
            SINK_ID => self.sink,
            relay => self.relay_position(relay, at),
        }
    }

    /// Position of relay `id` at wall-clock instant `at`. Deterministic:
    /// the chord geometry is seeded from the id alone, and the sweep
    /// parameter depends only on the instant's minute-of-cycle and second.
    fn relay_position(&self, id: PeerId, at: DateTime<Local>) -> Position {
        let mid_lat = (self.source.lat + self.sink.lat) / 2.0;
        let mid_long = (self.source.long + self.sink.long) / 2.0;

        let mut rng = StdRng::seed_from_u64(id as u64);
        let angle1: f64 = rng.gen_range(-FRAC_PI_4..3.0 * FRAC_PI_4);
        let angle2 = (angle1 + PI) % TAU;

        let radius_deg = SWEEP_RADIUS_KM / KM_PER_DEGREE;
        let lat1 = mid_lat + radius_deg * angle1.sin();
        let long1 = mid_long + (radius_deg / mid_lat.to_radians().cos()) * angle1.cos();
        let lat2 = mid_lat + radius_deg * angle2.sin();
        let long2 = mid_long + (radius_deg / mid_lat.to_radians().cos()) * angle2.cos();

        // Six-minute sweep cycle, phase-shifted 30 s per id.
        let time_factor = ((at.minute() % 6) * 60 + at.second()) as i64;
        let t = (time_factor + 30 * id as i64).rem_euclid(360) as f64 / 360.0;

        Position {
            id,
            lat: lat1 + t * (lat2 - lat1),
            long: long1 + t * (long2 - long1),
            alt: RELAY_ALTITUDE_KM,
        }
    }
}

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Great-circle distance in km.
pub fn haversine_km(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    let (lat1, long1, lat2, long2) =
        (lat1.to_radians(), long1.to_radians(), lat2.to_radians(), long2.to_radians());
    let dlat = lat2 - lat1;
    let dlong = long2 - long1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlong / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Link distance in km: ground-track haversine combined with the altitude
/// difference between the two devices.
pub fn slant_distance_km(a: &Position, b: &Position) -> f64 {
    let ground = haversine_km(a.lat, a.long, b.lat, b.long);
    let dalt = a.alt - b.alt;
    (ground.powi(2) + dalt.powi(2)).sqrt()
}

// ── Propagation delay ─────────────────────────────────────────────────────────

/// One-way propagation delay for a link of `distance_km`: speed-of-light
/// base plus 2–8 ms of jitter.
pub fn simulate_leo_delay(distance_km: f64) -> Duration {
    let base_ms = distance_km / LIGHT_SPEED_KM_MS;
    let jitter_ms = Uniform::new(2.0, 8.0).sample(&mut rand::thread_rng());
    Duration::from_secs_f64((base_ms + jitter_ms) / 1000.0)
}
