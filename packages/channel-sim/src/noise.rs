//! noise.rs — FSPL link model and bit-flip injector
//!
//! Link budget at 2.4 GHz, 50 W transmit, 290 K system temperature, 10 MHz
//! bandwidth. Distances are the planner's slant distances in kilometres and
//! the resulting dB figure feeds `0.5·erfc(SNR/√2)` directly — the same
//! expression the overlay has always used, so the BER curve is part of the
//! wire contract rather than a physics statement.

use rand::Rng;

// ── Link budget constants ─────────────────────────────────────────────────────

const CARRIER_HZ: f64 = 2.4e9;
const TX_POWER_W: f64 = 50.0;
const SYSTEM_TEMP_K: f64 = 290.0;
const BANDWIDTH_HZ: f64 = 10.0e6;
const BOLTZMANN: f64 = 1.380_649e-23;
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Lower clamp so Dijkstra edge weights stay positive on absurd links.
const MIN_LINK_QUALITY: f64 = 0.1;

// ── SNR model ─────────────────────────────────────────────────────────────────

/// Free-space path loss in dB for a link of `distance_km`.
pub fn fspl_db(distance_km: f64) -> f64 {
    20.0 * (4.0 * std::f64::consts::PI * distance_km * CARRIER_HZ / SPEED_OF_LIGHT).log10()
}

fn tx_power_dbm() -> f64 {
    10.0 * (TX_POWER_W * 1000.0).log10()
}

fn noise_floor_dbm() -> f64 {
    10.0 * (BOLTZMANN * SYSTEM_TEMP_K * BANDWIDTH_HZ * 1000.0).log10()
}

/// Signal-to-noise figure for a link of `distance_km`, in dB.
pub fn snr_db(distance_km: f64) -> f64 {
    tx_power_dbm() - fspl_db(distance_km) - noise_floor_dbm()
}

/// Routing weight denominator: higher SNR → higher quality → cheaper edge.
pub fn link_quality(distance_km: f64) -> f64 {
    snr_db(distance_km).max(MIN_LINK_QUALITY)
}

/// BPSK/QPSK bit error probability for the given SNR figure.
pub fn bit_error_rate(snr: f64) -> f64 {
    (0.5 * libm::erfc(snr / std::f64::consts::SQRT_2)).clamp(0.0, 1.0)
}

// ── Bit-flip injector ─────────────────────────────────────────────────────────

/// Flip each bit of `data` independently with probability `ber`.
/// Returns the number of bits flipped.
pub fn inject_noise<R: Rng>(rng: &mut R, data: &mut [u8], ber: f64) -> usize {
    if ber <= 0.0 {
        return 0;
    }
    let mut flipped = 0;
    for byte in data.iter_mut() {
        for bit in 0..8 {
            if rng.gen_bool(ber.min(1.0)) {
                *byte ^= 1 << bit;
                flipped += 1;
            }
        }
    }
    flipped
}

/// Run a byte stream through the channel for one link: derive the BER from
/// the link distance and flip bits in place.
pub fn apply_channel<R: Rng>(rng: &mut R, data: &mut [u8], distance_km: f64) -> usize {
    inject_noise(rng, data, bit_error_rate(snr_db(distance_km)))
}
