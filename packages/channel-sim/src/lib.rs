//! # channel-sim
//!
//! Channel-layer simulation for the Skylink overlay.
//!
//! Two pieces, applied on opposite ends of the relay mesh:
//! - [`hamming`]: Hamming(7,4) forward error correction. The source encodes
//!   the encrypted envelope; only the ground station decodes it. Relays treat
//!   the stream as opaque bytes, so one corrected bit per 7-bit block covers
//!   the whole end-to-end path.
//! - [`noise`]: free-space-path-loss SNR model at 2.4 GHz that turns a link
//!   distance into a bit error rate, plus the per-bit flip injector the
//!   source runs over the encoded stream.

pub mod hamming;
pub mod noise;

pub use hamming::{hamming_decode, hamming_encode};
pub use noise::{bit_error_rate, inject_noise, link_quality, snr_db};
