//! rsa_envelope.rs — RSA block framing for the end-to-end envelope
//!
//! 2048-bit RSA with PKCS#1 v1.5 padding permits at most 245 plaintext
//! bytes per operation, so the serialized record is encrypted in 245-byte
//! plaintext chunks producing 256-byte ciphertext chunks, concatenated.
//! The framing is byte-exact: the sink splits on 256-byte boundaries and
//! anything else is a permanent decode failure.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::{NodeError, Result};

pub const PLAINTEXT_BLOCK: usize = 245;
pub const CIPHERTEXT_BLOCK: usize = 256;

// ── Key loading (fatal at startup when missing) ───────────────────────────────

pub fn load_public_key(path: &Path) -> Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;
    RsaPublicKey::from_pkcs1_pem(&pem)
        .map_err(|e| NodeError::Config(format!("bad public key {}: {e}", path.display())))
}

pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;
    RsaPrivateKey::from_pkcs1_pem(&pem)
        .map_err(|e| NodeError::Config(format!("bad private key {}: {e}", path.display())))
}

// ── Block cipher framing ──────────────────────────────────────────────────────

/// Encrypt `plaintext` in 245-byte chunks; output length is a multiple of
/// 256 bytes.
pub fn encrypt_blocks(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(plaintext.len().div_ceil(PLAINTEXT_BLOCK) * CIPHERTEXT_BLOCK);
    for chunk in plaintext.chunks(PLAINTEXT_BLOCK) {
        let block = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|e| NodeError::Decode(format!("rsa encrypt: {e}")))?;
        out.extend_from_slice(&block);
    }
    Ok(out)
}

/// Decrypt a concatenation of 256-byte ciphertext blocks.
pub fn decrypt_blocks(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % CIPHERTEXT_BLOCK != 0 {
        return Err(NodeError::Decode(format!(
            "ciphertext length {} is not a whole number of {CIPHERTEXT_BLOCK}-byte blocks",
            ciphertext.len()
        )));
    }
    let mut out = Vec::with_capacity(ciphertext.len() / CIPHERTEXT_BLOCK * PLAINTEXT_BLOCK);
    for chunk in ciphertext.chunks(CIPHERTEXT_BLOCK) {
        let block = key
            .decrypt(Pkcs1v15Encrypt, chunk)
            .map_err(|e| NodeError::Decode(format!("rsa decrypt: {e}")))?;
        out.extend_from_slice(&block);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen")
        })
    }

    #[test]
    fn short_payload_round_trips_in_one_block() {
        let private = test_key();
        let public = RsaPublicKey::from(private);
        let cipher = encrypt_blocks(&public, b"hello").unwrap();
        assert_eq!(cipher.len(), CIPHERTEXT_BLOCK);
        assert_eq!(decrypt_blocks(private, &cipher).unwrap(), b"hello");
    }

    #[test]
    fn long_payload_uses_245_byte_framing() {
        let private = test_key();
        let public = RsaPublicKey::from(private);
        let payload: Vec<u8> = (0..600).map(|i| (i % 251) as u8).collect();
        let cipher = encrypt_blocks(&public, &payload).unwrap();
        // 600 bytes → 3 plaintext chunks → 3 ciphertext blocks.
        assert_eq!(cipher.len(), 3 * CIPHERTEXT_BLOCK);
        assert_eq!(decrypt_blocks(private, &cipher).unwrap(), payload);
    }

    #[test]
    fn truncated_ciphertext_is_a_decode_error() {
        let private = test_key();
        let public = RsaPublicKey::from(private);
        let cipher = encrypt_blocks(&public, b"payload").unwrap();
        let err = decrypt_blocks(private, &cipher[..CIPHERTEXT_BLOCK - 1]).unwrap_err();
        assert!(matches!(err, NodeError::Decode(_)));
    }

    #[test]
    fn corrupted_block_is_a_decode_error() {
        let private = test_key();
        let public = RsaPublicKey::from(private);
        let mut cipher = encrypt_blocks(&public, b"payload").unwrap();
        cipher[10] ^= 0xFF;
        assert!(matches!(decrypt_blocks(private, &cipher), Err(NodeError::Decode(_))));
    }

    #[test]
    fn envelope_round_trips_through_the_fec_layer() {
        let private = test_key();
        let public = RsaPublicKey::from(private);
        let record = br#"{"timestamp":1700000000.0,"turbine_id":0,"turbines":{}}"#.to_vec();

        let cipher = encrypt_blocks(&public, &record).unwrap();
        let encoded = channel_sim::hamming_encode(&cipher);
        let corrected = channel_sim::hamming_decode(&encoded);
        assert_eq!(corrected, cipher);
        assert_eq!(decrypt_blocks(private, &corrected).unwrap(), record);
    }
}
