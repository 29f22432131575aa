//! Sealing and fingerprinting primitives for authentication tokens.
//!
//! Session tokens carry their payload as an AES-256-GCM sealed blob inside the
//! signed JWT claims, so user identifiers and roles are not readable from an
//! intercepted token without the service's encryption key. Refresh tokens are
//! additionally fingerprinted (SHA-256) before being persisted, so the stored
//! rows are useless to an attacker who obtains the database contents.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Required key length for payload sealing (AES-256)
pub const PAYLOAD_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits)
const NONCE_LEN: usize = 12;

/// Seal a payload with AES-256-GCM under the given 32-byte key.
///
/// Returns base64(nonce || ciphertext). A fresh random nonce is generated per
/// call, so sealing the same payload twice yields different outputs.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<String, anyhow::Error> {
    if key.len() != PAYLOAD_KEY_LEN {
        return Err(anyhow::anyhow!(
            "sealing key must be {} bytes (256 bits), got {} bytes",
            PAYLOAD_KEY_LEN,
            key.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng().fill(&mut nonce_bytes[..]);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    // Combine nonce + ciphertext and encode as base64
    let mut result = nonce_bytes.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(result))
}

/// Open a payload produced by [`seal`].
///
/// Fails on a wrong key, a truncated blob, or any tampering with the
/// ciphertext (GCM authenticates the whole message).
pub fn open(key: &[u8], sealed_b64: &str) -> Result<Vec<u8>, anyhow::Error> {
    if key.len() != PAYLOAD_KEY_LEN {
        return Err(anyhow::anyhow!(
            "sealing key must be {} bytes (256 bits), got {} bytes",
            PAYLOAD_KEY_LEN,
            key.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))?;

    let sealed = general_purpose::STANDARD
        .decode(sealed_b64)
        .map_err(|e| anyhow::anyhow!("Failed to decode sealed payload: {}", e))?;

    if sealed.len() < NONCE_LEN {
        return Err(anyhow::anyhow!("Sealed payload too short"));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

    Ok(plaintext)
}

/// Generate a secure random secret for password-reset tokens.
///
/// 32 bytes (256 bits) of cryptographically secure random data, encoded as
/// base64url without padding (43 characters).
pub fn generate_token_secret() -> String {
    let mut secret_bytes = [0u8; 32];
    rng().fill(&mut secret_bytes[..]);

    general_purpose::URL_SAFE_NO_PAD.encode(secret_bytes)
}

/// Deterministic SHA-256 fingerprint of a token string, hex-encoded.
///
/// Used to look up persisted refresh tokens without storing the raw token.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TEST_KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_seal_open_roundtrip() {
        let plaintext = b"{\"sub\":\"550e8400-e29b-41d4-a716-446655440000\"}";

        let sealed = seal(&TEST_KEY, plaintext).expect("sealing should succeed");

        // Should be valid base64
        assert!(general_purpose::STANDARD.decode(&sealed).is_ok());

        let opened = open(&TEST_KEY, &sealed).expect("opening should succeed");
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_seal_produces_different_ciphertexts() {
        let plaintext = b"same payload";

        let sealed1 = seal(&TEST_KEY, plaintext).unwrap();
        let sealed2 = seal(&TEST_KEY, plaintext).unwrap();

        // Random nonce per call
        assert_ne!(sealed1, sealed2);

        assert_eq!(open(&TEST_KEY, &sealed1).unwrap(), plaintext);
        assert_eq!(open(&TEST_KEY, &sealed2).unwrap(), plaintext);
    }

    #[test]
    fn test_open_with_wrong_key() {
        let sealed = seal(&TEST_KEY, b"secret").unwrap();

        let wrong_key = [8u8; 32];
        assert!(open(&wrong_key, &sealed).is_err());
    }

    #[test]
    fn test_open_tampered_payload() {
        let sealed = seal(&TEST_KEY, b"secret").unwrap();

        let mut raw = general_purpose::STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = general_purpose::STANDARD.encode(raw);

        assert!(open(&TEST_KEY, &tampered).is_err());
    }

    #[test]
    fn test_open_truncated_payload() {
        let result = open(&TEST_KEY, &general_purpose::STANDARD.encode([0u8; 5]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(seal(&[0u8; 16], b"data").is_err());
        assert!(open(&[0u8; 16], "AAAA").is_err());
    }

    #[test]
    fn test_generate_token_secret_format() {
        let secret = generate_token_secret();

        // base64url of 32 bytes, no padding
        assert_eq!(secret.len(), 43);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!secret.contains('='));
    }

    #[test]
    fn test_generate_token_secret_uniqueness() {
        let mut secrets = HashSet::new();
        for _ in 0..1000 {
            assert!(secrets.insert(generate_token_secret()), "generated duplicate token secret");
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let fp1 = fingerprint("some.jwt.token");
        let fp2 = fingerprint("some.jwt.token");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64); // SHA-256 hex

        assert_ne!(fingerprint("other.jwt.token"), fp1);
    }
}
