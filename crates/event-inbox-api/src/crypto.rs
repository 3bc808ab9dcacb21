//! Cryptographic operations for payload storage and delivery signing.
//!
//! - AES-256-GCM encryption/decryption for payload blobs at rest
//! - HMAC-SHA256 computation for outbound delivery signatures

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// AES-256 key size in bytes.
const KEY_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// AES-256-GCM payload cipher
// ---------------------------------------------------------------------------

/// Authenticated encryption for payload blobs, keyed once at process start.
///
/// Blob format: `nonce || ciphertext || auth_tag`, raw bytes. Construction
/// fails on a missing or malformed key so the process refuses to start
/// rather than write blobs it cannot read back.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(key_b64: &str) -> Result<Self, ApiError> {
        if key_b64.is_empty() {
            return Err(ApiError::Cipher("payload encryption key is empty".into()));
        }

        let key = BASE64
            .decode(key_b64)
            .map_err(|e| ApiError::Cipher(format!("key base64 decode failed: {e}")))?;

        if key.len() != KEY_SIZE {
            return Err(ApiError::Cipher(format!(
                "key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ApiError::Cipher(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Encrypt plaintext into an opaque blob with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ApiError> {
        // SECURITY: nonces come straight from the operating system CSPRNG.
        use rand::rngs::OsRng;
        use rand::RngCore;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| ApiError::Cipher(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(blob)
    }

    /// Decrypt a blob produced by [`PayloadCipher::encrypt`].
    ///
    /// Fails on a short blob, a tampered ciphertext, or the wrong key.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, ApiError> {
        if blob.len() < NONCE_SIZE + 1 {
            return Err(ApiError::Cipher("encrypted blob too short".into()));
        }

        let nonce = Nonce::from_slice(&blob[..NONCE_SIZE]);

        self.cipher
            .decrypt(nonce, &blob[NONCE_SIZE..])
            .map_err(|e| ApiError::Cipher(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HMAC-SHA256 delivery signing
// ---------------------------------------------------------------------------

/// Compute the HMAC-SHA256 signature for an outbound delivery.
///
/// The signature covers `{timestamp}.{body}` to prevent replay attacks.
/// Returns a lowercase hex string.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Verify an HMAC-SHA256 signature using constant-time comparison.
pub fn verify_signature(expected_hex: &str, secret: &str, timestamp: &str, body: &[u8]) -> bool {
    let computed = compute_signature(secret, timestamp, body);
    constant_time_eq(expected_hex.as_bytes(), computed.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> PayloadCipher {
        PayloadCipher::from_base64(&BASE64.encode([0x42u8; 32])).expect("cipher init")
    }

    // --- key handling ---

    #[test]
    fn test_empty_key_rejected() {
        assert!(PayloadCipher::from_base64("").is_err());
    }

    #[test]
    fn test_invalid_base64_key_rejected() {
        assert!(PayloadCipher::from_base64("not-base64!!!").is_err());
    }

    #[test]
    fn test_wrong_length_key_rejected() {
        let short = BASE64.encode([0u8; 16]);
        let result = PayloadCipher::from_base64(&short);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("32 bytes"));
    }

    // --- AES-GCM tests ---

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let plaintext = b"{\"charge\":\"ch_123\",\"amount\":4200}";

        let blob = cipher.encrypt(plaintext).expect("encryption failed");
        let decrypted = cipher.decrypt(&blob).expect("decryption failed");

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let cipher = test_cipher();
        let blob = cipher.encrypt(b"").expect("encryption failed");
        let decrypted = cipher.decrypt(&blob).expect("decryption failed");
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_different_encryptions_produce_different_blobs() {
        let cipher = test_cipher();

        let blob1 = cipher.encrypt(b"same payload").expect("encryption failed");
        let blob2 = cipher.encrypt(b"same payload").expect("encryption failed");

        // Random nonce makes blobs differ
        assert_ne!(blob1, blob2);

        assert_eq!(
            cipher.decrypt(&blob1).unwrap(),
            cipher.decrypt(&blob2).unwrap()
        );
    }

    #[test]
    fn test_blob_embeds_nonce_and_tag() {
        let cipher = test_cipher();
        let blob = cipher.encrypt(b"x").expect("encryption failed");
        // 12-byte nonce + 1 byte ciphertext + 16-byte GCM tag
        assert_eq!(blob.len(), 12 + 1 + 16);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let cipher1 = test_cipher();
        let cipher2 =
            PayloadCipher::from_base64(&BASE64.encode([0x43u8; 32])).expect("cipher init");

        let blob = cipher1.encrypt(b"secret payload").expect("encryption failed");
        assert!(cipher2.decrypt(&blob).is_err());
    }

    #[test]
    fn test_decrypt_tampered_blob_fails() {
        let cipher = test_cipher();
        let mut blob = cipher.encrypt(b"payload").expect("encryption failed");
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(cipher.decrypt(&blob).is_err());
    }

    #[test]
    fn test_decrypt_too_short_fails() {
        let cipher = test_cipher();
        assert!(cipher.decrypt(&[0u8; 5]).is_err());
    }

    // --- HMAC-SHA256 tests ---

    #[test]
    fn test_signature_deterministic() {
        let sig1 = compute_signature("secret", "1754000000", b"payload");
        let sig2 = compute_signature("secret", "1754000000", b"payload");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_signature_is_hex_encoded() {
        let sig = compute_signature("secret", "1754000000", b"payload");
        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_signature_valid() {
        let sig = compute_signature("whsec_k1", "1754000000", b"{}");
        assert!(verify_signature(&sig, "whsec_k1", "1754000000", b"{}"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let sig = compute_signature("whsec_k1", "1754000000", b"{}");
        assert!(!verify_signature(&sig, "whsec_k2", "1754000000", b"{}"));
    }

    #[test]
    fn test_verify_rejects_changed_timestamp() {
        let sig = compute_signature("whsec_k1", "1754000000", b"{}");
        assert!(!verify_signature(&sig, "whsec_k1", "1754000001", b"{}"));
    }

    #[test]
    fn test_verify_rejects_changed_body() {
        let sig = compute_signature("whsec_k1", "1754000000", b"{}");
        assert!(!verify_signature(&sig, "whsec_k1", "1754000000", b"{ }"));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(!verify_signature("not-hex", "secret", "1754000000", b"x"));
    }
}
