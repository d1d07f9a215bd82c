//! ChaCha20-Poly1305 body cipher for frame encryption.
//!
//! Produces `nonce || ciphertext || tag`; the frame header travels as
//! associated data so a valid body cannot be replayed under a different
//! header.
//!
//! Nonces are fully random 96-bit values from the system CSPRNG. A
//! counter-based scheme would need persisted state to survive restarts;
//! random nonces have their birthday bound at 2^48 messages, far beyond
//! the lifetime of one IM connection.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use super::error::CryptoError;
use super::material::KeyMaterial;
use super::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Symmetric cipher over one key, used for all frame bodies in a phase.
pub struct BodyCipher {
    cipher: ChaCha20Poly1305,
}

impl BodyCipher {
    /// Create a cipher from key material (must be at least 32 bytes).
    pub fn new(key: &KeyMaterial) -> Result<Self, CryptoError> {
        if key.len() < KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "Key too short: {} bytes (need {})",
                key.len(),
                KEY_SIZE
            )));
        }
        let key_bytes: [u8; KEY_SIZE] = key.as_bytes()[..KEY_SIZE]
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Key conversion failed".to_string()))?;

        Ok(Self {
            cipher: ChaCha20Poly1305::new(&key_bytes.into()),
        })
    }

    /// Encrypt plaintext with the given associated data.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.encrypt_with_nonce(plaintext, &nonce, associated_data)
    }

    /// Encrypt with an explicit nonce. Exposed for deterministic tests;
    /// production paths use [`BodyCipher::encrypt`].
    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt `nonce || ciphertext || tag` with the given associated data.
    ///
    /// A tag mismatch or truncated input yields [`CryptoError::Decrypt`]
    /// / [`CryptoError::CiphertextTooShort`], never a panic.
    pub fn decrypt(&self, data: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        self.cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

impl std::fmt::Debug for BodyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BodyCipher([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> KeyMaterial {
        KeyMaterial::new(vec![0x42u8; KEY_SIZE])
    }

    #[test]
    fn test_roundtrip() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        let plaintext = b"hello imp";

        let encrypted = cipher.encrypt(plaintext, b"header").unwrap();
        let decrypted = cipher.decrypt(&encrypted, b"header").unwrap();

        assert_eq!(decrypted, plaintext);
        assert_eq!(encrypted.len(), plaintext.len() + NONCE_SIZE + TAG_SIZE);
    }

    #[test]
    fn test_roundtrip_all_lengths() {
        let cipher = BodyCipher::new(&test_key()).unwrap();

        // Exact inverse for any byte length, including empty and
        // non-block-aligned inputs
        for len in [0usize, 1, 15, 16, 17, 63, 64, 65, 1000] {
            let plaintext = vec![0xA5u8; len];
            let encrypted = cipher.encrypt(&plaintext, &[]).unwrap();
            let decrypted = cipher.decrypt(&encrypted, &[]).unwrap();
            assert_eq!(decrypted, plaintext, "length {len}");
        }
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        let mut encrypted = cipher.encrypt(b"payload", b"aad").unwrap();

        let idx = encrypted.len() / 2;
        encrypted[idx] ^= 0xFF;

        assert!(matches!(
            cipher.decrypt(&encrypted, b"aad"),
            Err(CryptoError::Decrypt(_))
        ));
    }

    #[test]
    fn test_wrong_aad_rejected() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        let encrypted = cipher.encrypt(b"payload", b"aad-1").unwrap();

        assert!(cipher.decrypt(&encrypted, b"aad-2").is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        let encrypted = cipher.encrypt(b"payload", b"").unwrap();

        let other = BodyCipher::new(&KeyMaterial::new(vec![0x99u8; KEY_SIZE])).unwrap();
        assert!(other.decrypt(&encrypted, b"").is_err());
    }

    #[test]
    fn test_truncated_input() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        assert!(matches!(
            cipher.decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1], b""),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_short_key_rejected() {
        let short = KeyMaterial::new(vec![0u8; 16]);
        assert!(matches!(
            BodyCipher::new(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_nonces_are_unique() {
        let cipher = BodyCipher::new(&test_key()).unwrap();
        let a = cipher.encrypt(b"x", b"").unwrap();
        let b = cipher.encrypt(b"x", b"").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }
}
