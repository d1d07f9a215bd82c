//! Secret key material with zeroization and HKDF derivation.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::CryptoError;

/// Secret key bytes.
///
/// Zeroized on drop, redacted in `Debug`. All symmetric keys in the
/// engine (derived password key, handshake key, session key) are carried
/// as `KeyMaterial` so none of them can leak through logging.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Create new key material from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Digest arbitrary input (e.g. a password) into 32-byte key material.
    ///
    /// The input itself is never stored.
    pub fn digest(input: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        Self::new(Sha256::digest(input).to_vec())
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the key length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Derive a new key using HKDF-SHA256.
    ///
    /// `info` provides domain separation; different info strings yield
    /// independent keys from the same input material.
    pub fn derive(&self, info: &[u8], output_len: usize) -> Result<KeyMaterial, CryptoError> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = vec![0u8; output_len];

        hk.expand(info, &mut okm)
            .map_err(|e| CryptoError::Derivation(format!("HKDF expand failed: {e}")))?;

        Ok(KeyMaterial::new(okm))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't leak key material in debug output
        write!(f, "KeyMaterial([REDACTED, {} bytes])", self.bytes.len())
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for KeyMaterial {}
