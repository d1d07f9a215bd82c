//! X25519 key exchange for the login handshake.
//!
//! An ephemeral key pair is generated per connection attempt. The raw
//! Diffie-Hellman output is never used directly: it is digested through
//! HKDF with a protocol-versioned context before becoming the handshake
//! key.

use std::fmt;

use super::error::CryptoError;
use super::material::KeyMaterial;
use super::{KEY_SIZE, PUBLIC_KEY_SIZE};

/// HKDF context for the handshake key derived from the ECDH shared secret.
const HANDSHAKE_KEY_INFO: &[u8] = b"imp/v1/handshake";

/// X25519 public key (32 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, validating length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidPublicKey(format!(
                "Expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                slice.len()
            )));
        }
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey([{}...])", hex_encode(&self.0[..4]))
    }
}

/// X25519 key pair (private + public).
pub struct KeyPair {
    secret: x25519_dalek::StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        Self {
            secret,
            public: PublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Perform Diffie-Hellman key exchange, returning the raw shared secret.
    ///
    /// Callers must not use this output as a key directly; see
    /// [`KeyExchange::complete`] which derives the handshake key.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> KeyMaterial {
        use x25519_dalek::PublicKey as X25519Public;

        let peer = X25519Public::from(*peer_public.as_bytes());
        let shared = self.secret.diffie_hellman(&peer);

        KeyMaterial::new(shared.as_bytes().to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Key exchange state for one connection attempt.
#[derive(Debug)]
pub struct KeyExchange {
    /// Our ephemeral key pair.
    key_pair: KeyPair,
    /// Handshake key derived once the peer public key arrives.
    handshake_key: Option<KeyMaterial>,
}

impl KeyExchange {
    /// Create a new key exchange with a fresh ephemeral key pair.
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            handshake_key: None,
        }
    }

    /// Get our public key to send to the peer.
    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    /// Complete the exchange with the peer's public key.
    ///
    /// Computes the shared secret and immediately digests it into the
    /// handshake key; the raw secret is dropped here.
    pub fn complete(&mut self, peer_public: &PublicKey) -> Result<(), CryptoError> {
        let shared = self.key_pair.diffie_hellman(peer_public);
        let key = shared.derive(HANDSHAKE_KEY_INFO, KEY_SIZE)?;
        self.handshake_key = Some(key);
        Ok(())
    }

    /// The derived handshake key, if the exchange has completed.
    pub fn handshake_key(&self) -> Option<&KeyMaterial> {
        self.handshake_key.as_ref()
    }

    /// Check if the exchange has completed.
    pub fn is_complete(&self) -> bool {
        self.handshake_key.is_some()
    }
}

impl Default for KeyExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple hex encoder for debug output.
fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_eq!(kp.public_key().as_bytes().len(), PUBLIC_KEY_SIZE);
    }

    #[test]
    fn test_diffie_hellman_symmetric() {
        let client = KeyPair::generate();
        let server = KeyPair::generate();

        let client_shared = client.diffie_hellman(server.public_key());
        let server_shared = server.diffie_hellman(client.public_key());

        assert_eq!(client_shared.as_bytes(), server_shared.as_bytes());
    }

    #[test]
    fn test_exchange_derives_same_handshake_key() {
        let mut client = KeyExchange::new();
        let mut server = KeyExchange::new();

        let client_public = client.public_key().clone();
        let server_public = server.public_key().clone();

        client.complete(&server_public).unwrap();
        server.complete(&client_public).unwrap();

        assert!(client.is_complete());
        assert!(server.is_complete());
        assert_eq!(
            client.handshake_key().unwrap().as_bytes(),
            server.handshake_key().unwrap().as_bytes()
        );
    }

    #[test]
    fn test_handshake_key_is_not_raw_secret() {
        let mut client = KeyExchange::new();
        let server = KeyPair::generate();
        let raw = client.key_pair.diffie_hellman(server.public_key());

        client.complete(server.public_key()).unwrap();
        assert_ne!(client.handshake_key().unwrap().as_bytes(), raw.as_bytes());
    }

    #[test]
    fn test_public_key_from_slice() {
        let bytes = [0x42u8; 32];
        let pk = PublicKey::from_slice(&bytes).unwrap();
        assert_eq!(pk.as_bytes(), &bytes);

        assert!(PublicKey::from_slice(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kp = KeyPair::generate();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("REDACTED"));
    }
}
