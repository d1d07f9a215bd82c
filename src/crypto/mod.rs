//! Cryptographic primitives for the IMP wire protocol.
//!
//! Everything above this module (frame codec, SSO processor) builds on
//! three primitives:
//!
//! - **X25519 key agreement**: an ephemeral key pair per connection
//!   attempt; the raw shared secret is digested through HKDF-SHA256
//!   before it is ever used as a symmetric key.
//! - **ChaCha20-Poly1305 body cipher**: authenticated encryption of
//!   frame bodies. Encrypt and decrypt are exact inverses for any byte
//!   length, and a failed auth tag is reported as [`CryptoError::Decrypt`]
//!   so malformed ciphertext is distinguishable from I/O errors.
//! - **HKDF key derivation**: [`KeyMaterial::derive`] for turning one
//!   secret into purpose-bound keys.
//!
//! # Key lifecycle
//!
//! ```text
//! connect attempt n:
//!   (sk, pk) = X25519::generate()            -- fresh per attempt
//!   shared   = X25519(sk, server_pk)
//!   handshake_key = HKDF(shared, "imp/v1/handshake")
//!   ...login succeeds...
//!   session_key   = issued by server, used until the connection drops
//! ```
//!
//! Key material is zeroized on drop and redacted in `Debug` output; no
//! code path in this crate logs key bytes.

mod cipher;
mod error;
mod exchange;
mod material;

pub use cipher::BodyCipher;
pub use error::CryptoError;
pub use exchange::{KeyExchange, KeyPair, PublicKey};
pub use material::KeyMaterial;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305 (128 bits).
pub const TAG_SIZE: usize = 16;

/// Symmetric key size (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of an X25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;
