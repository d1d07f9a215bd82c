//! Unified cryptographic error type.

use thiserror::Error;

/// Errors from cryptographic operations.
///
/// [`CryptoError::Decrypt`] is deliberately separate from the transport
/// error space: a bad auth tag means the bytes arrived but were not
/// produced under the expected key, which callers must not confuse with
/// an I/O failure.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material was empty, too short, or otherwise unusable.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A peer public key had the wrong length or encoding.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// HKDF expansion failed (requested output too long).
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    /// Decryption failed: auth tag mismatch or corrupted ciphertext.
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    /// Ciphertext shorter than nonce + tag.
    #[error("Ciphertext too short")]
    CiphertextTooShort,
}
