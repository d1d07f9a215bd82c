//! IMP Protocol error types.
//!
//! The taxonomy follows the propagation policy of the engine: errors local
//! to one frame or one request never escalate to handler-wide state, and
//! callers can always tell shutdown ([`ImpError::HandlerClosed`]) apart
//! from protocol failure ([`ImpError::Codec`]) and from plain timeouts
//! ([`ImpError::Timeout`]).
//!
//! The `Crypto`, `Codec` and `Login` variants preserve the full error
//! chain via `#[from]`/`#[source]`, enabling debugging tools to display
//! complete error context.

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::sso::LoginError;

/// IMP Protocol errors.
#[derive(Error, Debug)]
pub enum ImpError {
    /// Transport-level I/O failure (connection refused/reset, read/write
    /// error). Recoverable: the handler moves to `SneakOff` and a later
    /// `resume_connection` may re-establish the link.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encode/decode failure. Recoverable per-frame: the reader
    /// loop logs and drops the offending frame, other in-flight frames
    /// are unaffected.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Cryptographic operation failed outside of frame processing
    /// (key derivation, key exchange setup).
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Login handshake failed. Check [`LoginError::kill_bot`] to tell
    /// fatal failures (wrong credential, unsupported challenge) from
    /// transient ones (no server available, retry later).
    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    /// A `send_and_expect` call exhausted its retry budget without a
    /// correlated response. Surfaced to the specific caller only; the
    /// handler state is unaffected.
    #[error("Request {command:?} timed out after {attempts} attempt(s)")]
    Timeout {
        /// Command name of the timed-out request.
        command: String,
        /// Total attempts made (initial send plus retries).
        attempts: u32,
    },

    /// The engine was shut down by `close()` while this request was
    /// pending. Terminal: no further operation on this handler can
    /// succeed. Operations issued after `close()` return
    /// [`ImpError::NotConnected`] instead.
    #[error("Network handler closed")]
    HandlerClosed,

    /// No usable transport for this operation: never connected, dropped
    /// to `SneakOff`, kicked by the server, torn down mid-request by a
    /// resume, or issued after `close()`. Call `resume_connection`
    /// first.
    #[error("Not connected")]
    NotConnected,

    /// The server answered but refused the request with a non-zero
    /// status byte.
    #[error("Server refused {command:?} with status 0x{status:02x}")]
    Server {
        /// Command the server refused.
        command: String,
        /// Raw status byte.
        status: u8,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for IMP operations.
pub type Result<T> = std::result::Result<T, ImpError>;

impl From<toml::de::Error> for ImpError {
    fn from(err: toml::de::Error) -> Self {
        ImpError::Config(err.to_string())
    }
}

impl ImpError {
    /// Whether the error permanently invalidates the bot.
    ///
    /// True for handler closure and for fatal login failures; everything
    /// else is eligible for retry after a later `resume_connection`.
    pub fn is_fatal(&self) -> bool {
        match self {
            ImpError::HandlerClosed => true,
            ImpError::Login(e) => e.kill_bot(),
            _ => false,
        }
    }
}
