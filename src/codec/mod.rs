//! Frame codec: translation between logical requests/packets and raw
//! transport bytes.
//!
//! # Wire Format
//!
//! ```text
//! frame  := u32 total_len (BE, includes these 4 bytes)
//!           u8  phase        (CryptoPhase wire byte)
//!           i32 sequence_id  (BE)
//!           u16 command_len  (BE) || command (UTF-8)
//!           body
//! body   := plaintext                          phase = Plain
//!         | nonce(12) || ciphertext || tag(16) phase = Handshake/Session
//! ```
//!
//! The header (everything between the length prefix and the body) is the
//! AEAD associated data, so an encrypted body cannot be replayed under a
//! different command or sequence id.
//!
//! # Phase selection
//!
//! Encode and decode apply the same rule: the whitelist in
//! [`PLAIN_COMMANDS`] uses [`CryptoPhase::Plain`]; everything else uses
//! the handshake key until a session key is installed, then the session
//! key. Inbound frames carry the phase byte, and decode fails with
//! [`CodecError::KeyUnavailable`] if the named key has not been
//! negotiated on this connection.
//!
//! # Robustness
//!
//! [`FrameDecoder`] treats truncated input as "need more bytes", never
//! as corruption. Unknown command names decode to
//! [`PacketBody::Unknown`] so one unimplemented command does not halt
//! the stream.

mod body;
mod decoder;
mod frame;
mod packet;
mod registry;

pub use body::{BodyReader, BodyWriter};
pub use decoder::FrameDecoder;
pub use frame::{
    decrypt_body, decrypt_frame, encode_frame, encode_request, FrameHeader, RawFrame,
    MAX_FRAME_SIZE,
};
pub use packet::{
    write_source, ForceOffline, InboundChat, KeyExchangeAck, LoginResponse, MessageAck, Packet,
    PacketBody, RegisterAck,
};
pub use registry::{BodyParser, CommandRegistry};

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::session::CryptoPhase;

/// Command names of the IMP protocol.
pub mod commands {
    /// ECDH key exchange initiation; the only command in the plaintext
    /// whitelist.
    pub const KEY_EXCHANGE: &str = "auth.key_exchange";
    /// Credential submission and challenge answers.
    pub const LOGIN: &str = "auth.login";
    /// Best-effort logout notification.
    pub const LOGOUT: &str = "auth.logout";
    /// Post-login device/session registration.
    pub const REGISTER: &str = "client.register";
    /// Keep-alive.
    pub const HEARTBEAT: &str = "client.heartbeat";
    /// Outbound chat message.
    pub const SEND_MESSAGE: &str = "message.send";
    /// Server-pushed chat messages (may carry a batch).
    pub const PUSH_MESSAGE: &str = "push.message";
    /// Server-initiated disconnect notice.
    pub const FORCE_OFFLINE: &str = "push.force_offline";
}

/// Commands allowed to travel unencrypted. Kept to the bare minimum:
/// only the key-exchange initiation, which by definition runs before any
/// key exists.
pub const PLAIN_COMMANDS: &[&str] = &[commands::KEY_EXCHANGE];

/// Frame encode/decode errors.
///
/// All of these are recoverable per-frame: the reader loop logs and
/// drops the frame, and the stream continues.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Declared frame length exceeds [`MAX_FRAME_SIZE`] or is shorter
    /// than a valid header. The stream is considered desynced.
    #[error("Invalid frame length {len}")]
    InvalidLength {
        /// The declared total length.
        len: usize,
    },

    /// Frame header could not be parsed (bad phase byte, bad UTF-8
    /// command name, header longer than the frame).
    #[error("Invalid frame header: {0}")]
    InvalidHeader(String),

    /// The frame names a crypto phase whose key has not been negotiated
    /// on this connection.
    #[error("No key negotiated for phase {phase:?}")]
    KeyUnavailable {
        /// The phase the frame asked for.
        phase: CryptoPhase,
    },

    /// A typed body ended before a declared field.
    #[error("Truncated body: needed {needed} more byte(s) at offset {offset}")]
    TruncatedBody {
        /// Bytes still required.
        needed: usize,
        /// Offset at which they were required.
        offset: usize,
    },

    /// A typed body was structurally invalid for its command.
    #[error("Bad {command} body: {reason}")]
    BadBody {
        /// Command whose parser rejected the body.
        command: String,
        /// What was wrong.
        reason: String,
    },

    /// Body encryption/decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
