//! Typed packet bodies.
//!
//! A [`Packet`] is a decrypted frame with its body parsed into the
//! shape the rest of the engine consumes. Body layouts are documented
//! per type; all integers big-endian, variable fields length-prefixed.

use bytes::Bytes;

use super::body::{BodyReader, BodyWriter};
use super::CodecError;
use crate::crypto::{KeyMaterial, PublicKey};
use crate::message::{MessageSource, WireMessageElement};

/// A decrypted, parsed protocol unit.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Command the frame carried.
    pub command: String,
    /// Correlation id from the frame header.
    pub sequence_id: i32,
    /// Parsed body.
    pub body: PacketBody,
}

/// Parsed body variants, one per known command, plus a passthrough for
/// commands with no registered parser.
#[derive(Debug, Clone)]
pub enum PacketBody {
    KeyExchange(KeyExchangeAck),
    Login(LoginResponse),
    Register(RegisterAck),
    HeartbeatAck,
    MessageAck(MessageAck),
    Chat(InboundChat),
    ForceOffline(ForceOffline),
    /// Raw body of a command nobody registered a parser for.
    Unknown(Bytes),
}

/// `auth.key_exchange` response.
///
/// Layout: `server_public(32)`.
#[derive(Debug, Clone)]
pub struct KeyExchangeAck {
    pub server_public: PublicKey,
}

/// `auth.login` response.
///
/// Layout: `u8 status || status-specific payload`:
///
/// | status | meaning               | payload                                  |
/// |--------|-----------------------|------------------------------------------|
/// | `0x00` | success               | `u16 len || signature, u16 len || key`   |
/// | `0x01` | captcha required      | `u32 len || image`                       |
/// | `0x02` | device lock required  | `u16 len || url`                         |
/// | `0x03` | interactive required  | `u16 len || url`                         |
/// | `0x04` | signature expired     | none                                     |
/// | `0x05` | wrong credential      | none                                     |
/// | `0x06` | inconsistent identity | none                                     |
/// | `0x07` | retry later           | `u16 len || message`                     |
/// | other  | rejected              | `u16 len || message` (may be absent)     |
#[derive(Debug, Clone)]
pub enum LoginResponse {
    Success {
        session_signature: Vec<u8>,
        session_key: KeyMaterial,
    },
    CaptchaRequired {
        image: Vec<u8>,
    },
    DeviceLockRequired {
        url: String,
    },
    InteractiveRequired {
        url: String,
    },
    SignatureExpired,
    WrongCredential,
    InconsistentIdentity,
    RetryLater {
        message: String,
    },
    Rejected {
        code: u8,
        message: String,
    },
}

/// `client.register` response.
///
/// Layout: `u8 status || u16 len || device_session_id`.
#[derive(Debug, Clone)]
pub struct RegisterAck {
    pub status: u8,
    pub device_session_id: Vec<u8>,
}

/// `message.send` response.
///
/// Layout: `u8 status || i32 message_seq`.
#[derive(Debug, Clone)]
pub struct MessageAck {
    pub status: u8,
    /// Server-assigned sequence of the stored message.
    pub message_seq: i32,
}

/// One chat message from a `push.message` batch.
///
/// Batch layout: `u16 count` then per message
/// `source || i64 sender || i32 message_seq || u32 len || elements`.
#[derive(Debug, Clone)]
pub struct InboundChat {
    pub source: MessageSource,
    pub sender: i64,
    pub message_seq: i32,
    pub elements: Vec<WireMessageElement>,
}

/// `push.force_offline` body.
///
/// Layout: `u8 code || u16 len || message`.
#[derive(Debug, Clone)]
pub struct ForceOffline {
    pub code: u8,
    pub message: String,
}

/// Message source wire form: `u8 kind || ids`.
///
/// | kind   | variant   | ids                         |
/// |--------|-----------|-----------------------------|
/// | `0x01` | group     | `i64 group_id`              |
/// | `0x02` | direct    | `i64 peer`                  |
/// | `0x03` | temporary | `i64 group_id || i64 peer`  |
pub(super) fn read_source(r: &mut BodyReader<'_>) -> Result<MessageSource, CodecError> {
    match r.u8()? {
        0x01 => Ok(MessageSource::Group { group_id: r.i64()? }),
        0x02 => Ok(MessageSource::Direct { peer: r.i64()? }),
        0x03 => Ok(MessageSource::Temporary {
            group_id: r.i64()?,
            peer: r.i64()?,
        }),
        kind => Err(CodecError::BadBody {
            command: super::commands::PUSH_MESSAGE.to_owned(),
            reason: format!("unknown source kind 0x{kind:02x}"),
        }),
    }
}

/// Writes a [`MessageSource`] in wire form. Used for `message.send`
/// request bodies.
pub fn write_source(source: &MessageSource, w: &mut BodyWriter) {
    match *source {
        MessageSource::Group { group_id } => {
            w.u8(0x01).i64(group_id);
        }
        MessageSource::Direct { peer } => {
            w.u8(0x02).i64(peer);
        }
        MessageSource::Temporary { group_id, peer } => {
            w.u8(0x03).i64(group_id).i64(peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrip() {
        let sources = [
            MessageSource::Group { group_id: 12345 },
            MessageSource::Direct { peer: -7 },
            MessageSource::Temporary {
                group_id: 1,
                peer: 2,
            },
        ];
        for source in sources {
            let mut w = BodyWriter::new();
            write_source(&source, &mut w);
            let buf = w.into_bytes();
            let mut r = BodyReader::new(&buf);
            assert_eq!(read_source(&mut r).expect("parses"), source);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn unknown_source_kind_rejected() {
        let mut r = BodyReader::new(&[0x09, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            read_source(&mut r),
            Err(CodecError::BadBody { .. })
        ));
    }
}
