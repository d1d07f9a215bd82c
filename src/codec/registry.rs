//! Command-to-parser dispatch.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

use super::body::BodyReader;
use super::frame::FrameHeader;
use super::packet::{
    read_source, ForceOffline, InboundChat, KeyExchangeAck, LoginResponse, MessageAck, Packet,
    PacketBody, RegisterAck,
};
use super::{commands, CodecError};
use crate::crypto::{KeyMaterial, PublicKey, PUBLIC_KEY_SIZE};
use crate::message::decode_elements;

/// Parses a decrypted body into packet bodies. One frame may carry a
/// batch, hence the `Vec`.
pub type BodyParser = fn(&[u8]) -> Result<Vec<PacketBody>, CodecError>;

/// Maps command names to body parsers.
///
/// Commands without an entry decode to [`PacketBody::Unknown`] with the
/// raw body attached, so an unimplemented command still correlates with
/// its pending request instead of stalling the stream.
pub struct CommandRegistry {
    parsers: HashMap<String, BodyParser>,
}

impl CommandRegistry {
    /// An empty registry. Everything decodes to `Unknown`.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// A registry with parsers for every command the engine speaks.
    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.register(commands::KEY_EXCHANGE, parse_key_exchange);
        reg.register(commands::LOGIN, parse_login);
        reg.register(commands::REGISTER, parse_register);
        reg.register(commands::HEARTBEAT, parse_heartbeat_ack);
        reg.register(commands::SEND_MESSAGE, parse_message_ack);
        reg.register(commands::PUSH_MESSAGE, parse_push_message);
        reg.register(commands::FORCE_OFFLINE, parse_force_offline);
        reg
    }

    /// Installs (or replaces) the parser for a command.
    pub fn register(&mut self, command: impl Into<String>, parser: BodyParser) {
        self.parsers.insert(command.into(), parser);
    }

    /// Decodes a decrypted body into packets carrying the header's
    /// command and sequence id.
    pub fn decode_packets(
        &self,
        header: &FrameHeader,
        plaintext: &[u8],
    ) -> Result<Vec<Packet>, CodecError> {
        let bodies = match self.parsers.get(&header.command) {
            Some(parser) => parser(plaintext)?,
            None => {
                trace!(command = %header.command, "no parser registered, passing through raw");
                vec![PacketBody::Unknown(Bytes::copy_from_slice(plaintext))]
            }
        };
        Ok(bodies
            .into_iter()
            .map(|body| Packet {
                command: header.command.clone(),
                sequence_id: header.sequence_id,
                body,
            })
            .collect())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn parse_key_exchange(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    let raw = r.take(PUBLIC_KEY_SIZE)?;
    let mut key = [0u8; PUBLIC_KEY_SIZE];
    key.copy_from_slice(raw);
    Ok(vec![PacketBody::KeyExchange(KeyExchangeAck {
        server_public: PublicKey::from_bytes(key),
    })])
}

fn parse_login(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    let response = match r.u8()? {
        0x00 => LoginResponse::Success {
            session_signature: r.bytes_u16()?.to_vec(),
            session_key: KeyMaterial::new(r.bytes_u16()?.to_vec()),
        },
        0x01 => LoginResponse::CaptchaRequired {
            image: r.bytes_u32()?.to_vec(),
        },
        0x02 => LoginResponse::DeviceLockRequired {
            url: r.string_u16()?,
        },
        0x03 => LoginResponse::InteractiveRequired {
            url: r.string_u16()?,
        },
        0x04 => LoginResponse::SignatureExpired,
        0x05 => LoginResponse::WrongCredential,
        0x06 => LoginResponse::InconsistentIdentity,
        0x07 => LoginResponse::RetryLater {
            message: r.string_u16()?,
        },
        code => LoginResponse::Rejected {
            code,
            message: if r.is_empty() {
                String::new()
            } else {
                r.string_u16()?
            },
        },
    };
    Ok(vec![PacketBody::Login(response)])
}

fn parse_register(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    Ok(vec![PacketBody::Register(RegisterAck {
        status: r.u8()?,
        device_session_id: r.bytes_u16()?.to_vec(),
    })])
}

fn parse_heartbeat_ack(_body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    Ok(vec![PacketBody::HeartbeatAck])
}

fn parse_message_ack(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    Ok(vec![PacketBody::MessageAck(MessageAck {
        status: r.u8()?,
        message_seq: r.i32()?,
    })])
}

fn parse_push_message(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    let count = r.u16()? as usize;
    let mut out = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let source = read_source(&mut r)?;
        let sender = r.i64()?;
        let message_seq = r.i32()?;
        let raw = r.bytes_u32()?;
        let elements = decode_elements(raw).map_err(|e| CodecError::BadBody {
            command: commands::PUSH_MESSAGE.to_owned(),
            reason: e.to_string(),
        })?;
        out.push(PacketBody::Chat(InboundChat {
            source,
            sender,
            message_seq,
            elements,
        }));
    }
    Ok(out)
}

fn parse_force_offline(body: &[u8]) -> Result<Vec<PacketBody>, CodecError> {
    let mut r = BodyReader::new(body);
    Ok(vec![PacketBody::ForceOffline(ForceOffline {
        code: r.u8()?,
        message: r.string_u16()?,
    })])
}
