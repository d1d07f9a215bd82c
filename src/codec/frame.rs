//! Frame header layout, encryption binding, and the encode/decrypt
//! entry points.

use bytes::Bytes;

use super::{CodecError, PLAIN_COMMANDS};
use crate::crypto::{BodyCipher, KeyMaterial};
use crate::session::{CryptoPhase, SessionKeys};

/// Upper bound on a single frame, length prefix included. Anything
/// larger is treated as stream corruption.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Smallest possible frame: length prefix, phase byte, sequence id,
/// empty command name, empty body.
pub(super) const MIN_FRAME_SIZE: usize = 4 + 1 + 4 + 2;

/// Parsed frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Which key space the body is encrypted under.
    pub phase: CryptoPhase,
    /// Request/response correlation id.
    pub sequence_id: i32,
    /// Command name, e.g. `auth.login`.
    pub command: String,
}

impl FrameHeader {
    /// Serializes the header fields in wire order. These bytes double
    /// as the AEAD associated data for the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let cmd = self.command.as_bytes();
        let mut out = Vec::with_capacity(1 + 4 + 2 + cmd.len());
        out.push(self.phase.as_byte());
        out.extend_from_slice(&self.sequence_id.to_be_bytes());
        out.extend_from_slice(&(cmd.len() as u16).to_be_bytes());
        out.extend_from_slice(cmd);
        out
    }
}

/// A framed unit as read off the wire, body still encrypted.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Parsed header.
    pub header: FrameHeader,
    /// Body bytes exactly as received.
    pub body: Bytes,
}

/// Encodes a complete frame under an explicit phase and key.
///
/// `key` is ignored for [`CryptoPhase::Plain`] and required for the
/// encrypted phases. This is the low-level entry point; client code
/// goes through [`encode_request`], which picks phase and key from the
/// connection's [`SessionKeys`].
pub fn encode_frame(
    phase: CryptoPhase,
    sequence_id: i32,
    command: &str,
    body: &[u8],
    key: Option<&KeyMaterial>,
) -> Result<Bytes, CodecError> {
    if command.len() > u16::MAX as usize {
        return Err(CodecError::InvalidHeader(format!(
            "command name of {} bytes exceeds u16 length prefix",
            command.len()
        )));
    }
    let header = FrameHeader {
        phase,
        sequence_id,
        command: command.to_owned(),
    };
    let header_bytes = header.to_bytes();

    let wire_body = match phase {
        CryptoPhase::Plain => body.to_vec(),
        CryptoPhase::Handshake | CryptoPhase::Session => {
            let key = key.ok_or(CodecError::KeyUnavailable { phase })?;
            BodyCipher::new(key)?.encrypt(body, &header_bytes)?
        }
    };

    let total = 4 + header_bytes.len() + wire_body.len();
    if total > MAX_FRAME_SIZE {
        return Err(CodecError::InvalidLength { len: total });
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&wire_body);
    Ok(Bytes::from(out))
}

/// Encodes an outbound request, selecting phase and key from the
/// connection state.
///
/// Commands in [`PLAIN_COMMANDS`] always go out unencrypted; everything
/// else uses the connection's current phase and fails with
/// [`CodecError::KeyUnavailable`] if no key has been negotiated yet.
pub fn encode_request(
    command: &str,
    sequence_id: i32,
    body: &[u8],
    keys: &SessionKeys,
) -> Result<Bytes, CodecError> {
    let phase = if PLAIN_COMMANDS.contains(&command) {
        CryptoPhase::Plain
    } else {
        keys.current_phase()
    };
    let key = keys.key_for(phase);
    if phase != CryptoPhase::Plain && key.is_none() {
        return Err(CodecError::KeyUnavailable { phase });
    }
    encode_frame(phase, sequence_id, command, body, key.as_ref())
}

/// Decrypts a received frame's body under an explicit key.
///
/// Counterpart of [`encode_frame`]; used directly by test harnesses
/// that speak the wire format with their own keys.
pub fn decrypt_body(frame: &RawFrame, key: Option<&KeyMaterial>) -> Result<Vec<u8>, CodecError> {
    match frame.header.phase {
        CryptoPhase::Plain => Ok(frame.body.to_vec()),
        phase @ (CryptoPhase::Handshake | CryptoPhase::Session) => {
            let key = key.ok_or(CodecError::KeyUnavailable { phase })?;
            let aad = frame.header.to_bytes();
            Ok(BodyCipher::new(key)?.decrypt(&frame.body, &aad)?)
        }
    }
}

/// Decrypts a received frame's body, resolving the key from the
/// connection's [`SessionKeys`] by the frame's phase byte.
pub fn decrypt_frame(frame: &RawFrame, keys: &SessionKeys) -> Result<Vec<u8>, CodecError> {
    let key = keys.key_for(frame.header.phase);
    decrypt_body(frame, key.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{commands, FrameDecoder};
    use crate::crypto::PublicKey;

    fn test_key() -> KeyMaterial {
        KeyMaterial::new(vec![0x42; 32])
    }

    fn decode_one(wire: &[u8]) -> RawFrame {
        let mut dec = FrameDecoder::new();
        dec.extend(wire);
        dec.next_frame()
            .expect("frame parses")
            .expect("frame complete")
    }

    #[test]
    fn plain_frame_roundtrip() {
        let wire = encode_frame(CryptoPhase::Plain, 7, commands::KEY_EXCHANGE, b"pub", None)
            .expect("encode");
        let frame = decode_one(&wire);
        assert_eq!(frame.header.phase, CryptoPhase::Plain);
        assert_eq!(frame.header.sequence_id, 7);
        assert_eq!(frame.header.command, commands::KEY_EXCHANGE);
        assert_eq!(decrypt_body(&frame, None).expect("decrypt"), b"pub");
    }

    #[test]
    fn encrypted_frame_roundtrip() {
        let key = test_key();
        let wire = encode_frame(
            CryptoPhase::Session,
            -3,
            commands::HEARTBEAT,
            b"tick",
            Some(&key),
        )
        .expect("encode");
        let frame = decode_one(&wire);
        assert_eq!(frame.header.sequence_id, -3);
        assert_ne!(&frame.body[..], b"tick");
        assert_eq!(decrypt_body(&frame, Some(&key)).expect("decrypt"), b"tick");
    }

    #[test]
    fn encrypted_phase_requires_key() {
        let err = encode_frame(CryptoPhase::Handshake, 1, commands::LOGIN, b"x", None).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KeyUnavailable {
                phase: CryptoPhase::Handshake
            }
        ));
    }

    #[test]
    fn header_is_bound_as_aad() {
        let key = test_key();
        let wire = encode_frame(CryptoPhase::Session, 5, commands::LOGIN, b"creds", Some(&key))
            .expect("encode");
        let mut frame = decode_one(&wire);
        // Re-binding the body to a different command must fail the tag.
        frame.header.command = commands::HEARTBEAT.to_owned();
        assert!(decrypt_body(&frame, Some(&key)).is_err());
    }

    #[test]
    fn request_phase_follows_session_state() {
        let keys = SessionKeys::new();

        // Whitelisted command goes plain even though no keys exist.
        let wire =
            encode_request(commands::KEY_EXCHANGE, 1, b"hello", &keys).expect("plain encode");
        assert_eq!(decode_one(&wire).header.phase, CryptoPhase::Plain);

        // Anything else is refused until a key is negotiated.
        assert!(matches!(
            encode_request(commands::LOGIN, 2, b"x", &keys),
            Err(CodecError::KeyUnavailable { .. })
        ));

        // Complete an exchange against a throwaway peer.
        let peer = crate::crypto::KeyPair::generate();
        keys.complete_exchange(&PublicKey::from_bytes(*peer.public_key().as_bytes()))
            .expect("exchange");
        let wire = encode_request(commands::LOGIN, 3, b"x", &keys).expect("handshake encode");
        assert_eq!(decode_one(&wire).header.phase, CryptoPhase::Handshake);

        keys.install_session_key(KeyMaterial::new(vec![9; 32]));
        let wire = encode_request(commands::HEARTBEAT, 4, b"x", &keys).expect("session encode");
        let frame = decode_one(&wire);
        assert_eq!(frame.header.phase, CryptoPhase::Session);
        assert_eq!(decrypt_frame(&frame, &keys).expect("decrypt"), b"x");
    }
}
