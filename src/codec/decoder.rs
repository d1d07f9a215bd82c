//! Incremental frame decoder over a byte stream.

use bytes::{Buf, Bytes, BytesMut};

use super::frame::{FrameHeader, RawFrame, MAX_FRAME_SIZE, MIN_FRAME_SIZE};
use super::CodecError;
use crate::session::CryptoPhase;

/// Accumulates stream bytes and yields complete frames.
///
/// Truncated input is never an error, only "not yet". Errors come in
/// two severities:
///
/// * a frame whose declared length is implausible means the stream is
///   desynced; the buffer is discarded and the caller should drop the
///   connection,
/// * a frame whose header fails to parse has already been consumed from
///   the buffer, so the caller can log it and keep pulling frames.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read stream bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet consumed as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pulls the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, CodecError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let total = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
            as usize;
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&total) {
            // Length prefix itself is garbage; no way to resync.
            self.buf.clear();
            return Err(CodecError::InvalidLength { len: total });
        }
        if self.buf.len() < total {
            return Ok(None);
        }

        let mut frame = self.buf.split_to(total);
        frame.advance(4);
        Self::parse_frame(frame.freeze()).map(Some)
    }

    /// Parses the header of an already length-delimited frame.
    fn parse_frame(mut frame: Bytes) -> Result<RawFrame, CodecError> {
        let phase_byte = frame.get_u8();
        let phase = CryptoPhase::from_byte(phase_byte).ok_or_else(|| {
            CodecError::InvalidHeader(format!("unknown phase byte 0x{phase_byte:02x}"))
        })?;
        let sequence_id = frame.get_i32();
        let cmd_len = frame.get_u16() as usize;
        if frame.len() < cmd_len {
            return Err(CodecError::InvalidHeader(format!(
                "command length {cmd_len} exceeds frame size"
            )));
        }
        let command = String::from_utf8(frame.split_to(cmd_len).to_vec())
            .map_err(|_| CodecError::InvalidHeader("command name is not UTF-8".into()))?;

        Ok(RawFrame {
            header: FrameHeader {
                phase,
                sequence_id,
                command,
            },
            body: frame,
        })
    }
}
