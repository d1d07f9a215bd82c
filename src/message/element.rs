//! Wire-level message elements and their binary layout.
//!
//! # Element Format
//!
//! ```text
//! element := u8 tag || u32 len (BE) || payload[len]
//! ```
//!
//! Payload layouts per tag:
//!
//! | Tag  | Element  | Payload |
//! |------|----------|---------|
//! | 0x01 | Text     | UTF-8 text |
//! | 0x02 | Mention  | i64 target \|\| UTF-8 display |
//! | 0x03 | Face     | u16 face id |
//! | 0x04 | Image    | u16 rid_len \|\| resource id \|\| u32 width \|\| u32 height |
//! | 0x05 | Quote    | i32 origin seq \|\| i64 origin sender \|\| nested elements |
//! | 0x06 | Rich     | u16 service id \|\| blob |
//!
//! Unknown tags decode to [`WireMessageElement::Unknown`] so one
//! unimplemented element type never fails a whole message. Elements are
//! ephemeral: they exist only during decode/encode of one message, and
//! every payload is copied out of the inbound buffer.

use thiserror::Error;

/// Malformed element data.
#[derive(Debug, Error)]
pub enum ElementError {
    /// An element header or payload was cut short.
    #[error("Truncated element data at offset {offset}")]
    Truncated {
        /// Byte offset where more data was expected.
        offset: usize,
    },

    /// A declared payload length exceeds the remaining data.
    #[error("Element length {declared} exceeds remaining {remaining} bytes")]
    BadLength {
        /// Declared payload length.
        declared: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },

    /// A text payload was not valid UTF-8.
    #[error("Invalid UTF-8 in element payload: {0}")]
    InvalidUtf8(String),
}

/// One tagged part of a chat payload's on-wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessageElement {
    /// Plain text run.
    Text {
        /// The text content.
        content: String,
    },
    /// Mention of another account.
    Mention {
        /// Mentioned account id.
        target: i64,
        /// Display text, e.g. `@name`.
        display: String,
    },
    /// Built-in face/sticker reference.
    Face {
        /// Face id from the protocol's face table.
        id: u16,
    },
    /// Embedded media reference (the media itself lives on a CDN).
    Image {
        /// Server-side resource id.
        resource_id: String,
        /// Pixel width, 0 if unknown.
        width: u32,
        /// Pixel height, 0 if unknown.
        height: u32,
    },
    /// Quoted reply wrapping the quoted message's own elements.
    Quote {
        /// Message sequence of the quoted message.
        origin_seq: i32,
        /// Sender of the quoted message.
        origin_sender: i64,
        /// The quoted message's elements.
        elements: Vec<WireMessageElement>,
    },
    /// Rich-content blob interpreted by a service-specific handler.
    Rich {
        /// Service id selecting the interpreter.
        service_id: u16,
        /// Opaque payload.
        payload: Vec<u8>,
    },
    /// Element with a tag this client does not implement. Carried
    /// opaquely so the rest of the message still decodes.
    Unknown {
        /// The unrecognized tag.
        tag: u8,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

const TAG_TEXT: u8 = 0x01;
const TAG_MENTION: u8 = 0x02;
const TAG_FACE: u8 = 0x03;
const TAG_IMAGE: u8 = 0x04;
const TAG_QUOTE: u8 = 0x05;
const TAG_RICH: u8 = 0x06;

/// Encode a sequence of elements into their wire form.
pub fn encode_elements(elements: &[WireMessageElement]) -> Vec<u8> {
    let mut out = Vec::with_capacity(elements.len() * 16);
    for element in elements {
        encode_element(element, &mut out);
    }
    out
}

fn encode_element(element: &WireMessageElement, out: &mut Vec<u8>) {
    let (tag, payload) = match element {
        WireMessageElement::Text { content } => (TAG_TEXT, content.as_bytes().to_vec()),
        WireMessageElement::Mention { target, display } => {
            let mut p = Vec::with_capacity(8 + display.len());
            p.extend_from_slice(&target.to_be_bytes());
            p.extend_from_slice(display.as_bytes());
            (TAG_MENTION, p)
        }
        WireMessageElement::Face { id } => (TAG_FACE, id.to_be_bytes().to_vec()),
        WireMessageElement::Image {
            resource_id,
            width,
            height,
        } => {
            let mut p = Vec::with_capacity(10 + resource_id.len());
            p.extend_from_slice(&(resource_id.len() as u16).to_be_bytes());
            p.extend_from_slice(resource_id.as_bytes());
            p.extend_from_slice(&width.to_be_bytes());
            p.extend_from_slice(&height.to_be_bytes());
            (TAG_IMAGE, p)
        }
        WireMessageElement::Quote {
            origin_seq,
            origin_sender,
            elements,
        } => {
            let nested = encode_elements(elements);
            let mut p = Vec::with_capacity(12 + nested.len());
            p.extend_from_slice(&origin_seq.to_be_bytes());
            p.extend_from_slice(&origin_sender.to_be_bytes());
            p.extend_from_slice(&nested);
            (TAG_QUOTE, p)
        }
        WireMessageElement::Rich {
            service_id,
            payload,
        } => {
            let mut p = Vec::with_capacity(2 + payload.len());
            p.extend_from_slice(&service_id.to_be_bytes());
            p.extend_from_slice(payload);
            (TAG_RICH, p)
        }
        WireMessageElement::Unknown { tag, payload } => (*tag, payload.clone()),
    };

    out.push(tag);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
}

/// Decode a sequence of elements from their wire form.
///
/// All payload bytes are copied; the returned elements do not alias
/// `data`.
pub fn decode_elements(data: &[u8]) -> Result<Vec<WireMessageElement>, ElementError> {
    let mut elements = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        if pos + 5 > data.len() {
            return Err(ElementError::Truncated { offset: pos });
        }
        let tag = data[pos];
        let len = u32::from_be_bytes([data[pos + 1], data[pos + 2], data[pos + 3], data[pos + 4]])
            as usize;
        pos += 5;

        if len > data.len() - pos {
            return Err(ElementError::BadLength {
                declared: len,
                remaining: data.len() - pos,
            });
        }
        let payload = &data[pos..pos + len];
        pos += len;

        elements.push(decode_element(tag, payload)?);
    }

    Ok(elements)
}

fn decode_element(tag: u8, payload: &[u8]) -> Result<WireMessageElement, ElementError> {
    match tag {
        TAG_TEXT => Ok(WireMessageElement::Text {
            content: utf8(payload)?,
        }),
        TAG_MENTION => {
            if payload.len() < 8 {
                return Err(ElementError::Truncated { offset: 0 });
            }
            let target = i64::from_be_bytes(payload[..8].try_into().unwrap_or_default());
            Ok(WireMessageElement::Mention {
                target,
                display: utf8(&payload[8..])?,
            })
        }
        TAG_FACE => {
            if payload.len() < 2 {
                return Err(ElementError::Truncated { offset: 0 });
            }
            Ok(WireMessageElement::Face {
                id: u16::from_be_bytes([payload[0], payload[1]]),
            })
        }
        TAG_IMAGE => {
            if payload.len() < 2 {
                return Err(ElementError::Truncated { offset: 0 });
            }
            let rid_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
            if payload.len() < 2 + rid_len + 8 {
                return Err(ElementError::Truncated { offset: 2 });
            }
            let resource_id = utf8(&payload[2..2 + rid_len])?;
            let rest = &payload[2 + rid_len..];
            Ok(WireMessageElement::Image {
                resource_id,
                width: u32::from_be_bytes(rest[..4].try_into().unwrap_or_default()),
                height: u32::from_be_bytes(rest[4..8].try_into().unwrap_or_default()),
            })
        }
        TAG_QUOTE => {
            if payload.len() < 12 {
                return Err(ElementError::Truncated { offset: 0 });
            }
            let origin_seq = i32::from_be_bytes(payload[..4].try_into().unwrap_or_default());
            let origin_sender = i64::from_be_bytes(payload[4..12].try_into().unwrap_or_default());
            Ok(WireMessageElement::Quote {
                origin_seq,
                origin_sender,
                elements: decode_elements(&payload[12..])?,
            })
        }
        TAG_RICH => {
            if payload.len() < 2 {
                return Err(ElementError::Truncated { offset: 0 });
            }
            Ok(WireMessageElement::Rich {
                service_id: u16::from_be_bytes([payload[0], payload[1]]),
                payload: payload[2..].to_vec(),
            })
        }
        other => Ok(WireMessageElement::Unknown {
            tag: other,
            payload: payload.to_vec(),
        }),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ElementError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ElementError::InvalidUtf8(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_elements() -> Vec<WireMessageElement> {
        vec![
            WireMessageElement::Text {
                content: "hello".to_string(),
            },
            WireMessageElement::Mention {
                target: 123_456,
                display: "@someone".to_string(),
            },
            WireMessageElement::Face { id: 14 },
            WireMessageElement::Image {
                resource_id: "res-abc".to_string(),
                width: 640,
                height: 480,
            },
            WireMessageElement::Rich {
                service_id: 60,
                payload: vec![0xDE, 0xAD],
            },
        ]
    }

    #[test]
    fn test_roundtrip() {
        let elements = sample_elements();
        let encoded = encode_elements(&elements);
        let decoded = decode_elements(&encoded).unwrap();
        assert_eq!(decoded, elements);
    }

    #[test]
    fn test_quote_nests() {
        let elements = vec![WireMessageElement::Quote {
            origin_seq: 42,
            origin_sender: 999,
            elements: vec![WireMessageElement::Text {
                content: "quoted".to_string(),
            }],
        }];
        let encoded = encode_elements(&elements);
        let decoded = decode_elements(&encoded).unwrap();
        assert_eq!(decoded, elements);
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let elements = vec![WireMessageElement::Unknown {
            tag: 0x7F,
            payload: vec![1, 2, 3],
        }];
        let encoded = encode_elements(&elements);
        let decoded = decode_elements(&encoded).unwrap();
        assert_eq!(decoded, elements);
    }

    #[test]
    fn test_truncated_header() {
        // tag present but length field cut short
        assert!(matches!(
            decode_elements(&[TAG_TEXT, 0, 0]),
            Err(ElementError::Truncated { .. })
        ));
    }

    #[test]
    fn test_declared_length_beyond_data() {
        let mut data = vec![TAG_TEXT];
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(b"short");
        assert!(matches!(
            decode_elements(&data),
            Err(ElementError::BadLength { .. })
        ));
    }

    #[test]
    fn test_decoded_elements_own_their_bytes() {
        let encoded = encode_elements(&[WireMessageElement::Rich {
            service_id: 1,
            payload: vec![9, 9, 9],
        }]);
        let decoded = decode_elements(&encoded).unwrap();
        drop(encoded); // decoded must not alias the source buffer
        assert_eq!(
            decoded,
            vec![WireMessageElement::Rich {
                service_id: 1,
                payload: vec![9, 9, 9],
            }]
        );
    }
}
