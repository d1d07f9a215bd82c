//! Ordered, extensible processor chain converting between wire elements
//! and structured content.

use tracing::trace;

use super::content::{ImageRef, Message, MessageContent, QuoteContent};
use super::element::WireMessageElement;

/// Where a message came from (or is going to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// A group chat.
    Group {
        /// Group id.
        group_id: i64,
    },
    /// A direct (friend) chat.
    Direct {
        /// Peer account id.
        peer: i64,
    },
    /// A temporary chat routed through a group.
    Temporary {
        /// Group the temporary session is routed through.
        group_id: i64,
        /// Peer account id.
        peer: i64,
    },
}

/// Cross-element state shared by all processors for one message.
///
/// Built once per message by the caller; processors read it instead of
/// re-deriving chat/sender facts per element.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext {
    /// Chat the message belongs to.
    pub source: MessageSource,
    /// Account that sent (or is sending) the message.
    pub sender: i64,
    /// Account on whose behalf the pipeline runs.
    pub receiver: i64,
}

/// One single-purpose converter in the pipeline.
///
/// `decode` and `encode` return `true` when the processor claims the
/// input, which stops the chain for that element/unit. Default
/// implementations claim nothing, so one-directional processors only
/// override the direction they handle.
pub trait ElementProcessor: Send + Sync {
    /// Convert one wire element into content units. Push results into
    /// `out` and return `true` to claim the element.
    fn decode(
        &self,
        element: &WireMessageElement,
        ctx: &MessageContext,
        pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        let _ = (element, ctx, pipeline, out);
        false
    }

    /// Convert one content unit into wire elements. Push results into
    /// `out` and return `true` to claim the unit.
    fn encode(
        &self,
        content: &MessageContent,
        ctx: &MessageContext,
        pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        let _ = (content, ctx, pipeline, out);
        false
    }
}

/// Ordered chain of [`ElementProcessor`]s.
///
/// Processors are tried in registration order; the first claimant wins
/// ("stop-when-consumed"). Unclaimed elements and content units are
/// skipped with a trace log, never an error.
pub struct MessagePipeline {
    processors: Vec<Box<dyn ElementProcessor>>,
}

impl MessagePipeline {
    /// Create an empty pipeline. Most callers want
    /// [`MessagePipeline::standard`].
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Pipeline with all built-in processors registered.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(TextProcessor));
        pipeline.register(Box::new(MentionProcessor));
        pipeline.register(Box::new(FaceProcessor));
        pipeline.register(Box::new(ImageProcessor));
        pipeline.register(Box::new(QuoteProcessor));
        pipeline.register(Box::new(RichProcessor));
        pipeline
    }

    /// Append a processor to the chain. Later registrations are only
    /// consulted for inputs no earlier processor claims.
    pub fn register(&mut self, processor: Box<dyn ElementProcessor>) {
        self.processors.push(processor);
    }

    /// Decode wire elements into a structured message.
    pub fn decode(&self, elements: &[WireMessageElement], ctx: &MessageContext) -> Message {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            let claimed = self
                .processors
                .iter()
                .any(|p| p.decode(element, ctx, self, &mut out));
            if !claimed {
                trace!(?element, "no processor claimed element, skipping");
            }
        }
        Message::from_content(out)
    }

    /// Encode a structured message into wire elements, in content order.
    pub fn encode(&self, message: &Message, ctx: &MessageContext) -> Vec<WireMessageElement> {
        let mut out = Vec::with_capacity(message.len());
        for unit in message {
            let claimed = self
                .processors
                .iter()
                .any(|p| p.encode(unit, ctx, self, &mut out));
            if !claimed {
                trace!("no processor claimed content unit, skipping");
            }
        }
        out
    }
}

impl Default for MessagePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for MessagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePipeline")
            .field("processors", &self.processors.len())
            .finish()
    }
}

/// Text runs.
struct TextProcessor;

impl ElementProcessor for TextProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Text { content } => {
                out.push(MessageContent::Text(content.clone()));
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Text(text) => {
                out.push(WireMessageElement::Text {
                    content: text.clone(),
                });
                true
            }
            _ => false,
        }
    }
}

/// Mentions.
struct MentionProcessor;

impl ElementProcessor for MentionProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Mention { target, display } => {
                out.push(MessageContent::Mention {
                    target: *target,
                    display: display.clone(),
                });
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Mention { target, display } => {
                out.push(WireMessageElement::Mention {
                    target: *target,
                    display: display.clone(),
                });
                true
            }
            _ => false,
        }
    }
}

/// Faces/stickers.
struct FaceProcessor;

impl ElementProcessor for FaceProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Face { id } => {
                out.push(MessageContent::Face(*id));
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Face(id) => {
                out.push(WireMessageElement::Face { id: *id });
                true
            }
            _ => false,
        }
    }
}

/// Image references.
struct ImageProcessor;

impl ElementProcessor for ImageProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Image {
                resource_id,
                width,
                height,
            } => {
                out.push(MessageContent::Image(ImageRef {
                    resource_id: resource_id.clone(),
                    width: *width,
                    height: *height,
                }));
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Image(image) => {
                out.push(WireMessageElement::Image {
                    resource_id: image.resource_id.clone(),
                    width: image.width,
                    height: image.height,
                });
                true
            }
            _ => false,
        }
    }
}

/// Quoted replies; recurses through the whole pipeline for the nested
/// message so quoted content supports every registered type.
struct QuoteProcessor;

impl ElementProcessor for QuoteProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        ctx: &MessageContext,
        pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Quote {
                origin_seq,
                origin_sender,
                elements,
            } => {
                let nested = pipeline.decode(elements, ctx);
                out.push(MessageContent::Quote(Box::new(QuoteContent {
                    origin_seq: *origin_seq,
                    origin_sender: *origin_sender,
                    content: nested.into_iter().collect(),
                })));
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        ctx: &MessageContext,
        pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Quote(quote) => {
                let nested_message = Message::from_content(quote.content.clone());
                let elements = pipeline.encode(&nested_message, ctx);
                out.push(WireMessageElement::Quote {
                    origin_seq: quote.origin_seq,
                    origin_sender: quote.origin_sender,
                    elements,
                });
                true
            }
            _ => false,
        }
    }
}

/// Rich-content blobs. Payload bytes are copied into the message.
struct RichProcessor;

impl ElementProcessor for RichProcessor {
    fn decode(
        &self,
        element: &WireMessageElement,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<MessageContent>,
    ) -> bool {
        match element {
            WireMessageElement::Rich {
                service_id,
                payload,
            } => {
                out.push(MessageContent::Rich {
                    service_id: *service_id,
                    payload: payload.clone(),
                });
                true
            }
            _ => false,
        }
    }

    fn encode(
        &self,
        content: &MessageContent,
        _ctx: &MessageContext,
        _pipeline: &MessagePipeline,
        out: &mut Vec<WireMessageElement>,
    ) -> bool {
        match content {
            MessageContent::Rich {
                service_id,
                payload,
            } => {
                out.push(WireMessageElement::Rich {
                    service_id: *service_id,
                    payload: payload.clone(),
                });
                true
            }
            _ => false,
        }
    }
}
