//! Bidirectional conversion between wire message elements and structured
//! message content.
//!
//! A chat payload on the wire is a flat sequence of tagged elements
//! ([`WireMessageElement`]). The application works with an ordered
//! [`Message`] of structured [`MessageContent`] units. The
//! [`MessagePipeline`] converts between the two as an ordered chain of
//! single-purpose processors:
//!
//! ```text
//! decode:  element ──► processor 1 ─ claimed? ─ yes ─► content, stop
//!                          │ no
//!                      processor 2 ...
//!                          │ no
//!                      (unclaimed: skipped, never fatal)
//! ```
//!
//! A shared [`MessageContext`] carries cross-element state (chat source,
//! sender, receiving account) through one whole message so processors do
//! not re-derive it per element. Composite content (quoted replies)
//! recurses through the same pipeline.
//!
//! Adding a content type means registering one new [`ElementProcessor`];
//! neither existing processors nor the driver change.

mod content;
mod element;
mod pipeline;

pub use content::{ImageRef, Message, MessageContent, QuoteContent};
pub use element::{decode_elements, encode_elements, ElementError, WireMessageElement};
pub use pipeline::{
    ElementProcessor, MessageContext, MessagePipeline, MessageSource,
};
