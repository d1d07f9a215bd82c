//! Events pushed to the application.

use crate::message::{Message, MessageContext};
use crate::network::NetworkState;

/// A chat message received from the server, fully decoded through the
/// content pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Chat, sender, and receiving account.
    pub context: MessageContext,
    /// Server-assigned sequence of the message within its chat.
    pub message_seq: i32,
    /// Decoded content.
    pub message: Message,
}

/// Engine events, delivered over a broadcast channel obtained from
/// [`Bot::subscribe`](crate::Bot::subscribe).
///
/// Slow subscribers that fall behind the channel capacity lose the
/// oldest events, never block the engine.
#[derive(Debug, Clone)]
pub enum Event {
    /// A chat message arrived.
    MessageReceived(InboundMessage),

    /// The server terminated the session, typically because the same
    /// account logged in elsewhere. The engine transitions to
    /// [`NetworkState::SneakOff`] and can be resumed.
    ForceOffline {
        /// Server reason code.
        code: u8,
        /// Human-readable explanation.
        message: String,
    },

    /// The connection state machine moved.
    StateChanged(NetworkState),
}
