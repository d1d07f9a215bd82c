//! # IMP Protocol - Instant Messaging Client Engine
//!
//! Client-side wire-protocol engine for the IMP instant-messaging
//! protocol: encrypted framing, SSO login, a resumable connection state
//! machine, and an extensible message content pipeline.
//!
//! ## Features
//!
//! - **Encrypted framing**: length-prefixed frames, X25519 handshake,
//!   ChaCha20-Poly1305 bodies with header binding
//! - **SSO login**: password and session-resume flows with an
//!   interactive challenge loop (captcha, device lock, slider)
//! - **Resumable connections**: one `resume_connection()` call recovers
//!   from any drop, keeping account secrets across reconnects
//! - **Request correlation**: concurrent requests over one socket,
//!   matched by sequence id, with per-attempt timeout and retry
//! - **Content pipeline**: chat messages decoded element-by-element
//!   through replaceable processors
//!
//! ## Protocol Overview
//!
//! IMP is a command-oriented binary protocol over TCP. Every frame
//! carries a command name, a sequence id for correlation, and a phase
//! byte naming the key its body is encrypted under.
//!
//! ### Architecture
//!
//! ```text
//!  Application
//!      │  send_message / events
//!      v
//!  ┌─ Bot ──────────────────────────────────────────┐
//!  │  MessagePipeline      SsoProcessor             │
//!  │       │                    │                   │
//!  │       v                    v                   │
//!  │  NetworkHandler ── PendingTable ── reader task │
//!  │       │                                        │
//!  │       v                                        │
//!  │  frame codec ── SessionKeys (phase → key)      │
//!  └───────│────────────────────────────────────────┘
//!          v
//!         TCP
//! ```
//!
//! ### Connection State Machine
//!
//! ```text
//!                 resume_connection()
//!  [Initialized] ────────────────────> [Connecting]
//!                                        │       │
//!                   login ok             │       │ transport/login failure
//!                 ┌──────────────────────┘       v
//!                 v                          [SneakOff] ─── resume_connection()
//!               [Ok] ── drop/force-offline ────^ │
//!                 │                              │ fatal login failure
//!                 │ close()                      v
//!                 └─────────────────────────> [Closed]
//! ```
//!
//! ### Wire Format
//!
//! ```text
//! u32 total_len | u8 phase | i32 sequence_id | u16 len + command | body
//! ```
//!
//! | Phase       | Body encryption       | Key source                  |
//! |-------------|-----------------------|-----------------------------|
//! | `Plain`     | none                  | (whitelisted commands only) |
//! | `Handshake` | ChaCha20-Poly1305     | HKDF over X25519 secret     |
//! | `Session`   | ChaCha20-Poly1305     | issued by login response    |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imp::{Bot, Event, ImpConfig, Message, MessageSource};
//!
//! let mut config = ImpConfig::default();
//! config.network.servers = vec!["chat.example.net:8080".into()];
//!
//! let bot = Bot::new(123_456, "password", config);
//! bot.resume_connection().await?;
//!
//! // React to incoming messages.
//! let mut events = bot.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let Event::MessageReceived(inbound) = event {
//!         println!("{}: {}", inbound.context.sender, inbound.message.plain_text());
//!     }
//! }
//!
//! // Send one.
//! let receipt = bot
//!     .send_message(
//!         MessageSource::Group { group_id: 42 },
//!         &Message::new().mention(789, "@alice").text(" hello"),
//!     )
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`bot`]: application-facing facade
//! - [`network`]: connection engine, state machine, request correlation
//! - [`sso`]: login conversation and challenge loop
//! - [`codec`]: frame layout, typed packet bodies, command dispatch
//! - [`crypto`]: key exchange, key derivation, body cipher
//! - [`session`]: per-connection keys and crypto phase
//! - [`auth`]: account secrets and challenge solving collaborators
//! - [`message`]: content model, wire elements, processing pipeline
//! - [`event`]: events pushed to the application
//! - [`config`]: configuration management
//! - [`error`]: error types and result alias

pub mod auth;
pub mod bot;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod message;
pub mod network;
pub mod session;
pub mod sso;

// Re-exports for convenience
pub use auth::{AccountSecrets, AccountSecretsManager, ChallengeSolver, UnattendedSolver};
pub use bot::{Bot, BotBuilder, MessageReceipt};
pub use config::ImpConfig;
pub use error::{ImpError, Result};
pub use event::{Event, InboundMessage};
pub use message::{Message, MessageContent, MessagePipeline, MessageSource};
pub use network::{NetworkHandler, NetworkState};
pub use sso::LoginError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol revision this engine speaks.
pub const PROTOCOL_VERSION: u8 = 1;
