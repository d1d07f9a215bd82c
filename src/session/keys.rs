//! Per-connection key material and the crypto phase state machine.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::RwLock;

use rand::Rng;

use crate::crypto::{CryptoError, KeyExchange, KeyMaterial, PublicKey};

/// Which key encrypts a frame body.
///
/// The phase travels in the frame header, so both peers apply the same
/// selection rule on encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CryptoPhase {
    /// No encryption. Only the key-exchange-initiation whitelist may use
    /// this phase; nothing secret travels in it.
    Plain = 0,
    /// Keyed by the HKDF-digested ECDH shared secret. Used from key
    /// exchange completion until the server issues a session key.
    Handshake = 1,
    /// Keyed by the server-issued session key. Used for all post-login
    /// traffic.
    Session = 2,
}

impl CryptoPhase {
    /// Parse a wire phase byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CryptoPhase::Plain),
            1 => Some(CryptoPhase::Handshake),
            2 => Some(CryptoPhase::Session),
            _ => None,
        }
    }

    /// The wire phase byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Key material and counters for one physical connection attempt.
///
/// Shared between the writer paths and the reader task of a single
/// connection; the outgoing sequence counter is atomic, the key slots
/// are behind short-critical-section locks because the handshake fills
/// them while the reader is already running.
#[derive(Debug)]
pub struct SessionKeys {
    exchange: RwLock<KeyExchange>,
    session_key: RwLock<Option<KeyMaterial>>,
    sequence: AtomicI32,
}

impl SessionKeys {
    /// Allocate fresh keys for a new connection attempt.
    ///
    /// The sequence counter starts at a random positive offset so
    /// retried logins on a new connection cannot collide with late
    /// frames from a previous one.
    pub fn new() -> Self {
        let start = rand::thread_rng().gen_range(0x1000..0x1000_0000);
        Self {
            exchange: RwLock::new(KeyExchange::new()),
            session_key: RwLock::new(None),
            sequence: AtomicI32::new(start),
        }
    }

    /// Our ephemeral public key for the key-exchange request.
    pub fn client_public_key(&self) -> PublicKey {
        self.exchange
            .read()
            .map(|ex| ex.public_key().clone())
            .unwrap_or_else(|p| p.into_inner().public_key().clone())
    }

    /// Complete the key exchange with the server's public key, deriving
    /// the handshake key.
    pub fn complete_exchange(&self, server_public: &PublicKey) -> Result<(), CryptoError> {
        match self.exchange.write() {
            Ok(mut ex) => ex.complete(server_public),
            Err(poisoned) => poisoned.into_inner().complete(server_public),
        }
    }

    /// Install the server-issued session key; subsequent frames use
    /// [`CryptoPhase::Session`].
    pub fn install_session_key(&self, key: KeyMaterial) {
        match self.session_key.write() {
            Ok(mut slot) => *slot = Some(key),
            Err(poisoned) => *poisoned.into_inner() = Some(key),
        }
    }

    /// The phase a non-whitelisted outbound frame uses right now.
    pub fn current_phase(&self) -> CryptoPhase {
        if self.key_for(CryptoPhase::Session).is_some() {
            CryptoPhase::Session
        } else {
            CryptoPhase::Handshake
        }
    }

    /// The key for a phase, if it has been negotiated yet.
    ///
    /// `Plain` always yields `None` by construction.
    pub fn key_for(&self, phase: CryptoPhase) -> Option<KeyMaterial> {
        match phase {
            CryptoPhase::Plain => None,
            CryptoPhase::Handshake => self
                .exchange
                .read()
                .ok()
                .and_then(|ex| ex.handshake_key().cloned()),
            CryptoPhase::Session => self.session_key.read().ok().and_then(|k| k.clone()),
        }
    }

    /// Allocate the next outgoing sequence id. Monotonic, atomic, and
    /// wraps back into positive space rather than going negative.
    pub fn next_sequence(&self) -> i32 {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        if seq < 0 {
            // Wrapped; restart the counter low. Racing allocators may
            // briefly hand out duplicates of the reset range, which the
            // random start offset makes astronomically unlikely to matter.
            self.sequence.store(0x1000, Ordering::Relaxed);
            self.sequence.fetch_add(1, Ordering::Relaxed)
        } else {
            seq
        }
    }
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self::new()
    }
}
