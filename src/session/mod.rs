//! Short-lived per-connection key material.
//!
//! One [`SessionKeys`] is allocated per physical connection attempt and
//! dropped wholesale when the connection closes or is replaced; a
//! reconnect never reuses stale keys. Contrast with
//! [`crate::auth::AccountSecrets`], which survives reconnects.

mod keys;

pub use keys::{CryptoPhase, SessionKeys};
