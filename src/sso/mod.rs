//! Single sign-on: the login conversation that turns an established
//! connection into an authenticated session.
//!
//! [`SsoProcessor`] owns the per-account secrets and drives key
//! exchange, credential or resume submission, the interactive challenge
//! loop, and device registration. Request body layouts live in the
//! private `wire` submodule; response layouts are parsed by the codec's
//! command registry.

mod error;
mod processor;
mod wire;

pub use error::LoginError;
pub use processor::SsoProcessor;
