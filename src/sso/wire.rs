//! Request-body builders for the auth command family.
//!
//! Bodies travel encrypted (handshake key for login, session key after)
//! except the key-exchange initiation, which is plaintext by necessity.

use crate::auth::AccountSecrets;
use crate::codec::BodyWriter;
use crate::crypto::PublicKey;

/// Login submission kinds, the leading byte of every `auth.login` body.
mod kind {
    pub const PASSWORD: u8 = 0x01;
    pub const RESUME: u8 = 0x02;
    pub const CAPTCHA_ANSWER: u8 = 0x03;
    pub const DEVICE_LOCK_TICKET: u8 = 0x04;
    pub const INTERACTIVE_TICKET: u8 = 0x05;
}

/// `auth.key_exchange` request: the client's raw X25519 public key.
pub fn key_exchange_request(client_public: &PublicKey) -> Vec<u8> {
    client_public.as_bytes().to_vec()
}

/// Password login:
/// `0x01 || i64 account || guid(16) || u16 len || password_key || seed(16)`.
pub fn password_login_request(account_id: i64, secrets: &AccountSecrets) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.u8(kind::PASSWORD)
        .i64(account_id)
        .raw(secrets.device_guid.as_bytes())
        .bytes_u16(secrets.password_key.as_bytes())
        .raw(&secrets.random_seed);
    w.into_bytes()
}

/// Session resume:
/// `0x02 || i64 account || guid(16) || u16 len || session_signature`.
///
/// Returns `None` when no signature is stored.
pub fn resume_login_request(account_id: i64, secrets: &AccountSecrets) -> Option<Vec<u8>> {
    let signature = secrets.session_signature.as_deref()?;
    let mut w = BodyWriter::new();
    w.u8(kind::RESUME)
        .i64(account_id)
        .raw(secrets.device_guid.as_bytes())
        .bytes_u16(signature);
    Some(w.into_bytes())
}

/// Captcha answer: `0x03 || u16 len || answer`.
pub fn captcha_answer_request(answer: &str) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.u8(kind::CAPTCHA_ANSWER).string_u16(answer);
    w.into_bytes()
}

/// Device-lock unlock ticket: `0x04 || u16 len || ticket`.
pub fn device_lock_ticket_request(ticket: &str) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.u8(kind::DEVICE_LOCK_TICKET).string_u16(ticket);
    w.into_bytes()
}

/// Interactive-challenge ticket: `0x05 || u16 len || ticket`.
pub fn interactive_ticket_request(ticket: &str) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.u8(kind::INTERACTIVE_TICKET).string_u16(ticket);
    w.into_bytes()
}

/// `client.register` request:
/// `i64 account || guid(16) || u16 len || device_session_id`.
pub fn register_request(account_id: i64, secrets: &AccountSecrets) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.i64(account_id)
        .raw(secrets.device_guid.as_bytes())
        .bytes_u16(&secrets.device_session_id);
    w.into_bytes()
}

/// `auth.logout` request: `i64 account`.
pub fn logout_request(account_id: i64) -> Vec<u8> {
    let mut w = BodyWriter::new();
    w.i64(account_id);
    w.into_bytes()
}
