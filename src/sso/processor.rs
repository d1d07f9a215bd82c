//! The login conversation.
//!
//! ```text
//! key_exchange ──► submit (resume | password) ──► challenge loop ──► success
//!                        ▲                            │
//!                        └── signature expired ◄──────┘
//! ```
//!
//! Resume is attempted whenever a session signature is stored; on
//! `SignatureExpired` the signature is dropped and the flow falls back
//! to a password submission, once. Challenges loop through the
//! configured [`ChallengeSolver`] with a hard round cap so a
//! misbehaving server cannot spin the client forever.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::error::LoginError;
use super::wire;
use crate::auth::{AccountSecrets, AccountSecretsManager, ChallengeSolver};
use crate::codec::{commands, LoginResponse, Packet, PacketBody};
use crate::error::{ImpError, Result};
use crate::network::NetworkHandler;
use crate::session::SessionKeys;

/// Challenge rounds tolerated before the login is abandoned.
const MAX_CHALLENGE_ROUNDS: usize = 8;

/// Ticket-key derivation label.
const TICKET_KEY_INFO: &[u8] = b"imp/v1/ticket";

/// Drives the full SSO handshake for one account.
pub struct SsoProcessor {
    account_id: i64,
    secrets: Mutex<AccountSecrets>,
    manager: Arc<dyn AccountSecretsManager>,
    solver: Arc<dyn ChallengeSolver>,
}

impl SsoProcessor {
    /// Loads stored secrets for the account, or mints fresh ones from
    /// the password.
    pub fn new(
        account_id: i64,
        password: &str,
        manager: Arc<dyn AccountSecretsManager>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Self {
        let secrets = manager.load(account_id).unwrap_or_else(|| {
            let fresh = AccountSecrets::fresh(password);
            manager.save(account_id, &fresh);
            fresh
        });
        Self {
            account_id,
            secrets: Mutex::new(secrets),
            manager,
            solver,
        }
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// Whether the stored secrets would let the next login resume
    /// instead of submitting credentials.
    pub fn can_resume(&self) -> bool {
        self.lock_secrets().has_session_signature()
    }

    /// Runs key exchange and login on an established connection,
    /// installing the server-issued session key on success.
    pub async fn login(&self, handler: &NetworkHandler, keys: &SessionKeys) -> Result<()> {
        self.key_exchange(handler, keys).await?;

        let first = match self.resume_body() {
            Some(body) => {
                debug!(account = self.account_id, "resuming with stored session signature");
                body
            }
            None => {
                debug!(account = self.account_id, "submitting password credentials");
                self.password_body()
            }
        };

        let mut response = self.submit(handler, first).await?;
        let mut password_fallback_spent = false;

        for _round in 0..MAX_CHALLENGE_ROUNDS {
            let next_body = match response {
                LoginResponse::Success {
                    session_signature,
                    session_key,
                } => {
                    let ticket_key = session_key.derive(TICKET_KEY_INFO, 32)?;
                    {
                        let mut secrets = self.lock_secrets();
                        secrets.session_signature = Some(session_signature);
                        secrets.ticket_key = Some(ticket_key);
                        self.manager.save(self.account_id, &secrets);
                    }
                    keys.install_session_key(session_key);
                    info!(account = self.account_id, "login succeeded");
                    return Ok(());
                }
                LoginResponse::SignatureExpired => {
                    if password_fallback_spent {
                        return Err(LoginError::Protocol(
                            "server expired a password login".to_string(),
                        )
                        .into());
                    }
                    password_fallback_spent = true;
                    warn!(
                        account = self.account_id,
                        "session signature expired, falling back to password"
                    );
                    {
                        let mut secrets = self.lock_secrets();
                        secrets.invalidate_session();
                        self.manager.save(self.account_id, &secrets);
                    }
                    self.password_body()
                }
                LoginResponse::CaptchaRequired { image } => {
                    match self.solver.solve_image_challenge(&image)? {
                        Some(answer) => wire::captcha_answer_request(&answer),
                        // Unsolved: resubmit credentials for a fresh challenge.
                        None => self.password_body(),
                    }
                }
                LoginResponse::DeviceLockRequired { url } => {
                    match self.solver.solve_device_lock_challenge(&url)? {
                        Some(ticket) => wire::device_lock_ticket_request(&ticket),
                        None => self.password_body(),
                    }
                }
                LoginResponse::InteractiveRequired { url } => {
                    match self.solver.solve_interactive_challenge(&url)? {
                        Some(ticket) => wire::interactive_ticket_request(&ticket),
                        None => self.password_body(),
                    }
                }
                LoginResponse::WrongCredential => {
                    return Err(LoginError::WrongCredential.into());
                }
                LoginResponse::InconsistentIdentity => {
                    return Err(LoginError::InconsistentIdentity.into());
                }
                LoginResponse::RetryLater { message } => {
                    return Err(LoginError::RetryLater(message).into());
                }
                LoginResponse::Rejected { code, message } => {
                    return Err(LoginError::Rejected { code, message }.into());
                }
            };
            response = self.submit(handler, next_body).await?;
        }

        Err(LoginError::Protocol(format!(
            "gave up after {MAX_CHALLENGE_ROUNDS} challenge rounds"
        ))
        .into())
    }

    /// Registers the device session after login. Stores the issued
    /// device session id for future resumes.
    pub async fn register(&self, handler: &NetworkHandler) -> Result<()> {
        let body = wire::register_request(self.account_id, &self.lock_secrets());
        let packet = handler.send_and_expect(commands::REGISTER, body).await?;
        match packet.body {
            PacketBody::Register(ack) if ack.status == 0 => {
                let mut secrets = self.lock_secrets();
                secrets.device_session_id = ack.device_session_id;
                self.manager.save(self.account_id, &secrets);
                debug!(account = self.account_id, "device session registered");
                Ok(())
            }
            PacketBody::Register(ack) => Err(LoginError::Protocol(format!(
                "registration refused with status 0x{:02x}",
                ack.status
            ))
            .into()),
            other => Err(unexpected(commands::REGISTER, &other)),
        }
    }

    /// Best-effort logout notice. Failures are ignored; the connection
    /// is going away either way.
    pub async fn logout(&self, handler: &NetworkHandler) {
        let body = wire::logout_request(self.account_id);
        if let Err(e) = handler.send_without_expect(commands::LOGOUT, body).await {
            debug!(error = %e, "logout notice not delivered");
        }
    }

    async fn key_exchange(&self, handler: &NetworkHandler, keys: &SessionKeys) -> Result<()> {
        let body = wire::key_exchange_request(&keys.client_public_key());
        let packet = handler.send_and_expect(commands::KEY_EXCHANGE, body).await?;
        match packet.body {
            PacketBody::KeyExchange(ack) => {
                keys.complete_exchange(&ack.server_public)?;
                debug!("handshake key negotiated");
                Ok(())
            }
            other => Err(unexpected(commands::KEY_EXCHANGE, &other)),
        }
    }

    async fn submit(&self, handler: &NetworkHandler, body: Vec<u8>) -> Result<LoginResponse> {
        let packet: Packet = handler.send_and_expect(commands::LOGIN, body).await?;
        match packet.body {
            PacketBody::Login(response) => Ok(response),
            other => Err(unexpected(commands::LOGIN, &other)),
        }
    }

    fn resume_body(&self) -> Option<Vec<u8>> {
        wire::resume_login_request(self.account_id, &self.lock_secrets())
    }

    fn password_body(&self) -> Vec<u8> {
        wire::password_login_request(self.account_id, &self.lock_secrets())
    }

    fn lock_secrets(&self) -> std::sync::MutexGuard<'_, AccountSecrets> {
        match self.secrets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn unexpected(command: &str, body: &PacketBody) -> ImpError {
    LoginError::Protocol(format!(
        "unexpected body for {command}: {}",
        body_name(body)
    ))
    .into()
}

fn body_name(body: &PacketBody) -> &'static str {
    match body {
        PacketBody::KeyExchange(_) => "key_exchange",
        PacketBody::Login(_) => "login",
        PacketBody::Register(_) => "register",
        PacketBody::HeartbeatAck => "heartbeat_ack",
        PacketBody::MessageAck(_) => "message_ack",
        PacketBody::Chat(_) => "chat",
        PacketBody::ForceOffline(_) => "force_offline",
        PacketBody::Unknown(_) => "unknown",
    }
}
