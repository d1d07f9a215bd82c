use thiserror::Error;

/// Login handshake failures.
///
/// The engine's reconnect loop treats these in two classes, selected by
/// [`LoginError::kill_bot`]: fatal ones stop the engine, transient ones
/// leave it in a dropped state to be resumed later.
#[derive(Debug, Clone, Error)]
pub enum LoginError {
    /// Account or password rejected. Retrying would hammer the account
    /// into a lockout.
    #[error("Wrong account or password")]
    WrongCredential,

    /// The server answered for a different account than the one that
    /// logged in. Always a client bug or a hostile server.
    #[error("Server identity does not match the logged-in account")]
    InconsistentIdentity,

    /// The server demanded a challenge the configured solver refuses.
    #[error("Unsupported login challenge: {0}")]
    UnsupportedChallenge(String),

    /// No configured server endpoint accepted a connection.
    #[error("No server available")]
    NoServerAvailable,

    /// Server asked to back off. Transient.
    #[error("Server asked to retry later: {0}")]
    RetryLater(String),

    /// Server refused the login with an unmapped status code.
    #[error("Login rejected (code 0x{code:02x}): {message}")]
    Rejected {
        /// Raw status byte from the response.
        code: u8,
        /// Server-provided explanation, possibly empty.
        message: String,
    },

    /// The login conversation went off script (wrong body type, too
    /// many challenge rounds).
    #[error("Login protocol violation: {0}")]
    Protocol(String),
}

impl LoginError {
    /// Whether this failure should stop the engine entirely rather than
    /// leave it resumable.
    pub fn kill_bot(&self) -> bool {
        matches!(
            self,
            Self::WrongCredential
                | Self::InconsistentIdentity
                | Self::UnsupportedChallenge(_)
                | Self::Rejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split() {
        assert!(LoginError::WrongCredential.kill_bot());
        assert!(LoginError::Rejected {
            code: 0x40,
            message: String::new()
        }
        .kill_bot());
        assert!(!LoginError::NoServerAvailable.kill_bot());
        assert!(!LoginError::RetryLater("busy".into()).kill_bot());
        assert!(!LoginError::Protocol("odd".into()).kill_bot());
    }
}
