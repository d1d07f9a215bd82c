//! Interactive login challenge resolution.

use crate::error::Result;
use crate::sso::LoginError;

/// Collaborator that resolves interactive login challenges.
///
/// Implemented outside the core (console prompt, GUI, external QR flow).
/// Each method returns:
///
/// - `Ok(Some(answer))` — challenge solved, the answer is submitted;
/// - `Ok(None)` — could not solve right now, the processor requests a
///   fresh challenge;
/// - `Err(_)` — aborts the login cleanly (typically a fatal
///   [`LoginError::UnsupportedChallenge`]).
///
/// Methods are synchronous; solving is human-in-the-loop and rare, so
/// implementations own any blocking they need.
pub trait ChallengeSolver: Send + Sync {
    /// Solve a captcha image challenge; the bytes are the encoded image.
    fn solve_image_challenge(&self, image: &[u8]) -> Result<Option<String>>;

    /// Solve an interactive challenge (e.g. slider) hosted at `url`.
    fn solve_interactive_challenge(&self, url: &str) -> Result<Option<String>>;

    /// Solve a device-lock verification hosted at `url`, returning the
    /// unlock ticket.
    fn solve_device_lock_challenge(&self, url: &str) -> Result<Option<String>>;
}

/// Solver for unattended bots: refuses every challenge with a fatal
/// login error, so headless deployments fail fast instead of hanging.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnattendedSolver;

impl ChallengeSolver for UnattendedSolver {
    fn solve_image_challenge(&self, _image: &[u8]) -> Result<Option<String>> {
        Err(LoginError::UnsupportedChallenge("image captcha".to_string()).into())
    }

    fn solve_interactive_challenge(&self, url: &str) -> Result<Option<String>> {
        Err(LoginError::UnsupportedChallenge(format!("interactive challenge at {url}")).into())
    }

    fn solve_device_lock_challenge(&self, url: &str) -> Result<Option<String>> {
        Err(LoginError::UnsupportedChallenge(format!("device lock at {url}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImpError;

    #[test]
    fn test_unattended_solver_fails_fatally() {
        let solver = UnattendedSolver;
        let err = solver.solve_image_challenge(&[0u8; 4]).unwrap_err();
        match err {
            ImpError::Login(e) => assert!(e.kill_bot()),
            other => panic!("expected login error, got {other:?}"),
        }
    }
}
