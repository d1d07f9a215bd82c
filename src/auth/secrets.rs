//! Per-account secret material that survives reconnects.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use rand::RngCore;
use uuid::Uuid;

use crate::crypto::KeyMaterial;

/// Long-lived secrets for one logical account.
///
/// Mutated by the SSO processor on successful login steps and persisted
/// through an [`AccountSecretsManager`]. Distinct from per-connection
/// session keys: nothing here is tied to a physical connection.
#[derive(Clone)]
pub struct AccountSecrets {
    /// Device GUID, generated once per device.
    pub device_guid: Uuid,
    /// Digest of the account password; the password itself is never kept.
    pub password_key: KeyMaterial,
    /// Opaque session signature issued by the server on successful login.
    /// Presenting it allows resuming without re-submitting credentials.
    pub session_signature: Option<Vec<u8>>,
    /// Device-bound random seed, fixed at first login.
    pub random_seed: [u8; 16],
    /// Device session id issued at registration time.
    pub device_session_id: Vec<u8>,
    /// Shared ticket key issued alongside the session signature.
    pub ticket_key: Option<KeyMaterial>,
}

impl AccountSecrets {
    /// Create fresh secrets for a first-time login with a password.
    pub fn fresh(password: &str) -> Self {
        let mut random_seed = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut random_seed);

        Self {
            device_guid: Uuid::new_v4(),
            password_key: KeyMaterial::digest(password.as_bytes()),
            session_signature: None,
            random_seed,
            device_session_id: Vec::new(),
            ticket_key: None,
        }
    }

    /// Whether a stored session signature is available for resume.
    pub fn has_session_signature(&self) -> bool {
        self.session_signature.is_some()
    }

    /// Drop the stored session signature (e.g. after the server rejected
    /// it as expired), forcing the next login to submit credentials.
    pub fn invalidate_session(&mut self) {
        self.session_signature = None;
        self.ticket_key = None;
    }
}

impl fmt::Debug for AccountSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets are redacted; only structural facts are shown
        f.debug_struct("AccountSecrets")
            .field("device_guid", &self.device_guid)
            .field("password_key", &self.password_key)
            .field("session_signature", &self.session_signature.as_ref().map(Vec::len))
            .field("device_session_id_len", &self.device_session_id.len())
            .finish_non_exhaustive()
    }
}

/// External persistence collaborator for [`AccountSecrets`].
///
/// The engine treats this as a cache with unknown durability: `load`
/// returning `None` means a fresh credential login, and `save` failures
/// are the implementation's problem to surface.
pub trait AccountSecretsManager: Send + Sync {
    /// Load secrets for an account, if any were persisted.
    fn load(&self, account_id: i64) -> Option<AccountSecrets>;

    /// Persist updated secrets for an account.
    fn save(&self, account_id: i64, secrets: &AccountSecrets);
}

/// In-memory [`AccountSecretsManager`]; secrets live as long as the
/// process. Useful for tests and throwaway bots.
#[derive(Default)]
pub struct MemorySecretsManager {
    store: Mutex<HashMap<i64, AccountSecrets>>,
}

impl MemorySecretsManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountSecretsManager for MemorySecretsManager {
    fn load(&self, account_id: i64) -> Option<AccountSecrets> {
        self.store
            .lock()
            .ok()
            .and_then(|map| map.get(&account_id).cloned())
    }

    fn save(&self, account_id: i64, secrets: &AccountSecrets) {
        if let Ok(mut map) = self.store.lock() {
            map.insert(account_id, secrets.clone());
        }
    }
}
