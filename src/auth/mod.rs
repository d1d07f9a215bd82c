//! Long-lived account credentials and the collaborator interfaces the
//! login handshake depends on.
//!
//! [`AccountSecrets`] survives reconnects and is persisted through an
//! external [`AccountSecretsManager`] with unknown durability guarantees;
//! the engine tolerates `load` returning nothing and simply performs a
//! fresh credential login. Interactive login challenges are delegated to
//! a [`ChallengeSolver`], keeping UI concerns out of the core.

mod challenge;
mod secrets;

pub use challenge::{ChallengeSolver, UnattendedSolver};
pub use secrets::{AccountSecrets, AccountSecretsManager, MemorySecretsManager};
