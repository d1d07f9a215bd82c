//! Correlation table for in-flight requests.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::codec::Packet;

/// Maps sequence ids of in-flight requests to their waiting callers.
///
/// Each retry attempt registers a fresh sequence id and removes the
/// previous one, so a response to a superseded attempt finds no entry
/// and is dropped. Dropping the table (or calling [`fail_all`]) wakes
/// every waiter with a closed-channel error.
///
/// [`fail_all`]: PendingTable::fail_all
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<HashMap<i32, oneshot::Sender<Packet>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `sequence_id`.
    pub fn insert(&self, sequence_id: i32) -> oneshot::Receiver<Packet> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(sequence_id, tx);
        rx
    }

    /// Delivers a response to its waiter. Returns `false` when no
    /// waiter is registered (server push, or a superseded retry).
    pub fn complete(&self, sequence_id: i32, packet: Packet) -> bool {
        match self.lock().remove(&sequence_id) {
            // A dropped receiver just discards the packet.
            Some(tx) => {
                let _ = tx.send(packet);
                true
            }
            None => false,
        }
    }

    /// Forgets a waiter, typically after its attempt timed out.
    pub fn remove(&self, sequence_id: i32) {
        self.lock().remove(&sequence_id);
    }

    /// Wakes every waiter with a closed-channel error.
    pub fn fail_all(&self) {
        self.lock().clear();
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i32, oneshot::Sender<Packet>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
