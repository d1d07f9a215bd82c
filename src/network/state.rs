use std::fmt;

/// Connection life cycle.
///
/// ```text
/// Initialized ──► Connecting ──► Ok
///                     │ ▲         │
///                     ▼ └─────────┤ (drop / force offline)
///                  SneakOff ◄─────┘
///                     │
///                     ▼
///                  Closed (terminal)
/// ```
///
/// `SneakOff` is the resumable dropped state: keys and pending state
/// are gone but account secrets survive, so `resume_connection` can
/// bring the engine back to `Ok`. `Closed` is terminal, entered on
/// explicit shutdown or a fatal login failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Constructed, never connected.
    Initialized,
    /// Connect plus login handshake in progress.
    Connecting,
    /// Authenticated and serving traffic.
    Ok,
    /// Connection lost or terminated by the server; resumable.
    SneakOff,
    /// Shut down for good.
    Closed,
}

impl NetworkState {
    /// Whether `resume_connection` may be attempted from this state.
    pub fn resumable(self) -> bool {
        matches!(self, Self::Initialized | Self::SneakOff)
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Ok => "ok",
            Self::SneakOff => "sneak-off",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumable_states() {
        assert!(NetworkState::Initialized.resumable());
        assert!(NetworkState::SneakOff.resumable());
        assert!(!NetworkState::Ok.resumable());
        assert!(!NetworkState::Connecting.resumable());
        assert!(!NetworkState::Closed.resumable());
    }
}
