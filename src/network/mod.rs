//! Connection engine: owns the socket, runs the reader task, correlates
//! requests with responses, and drives the resumable connection state
//! machine.
//!
//! The engine makes exactly one promise about request delivery: a
//! response with a matching sequence id wakes the caller that sent the
//! request, and nothing else does. Everything without a waiting caller
//! is a server push and flows out as an [`Event`](crate::Event).

mod handler;
mod pending;
mod state;

pub use handler::NetworkHandler;
pub use state::NetworkState;
