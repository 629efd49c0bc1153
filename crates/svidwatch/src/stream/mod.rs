//! The single bidirectional stream to the delegated identity agent.
//!
//! ## Structure
//!
//! - [`connect`] - endpoint parsing and transport dialing.
//! - [`state`] - the `Connecting -> Ready -> Closed | Failed` state machine.
//! - [`controller`] - [`StreamController`]: handshake and `submit`.
//! - [`updates`] - [`Updates`]: the lazy sequence of inbound batches.

pub mod connect;
pub mod controller;
pub mod state;
pub mod updates;

pub use connect::AgentEndpoint;
pub use controller::StreamController;
pub use state::{StreamState, Termination};
pub use updates::Updates;
