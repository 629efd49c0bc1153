//! Error types for the delegated identity watch manager.
//!
//! This module defines the central `Error` enum shared by the selector codec,
//! the subscription registry and the stream controller. Input and lookup
//! errors are recoverable and go back to the immediate caller. Transport
//! errors are fatal to the current stream and end the update sequence.
//!
//! ## Error Cases
//! - `MalformedSelector`: selector text was not `type:value`.
//! - `DuplicateId`: a generated subscription id is already registered.
//! - `NotFound`: no subscription is registered under the id.
//! - `TransportFailure`: the stream broke during handshake or mid-stream.
//! - `HandshakeViolation`: the first inbound message was not the sentinel.
//! - `StreamClosed`: the stream was closed before the operation completed.
//! - `UpdatesTaken`: the update sequence was already handed out.
//! - `InvalidRequest`: a caller request was malformed.
//! - `InvalidEndpoint`: the configured endpoint could not be understood.
//! - `ChannelError`: an internal channel between tasks is closed.

use crate::SubscriptionId;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the watch manager.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The selector text has no `:` delimiter or an empty type.
    #[error("selector \"{input}\" must be formatted as type:value")]
    MalformedSelector { input: String },

    /// The registry already holds this subscription id.
    #[error("subscription {0} is already registered")]
    DuplicateId(SubscriptionId),

    /// The registry holds no subscription with this id.
    #[error("subscription {0} not found")]
    NotFound(SubscriptionId),

    /// The underlying transport failed.
    #[error("Transport failure: {context}")]
    TransportFailure { context: String },

    /// The first message on the stream was not the handshake sentinel.
    #[error("Handshake violation: expected subscription id 0, received {received}")]
    HandshakeViolation { received: SubscriptionId },

    /// The stream was closed before the operation could complete.
    #[error("Stream is closed")]
    StreamClosed,

    /// The single update sequence of this stream was already handed out.
    #[error("Update sequence already taken")]
    UpdatesTaken,

    /// The caller request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The configured endpoint is neither a socket path nor an HTTP URI.
    #[error("Invalid endpoint \"{endpoint}\": {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Internal channel send/receive failure (e.g., the owning task exited).
    #[error("Channel error: {context}")]
    ChannelError { context: String },
}

impl Error {
    /// Returns `true` when the error ends the current stream.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. } | Self::HandshakeViolation { .. }
        )
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::TransportFailure {
            context: format!("{:?}: {}", status.code(), status.message()),
        }
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Self::TransportFailure {
            context: err.to_string(),
        }
    }
}
