//! # Shared Watch Types
//!
//! Domain types exchanged between the watch manager and a delegated identity
//! agent, together with their conversions to and from the generated
//! `delegation.v1` messages.
//!
//! - [`SubscriptionId`] - locally generated id of a watch
//! - [`HANDSHAKE_ID`] - reserved id carried by the readiness message
//! - [`Operation`] - outbound control message (add or remove a watch)
//! - [`UpdateBatch`] / [`CredentialRecord`] - inbound credential pushes

use crate::{Error, Result, SelectorSet, proto};
use crate::proto::watch_request::Operation as WireOperation;

/// Identifier of a watch, generated by the client.
pub type SubscriptionId = u64;

/// Subscription id of the first message on a fresh stream. It means "stream
/// ready, no subscriptions yet" and is never handed out to a watch.
pub const HANDSHAKE_ID: SubscriptionId = 0;

/// One issued credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Identity the credential was issued for, e.g. a SPIFFE ID.
    pub identity: String,
    /// Expiry in seconds since the unix epoch.
    pub not_after: i64,
}

impl CredentialRecord {
    pub fn new(identity: impl Into<String>, not_after: i64) -> Self {
        Self {
            identity: identity.into(),
            not_after,
        }
    }
}

impl From<proto::CredentialRecord> for CredentialRecord {
    fn from(record: proto::CredentialRecord) -> Self {
        Self {
            identity: record.identity,
            not_after: record.not_after,
        }
    }
}

impl From<CredentialRecord> for proto::CredentialRecord {
    fn from(record: CredentialRecord) -> Self {
        Self {
            identity: record.identity,
            not_after: record.not_after,
        }
    }
}

/// Credentials pushed by the agent for one subscription, in server order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateBatch {
    pub subscription_id: SubscriptionId,
    pub credentials: Vec<CredentialRecord>,
}

impl UpdateBatch {
    /// Returns `true` if this is the readiness message.
    pub const fn is_handshake(&self) -> bool {
        self.subscription_id == HANDSHAKE_ID
    }
}

impl From<proto::CredentialBatch> for UpdateBatch {
    fn from(batch: proto::CredentialBatch) -> Self {
        Self {
            subscription_id: batch.subscription_id,
            credentials: batch.credentials.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outbound control message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Ask the agent to create a watch over `selectors`, identified by `id`.
    Add {
        id: SubscriptionId,
        selectors: SelectorSet,
    },
    /// Ask the agent to tear down the watch identified by `id`.
    Remove { id: SubscriptionId },
}

impl Operation {
    pub const fn id(&self) -> SubscriptionId {
        match self {
            Self::Add { id, .. } | Self::Remove { id } => *id,
        }
    }
}

impl From<Operation> for proto::WatchRequest {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Add { id, selectors } => Self {
                operation: WireOperation::Add as i32,
                id,
                selectors: selectors.into_iter().map(Into::into).collect(),
            },
            Operation::Remove { id } => Self {
                operation: WireOperation::Remove as i32,
                id,
                selectors: Vec::new(),
            },
        }
    }
}

impl TryFrom<proto::WatchRequest> for Operation {
    type Error = Error;

    fn try_from(request: proto::WatchRequest) -> Result<Self> {
        match request.operation() {
            WireOperation::Add => {
                let selectors = request
                    .selectors
                    .into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<SelectorSet>>()?;
                Ok(Self::Add {
                    id: request.id,
                    selectors,
                })
            }
            WireOperation::Remove => Ok(Self::Remove { id: request.id }),
            WireOperation::Unspecified => Err(Error::InvalidRequest {
                reason: format!("operation unspecified for subscription {}", request.id),
            }),
        }
    }
}
