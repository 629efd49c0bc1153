pub mod error;
pub mod selector;
pub mod types;

pub use error::{Error, Result};
pub use selector::{Selector, SelectorSet};
pub use types::{CredentialRecord, HANDSHAKE_ID, Operation, SubscriptionId, UpdateBatch};

/// Generated `delegation.v1` messages plus client and server bindings.
pub mod proto {
    tonic::include_proto!("delegation.v1");
}
