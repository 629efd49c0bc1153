use crate::stream::Termination;
use svidwatch_core::{CredentialRecord, SelectorSet, SubscriptionId};

/// The watch an update batch was resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchTarget {
    /// The id is registered; `selectors` is what it watches.
    Resolved {
        id: SubscriptionId,
        selectors: SelectorSet,
    },
    /// The id is not (or no longer) registered. The update is still
    /// delivered, labelled with the raw id.
    Unresolved { id: SubscriptionId },
}

impl WatchTarget {
    pub const fn id(&self) -> SubscriptionId {
        match self {
            Self::Resolved { id, .. } | Self::Unresolved { id } => *id,
        }
    }
}

/// Something the caller is told about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// The agent pushed credentials; they are in the order it sent them.
    Update {
        target: WatchTarget,
        credentials: Vec<CredentialRecord>,
    },
    /// The update sequence ended. Sent exactly once, last.
    Terminated(Termination),
}
