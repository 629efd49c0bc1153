use svidwatch_core::{Result, SelectorSet, SubscriptionId};
use tokio::sync::oneshot;

/// Messages handled by the registry task.
///
/// Each variant carries a `oneshot` sender the task answers on, so callers can
/// await the outcome without sharing the map.
#[derive(Debug)]
pub enum RegistryRequest {
    Insert {
        id: SubscriptionId,
        selectors: SelectorSet,
        response: oneshot::Sender<Result<()>>,
    },
    Remove {
        id: SubscriptionId,
        response: oneshot::Sender<Result<SelectorSet>>,
    },
    Lookup {
        id: SubscriptionId,
        response: oneshot::Sender<Result<SelectorSet>>,
    },
    Snapshot {
        response: oneshot::Sender<Vec<(SubscriptionId, SelectorSet)>>,
    },
    Clear {
        response: oneshot::Sender<usize>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}
