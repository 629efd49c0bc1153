use super::{request::RegistryRequest, store::Registry};
use tokio::sync::mpsc;

/// Task that exclusively owns the [`Registry`].
///
/// Requests are served one at a time in arrival order, which gives the
/// command flow and the delivery flow a consistent view without a lock. The
/// loop runs until a [`RegistryRequest::Shutdown`] arrives or every
/// [`RegistryHandle`] has been dropped.
///
/// A caller that stopped waiting for its answer is not an error; the reply is
/// simply discarded.
///
/// [`RegistryHandle`]: super::RegistryHandle
pub async fn registry_loop(mut rx: mpsc::Receiver<RegistryRequest>) {
    tracing::trace!("Registry task started");

    let mut registry = Registry::new();

    while let Some(request) = rx.recv().await {
        match request {
            RegistryRequest::Insert {
                id,
                selectors,
                response,
            } => {
                let result = registry.insert(id, selectors);
                if let Err(e) = &result {
                    tracing::warn!("Rejected subscription {id}: {e}");
                }
                let _ = response.send(result);
            }
            RegistryRequest::Remove { id, response } => {
                let _ = response.send(registry.remove(id));
            }
            RegistryRequest::Lookup { id, response } => {
                let _ = response.send(registry.lookup(id).cloned());
            }
            RegistryRequest::Snapshot { response } => {
                let _ = response.send(registry.snapshot());
            }
            RegistryRequest::Clear { response } => {
                let cleared = registry.clear();
                tracing::debug!("Cleared {cleared} subscriptions");
                let _ = response.send(cleared);
            }
            RegistryRequest::Shutdown { response } => {
                tracing::debug!("Registry task received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Registry task failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Registry task stopped ({} subscriptions dropped)", registry.len());
}
