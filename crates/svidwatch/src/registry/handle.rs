//! Async client side of the registry task.

use super::{request::RegistryRequest, worker::registry_loop};
use core::time::Duration;
use svidwatch_core::{Error, Result, SelectorSet, SubscriptionId};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};

/// Cloneable handle to the task that owns the subscription registry.
///
/// Every method sends one [`RegistryRequest`] and awaits the answer. If the
/// task has exited, methods return [`Error::ChannelError`].
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryRequest>,
}

impl RegistryHandle {
    /// Spawns the registry task with a request queue of `buffer_size` and
    /// returns a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        tokio::spawn(registry_loop(rx));
        Self { tx }
    }

    /// Registers `selectors` under `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateId`] if `id` is already registered.
    /// - [`Error::ChannelError`] if the registry task is gone.
    pub async fn insert(&self, id: SubscriptionId, selectors: SelectorSet) -> Result<()> {
        self.request(|response| RegistryRequest::Insert {
            id,
            selectors,
            response,
        })
        .await?
    }

    /// Removes and returns the entry for `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `id` is not registered.
    /// - [`Error::ChannelError`] if the registry task is gone.
    pub async fn remove(&self, id: SubscriptionId) -> Result<SelectorSet> {
        self.request(|response| RegistryRequest::Remove { id, response })
            .await?
    }

    /// Resolves `id` to its selectors.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `id` is not registered.
    /// - [`Error::ChannelError`] if the registry task is gone.
    pub async fn lookup(&self, id: SubscriptionId) -> Result<SelectorSet> {
        self.request(|response| RegistryRequest::Lookup { id, response })
            .await?
    }

    /// All entries, sorted by id.
    pub async fn snapshot(&self) -> Result<Vec<(SubscriptionId, SelectorSet)>> {
        self.request(|response| RegistryRequest::Snapshot { response })
            .await
    }

    /// Drops every entry, returning how many there were.
    pub async fn clear(&self) -> Result<usize> {
        self.request(|response| RegistryRequest::Clear { response })
            .await
    }

    /// Stops the registry task and waits (up to `wait`) for it to
    /// acknowledge.
    ///
    /// Calling this on a task that already stopped is not an error.
    pub async fn shutdown(&self, wait: Duration) {
        let (response, rx) = oneshot::channel();
        if self
            .tx
            .send(RegistryRequest::Shutdown { response })
            .await
            .is_err()
        {
            tracing::debug!("Registry task already stopped");
            return;
        }

        match timeout(wait, rx).await {
            Ok(Ok(())) => tracing::trace!("Registry shutdown acknowledged"),
            Ok(Err(_e)) => tracing::debug!("Registry task dropped shutdown acknowledgement"),
            Err(_) => tracing::warn!("Registry shutdown timed out"),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryRequest,
    ) -> Result<T> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(make(response))
            .await
            .map_err(|_| Error::ChannelError {
                context: "registry task is not running".to_string(),
            })?;
        rx.await.map_err(|_| Error::ChannelError {
            context: "registry task dropped the request".to_string(),
        })
    }
}
