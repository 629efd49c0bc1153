//! Caller-facing facade over one delegated identity stream.

use super::{
    coordinator::WatchCoordinator,
    delivery::run_delivery_loop,
    event::WatchEvent,
    id::{IdGenerator, RandomIdGenerator},
};
use crate::{
    config::ClientConfig,
    registry::RegistryHandle,
    stream::{StreamController, StreamState, Termination},
};
use core::time::Duration;
use svidwatch_core::{Error, Result, SelectorSet, SubscriptionId};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tracing::Instrument;

/// How long [`WatchSession::close`] waits for the registry task.
const REGISTRY_SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

/// How long [`WatchSession::close`] waits for the delivery task to hand over
/// the terminal event before abandoning it.
const DELIVERY_SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

/// An open stream with its registry task and delivery task running.
///
/// Updates arrive on the event receiver returned by [`open`](Self::open),
/// followed by exactly one [`WatchEvent::Terminated`]. The session does not
/// reconnect: once terminated, open a new one and re-add the watches.
pub struct WatchSession<G = RandomIdGenerator> {
    coordinator: WatchCoordinator<G>,
    delivery: JoinHandle<Termination>,
}

impl WatchSession {
    /// Dials the agent described by `config`, waits for the handshake and
    /// starts delivering updates.
    ///
    /// # Errors
    ///
    /// Returns the dial or handshake failure; no tasks are left running.
    pub async fn open(config: &ClientConfig) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        let stream = StreamController::open(
            &config.endpoint,
            config.connect_timeout,
            config.outbound_buffer_size,
        )
        .await?;
        Self::start(stream, RandomIdGenerator, config)
    }
}

impl<G: IdGenerator> WatchSession<G> {
    /// Starts a session over an already established `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpdatesTaken`] if the update sequence of `stream` was
    /// already handed out.
    pub fn start(
        stream: StreamController,
        ids: G,
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        let updates = stream.updates()?;
        let registry = RegistryHandle::spawn(config.registry_buffer_size);
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer_size);

        let delivery = tokio::spawn(
            run_delivery_loop(updates, registry.clone(), events_tx)
                .instrument(tracing::info_span!("delivery")),
        );

        let session = Self {
            coordinator: WatchCoordinator::with_id_generator(stream, registry, ids),
            delivery,
        };
        Ok((session, events_rx))
    }

    /// See [`WatchCoordinator::add_watch`].
    pub async fn add_watch(&self, selector: &str) -> Result<SubscriptionId> {
        self.coordinator.add_watch(selector).await
    }

    /// See [`WatchCoordinator::add_watch_selectors`].
    pub async fn add_watch_selectors(&self, selectors: SelectorSet) -> Result<SubscriptionId> {
        self.coordinator.add_watch_selectors(selectors).await
    }

    /// See [`WatchCoordinator::remove_watch`].
    pub async fn remove_watch(&self, id: SubscriptionId) -> Result<SelectorSet> {
        self.coordinator.remove_watch(id).await
    }

    /// The registered watches, sorted by id.
    pub async fn watches(&self) -> Result<Vec<(SubscriptionId, SelectorSet)>> {
        self.coordinator.watches().await
    }

    pub fn state(&self) -> StreamState {
        self.coordinator.stream().state()
    }

    pub const fn coordinator(&self) -> &WatchCoordinator<G> {
        &self.coordinator
    }

    /// Closes the stream, waits for the delivery task to finish and stops
    /// the registry task.
    ///
    /// Returns how the stream ended. If it had already failed, that failure
    /// is returned rather than `Closed`.
    ///
    /// If the event receiver is alive but full and nobody reads it, the
    /// delivery task is aborted after a short wait and the terminal event is
    /// never sent.
    pub async fn close(mut self) -> Termination {
        self.coordinator.stream().close();

        let termination = match timeout(DELIVERY_SHUTDOWN_WAIT, &mut self.delivery).await {
            Ok(Ok(termination)) => termination,
            Ok(Err(e)) => Termination::Failed(Error::ChannelError {
                context: format!("delivery task ended abnormally: {e}"),
            }),
            Err(_) => {
                tracing::warn!("Event receiver is not being drained, abandoning delivery");
                self.delivery.abort();
                let _ = (&mut self.delivery).await;
                self.coordinator
                    .stream()
                    .termination()
                    .unwrap_or(Termination::Closed)
            }
        };

        self.coordinator
            .registry()
            .shutdown(REGISTRY_SHUTDOWN_WAIT)
            .await;
        termination
    }
}
