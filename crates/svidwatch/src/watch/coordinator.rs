//! Caller intents: adding and removing watches.
//!
//! Registry state is a client-side record of intent, not confirmed agent
//! state. An `Add` that fails to submit stays registered; a `Remove` drops
//! the entry even if the agent never hears about it.

use super::{
    delivery::run_delivery_loop,
    event::WatchEvent,
    id::{IdGenerator, RandomIdGenerator},
};
use crate::{
    registry::RegistryHandle,
    stream::{StreamController, Termination, Updates},
    telemetry::{increment_watches_added, increment_watches_removed},
};
use svidwatch_core::{
    Error, HANDSHAKE_ID, Operation, Result, Selector, SelectorSet, SubscriptionId,
};
use tokio::sync::mpsc;

/// Orchestrates the registry and the stream controller.
#[derive(Debug)]
pub struct WatchCoordinator<G = RandomIdGenerator> {
    stream: StreamController,
    registry: RegistryHandle,
    ids: G,
}

impl WatchCoordinator {
    pub fn new(stream: StreamController, registry: RegistryHandle) -> Self {
        Self::with_id_generator(stream, registry, RandomIdGenerator)
    }
}

impl<G: IdGenerator> WatchCoordinator<G> {
    pub const fn with_id_generator(stream: StreamController, registry: RegistryHandle, ids: G) -> Self {
        Self {
            stream,
            registry,
            ids,
        }
    }

    /// Parses `selector` and starts a watch over it.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedSelector`] if `selector` is not `type:value`;
    ///   nothing is registered or sent.
    /// - Everything [`add_watch_selectors`](Self::add_watch_selectors)
    ///   returns.
    pub async fn add_watch(&self, selector: &str) -> Result<SubscriptionId> {
        let selector: Selector = selector.parse()?;
        self.add_watch_selectors(selector.into()).await
    }

    /// Starts one watch over all of `selectors`.
    ///
    /// A fresh id is registered first and then submitted, so an update for
    /// the new watch can never arrive before the id resolves.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `selectors` is empty or the generator
    ///   produced the reserved handshake id.
    /// - [`Error::StreamClosed`] or the recorded failure if the stream already
    ///   ended; nothing is registered.
    /// - [`Error::DuplicateId`] if the generated id is already in use.
    /// - Any submission error. The registry entry is kept in that case.
    #[tracing::instrument(skip_all, fields(selectors = %selectors))]
    pub async fn add_watch_selectors(&self, selectors: SelectorSet) -> Result<SubscriptionId> {
        if selectors.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "a watch needs at least one selector".to_string(),
            });
        }

        // Subscriptions die with their stream; do not record one on a stream
        // that already ended.
        if let Some(termination) = self.stream.termination() {
            return Err(termination.into_error());
        }

        let id = self.ids.next_id();
        if id == HANDSHAKE_ID {
            return Err(Error::InvalidRequest {
                reason: format!("subscription id {HANDSHAKE_ID} is reserved"),
            });
        }

        self.registry.insert(id, selectors.clone()).await?;

        if let Err(e) = self.stream.submit(Operation::Add { id, selectors }).await {
            tracing::warn!("Submitting subscription {id} failed, keeping it registered: {e}");
            return Err(e);
        }

        increment_watches_added();
        tracing::info!("Added subscription {id}");
        Ok(id)
    }

    /// Stops the watch `id` and returns the selectors it covered.
    ///
    /// `Remove` is submitted whether or not `id` is registered, and the
    /// registry entry is dropped whether or not the submission succeeds.
    ///
    /// # Errors
    ///
    /// - The submission error, if any.
    /// - Otherwise [`Error::NotFound`] if `id` was not registered. This is
    ///   informational; the stream and the delivery loop carry on.
    #[tracing::instrument(skip(self))]
    pub async fn remove_watch(&self, id: SubscriptionId) -> Result<SelectorSet> {
        let submitted = self.stream.submit(Operation::Remove { id }).await;
        let removed = self.registry.remove(id).await;

        if let Err(e) = submitted {
            tracing::warn!("Submitting removal of subscription {id} failed: {e}");
            return Err(e);
        }

        match removed {
            Ok(selectors) => {
                increment_watches_removed();
                tracing::info!("Removed subscription {id}");
                Ok(selectors)
            }
            Err(e) => {
                tracing::warn!("Removal requested for unknown subscription {id}");
                Err(e)
            }
        }
    }

    /// The registered watches, sorted by id.
    pub async fn watches(&self) -> Result<Vec<(SubscriptionId, SelectorSet)>> {
        self.registry.snapshot().await
    }

    /// Drains `updates` into `events` until the stream ends.
    ///
    /// See [`run_delivery_loop`].
    pub async fn run_delivery_loop(
        &self,
        updates: Updates,
        events: mpsc::Sender<WatchEvent>,
    ) -> Termination {
        run_delivery_loop(updates, self.registry.clone(), events).await
    }

    pub const fn stream(&self) -> &StreamController {
        &self.stream
    }

    pub const fn registry(&self) -> &RegistryHandle {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{stream::StreamState, watch::WatchTarget};
    use svidwatch_core::CredentialRecord;
    use std::sync::atomic::{AtomicU64, Ordering};
    use svidwatch_core::proto::{self, watch_request::Operation as WireOperation};
    use tokio_stream::wrappers::ReceiverStream;
    use tonic::Status;

    struct Harness<G> {
        coordinator: WatchCoordinator<G>,
        requests: mpsc::Receiver<proto::WatchRequest>,
        _inbound: mpsc::Sender<core::result::Result<proto::CredentialBatch, Status>>,
    }

    async fn harness<G: IdGenerator>(ids: G) -> Harness<G> {
        let (outbound, requests) = mpsc::channel(8);
        let (inbound, rx) = mpsc::channel(8);
        inbound
            .send(Ok(proto::CredentialBatch {
                subscription_id: 0,
                credentials: Vec::new(),
            }))
            .await
            .unwrap();
        let stream = StreamController::establish(outbound, ReceiverStream::new(rx))
            .await
            .unwrap();
        Harness {
            coordinator: WatchCoordinator::with_id_generator(stream, RegistryHandle::spawn(8), ids),
            requests,
            _inbound: inbound,
        }
    }

    fn sequential_ids(start: u64) -> impl Fn() -> u64 + Send + Sync {
        let next = AtomicU64::new(start);
        move || next.fetch_add(1, Ordering::Relaxed)
    }

    #[tokio::test]
    async fn add_registers_then_submits() -> Result<()> {
        let mut h = harness(|| 42_u64).await;

        let id = h.coordinator.add_watch("unix:uid:1000").await?;
        assert_eq!(id, 42);

        let request = h.requests.recv().await.unwrap();
        assert_eq!(request.operation(), WireOperation::Add);
        assert_eq!(request.id, 42);
        assert_eq!(request.selectors.len(), 1);
        assert_eq!(request.selectors[0].r#type, "unix");
        assert_eq!(request.selectors[0].value, "uid:1000");

        let expected: SelectorSet = "unix:uid:1000".parse::<Selector>()?.into();
        assert_eq!(h.coordinator.registry().lookup(42).await?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_selector_sends_nothing() {
        let mut h = harness(|| 42_u64).await;

        assert!(matches!(
            h.coordinator.add_watch("uid1000").await,
            Err(Error::MalformedSelector { .. })
        ));
        assert!(h.requests.try_recv().is_err());
        assert!(h.coordinator.watches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn colliding_id_is_rejected() -> Result<()> {
        let mut h = harness(|| 5_u64).await;

        h.coordinator.add_watch("unix:uid:1").await?;
        assert_eq!(
            h.coordinator.add_watch("unix:uid:2").await,
            Err(Error::DuplicateId(5))
        );

        // Only the first add reached the wire, and the first entry survived.
        assert_eq!(h.requests.recv().await.unwrap().id, 5);
        assert!(h.requests.try_recv().is_err());
        let expected: SelectorSet = "unix:uid:1".parse::<Selector>()?.into();
        assert_eq!(h.coordinator.registry().lookup(5).await?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn reserved_and_empty_requests_are_rejected() {
        let h = harness(|| 0_u64).await;
        assert!(matches!(
            h.coordinator.add_watch("unix:uid:1").await,
            Err(Error::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.coordinator.add_watch_selectors(SelectorSet::new()).await,
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn multi_selector_watch_is_one_subscription() -> Result<()> {
        let mut h = harness(sequential_ids(100)).await;
        let selectors: SelectorSet = ["unix:uid:1000", "unix:gid:1000"]
            .into_iter()
            .map(str::parse::<Selector>)
            .collect::<Result<_>>()?;

        let id = h.coordinator.add_watch_selectors(selectors.clone()).await?;
        assert_eq!(id, 100);

        let request = h.requests.recv().await.unwrap();
        assert_eq!(request.selectors.len(), 2);
        assert_eq!(h.coordinator.watches().await?, vec![(100, selectors)]);
        Ok(())
    }

    #[tokio::test]
    async fn remove_submits_and_forgets() -> Result<()> {
        let mut h = harness(|| 42_u64).await;
        h.coordinator.add_watch("unix:uid:1000").await?;
        let _add = h.requests.recv().await.unwrap();

        let removed = h.coordinator.remove_watch(42).await?;
        assert_eq!(removed.to_string(), "unix:uid:1000");

        let request = h.requests.recv().await.unwrap();
        assert_eq!(request.operation(), WireOperation::Remove);
        assert_eq!(request.id, 42);
        assert!(h.coordinator.watches().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn removing_unknown_id_is_reported_not_fatal() -> Result<()> {
        let mut h = harness(sequential_ids(1)).await;

        assert_eq!(
            h.coordinator.remove_watch(77).await,
            Err(Error::NotFound(77))
        );
        // The removal still went out and the stream is unaffected.
        assert_eq!(h.requests.recv().await.unwrap().id, 77);
        assert_eq!(h.coordinator.stream().state(), StreamState::Ready);
        assert_eq!(h.coordinator.add_watch("unix:uid:1").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_submission_keeps_the_registry_entry() -> Result<()> {
        let h = harness(|| 9_u64).await;
        let Harness {
            coordinator,
            requests,
            _inbound,
        } = h;
        drop(requests);

        assert!(matches!(
            coordinator.add_watch("unix:uid:1000").await,
            Err(Error::TransportFailure { .. })
        ));
        assert_eq!(coordinator.watches().await?.len(), 1);

        // Removal still forgets the entry locally.
        assert!(matches!(
            coordinator.remove_watch(9).await,
            Err(Error::TransportFailure { .. })
        ));
        assert!(coordinator.watches().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn add_on_an_ended_stream_registers_nothing() {
        let mut h = harness(|| 3_u64).await;
        h.coordinator.stream().close();

        assert_eq!(
            h.coordinator.add_watch("unix:uid:1000").await,
            Err(Error::StreamClosed)
        );
        assert!(h.coordinator.watches().await.unwrap().is_empty());
        assert!(h.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_resolves_added_watches() -> Result<()> {
        let Harness {
            coordinator,
            mut requests,
            _inbound: inbound,
        } = harness(|| 42_u64).await;

        let id = coordinator.add_watch("unix:uid:1000").await?;
        assert_eq!(requests.recv().await.unwrap().id, id);

        inbound
            .send(Ok(proto::CredentialBatch {
                subscription_id: id,
                credentials: vec![proto::CredentialRecord {
                    identity: "spiffe://example.org/workload".to_string(),
                    not_after: 1_893_456_000,
                }],
            }))
            .await
            .unwrap();
        drop(inbound);

        let (events, mut rx) = mpsc::channel(4);
        let updates = coordinator.stream().updates()?;
        assert_eq!(
            coordinator.run_delivery_loop(updates, events).await,
            Termination::Closed
        );

        assert_eq!(
            rx.recv().await,
            Some(WatchEvent::Update {
                target: WatchTarget::Resolved {
                    id,
                    selectors: "unix:uid:1000".parse::<Selector>()?.into(),
                },
                credentials: vec![CredentialRecord::new(
                    "spiffe://example.org/workload",
                    1_893_456_000
                )],
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(WatchEvent::Terminated(Termination::Closed))
        );
        assert!(coordinator.watches().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn default_generator_never_hands_out_the_handshake_id() -> Result<()> {
        let h = harness(RandomIdGenerator).await;
        let coordinator = WatchCoordinator::new(
            h.coordinator.stream().clone(),
            h.coordinator.registry().clone(),
        );

        for _ in 0..4 {
            assert_ne!(coordinator.add_watch("unix:uid:1000").await?, HANDSHAKE_ID);
        }
        assert_eq!(coordinator.watches().await?.len(), 4);
        Ok(())
    }
}
