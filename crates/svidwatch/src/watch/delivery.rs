use super::event::{WatchEvent, WatchTarget};
use crate::{
    registry::RegistryHandle,
    stream::{Termination, Updates},
    telemetry::{
        increment_stream_failures, increment_updates_delivered, increment_updates_unresolved,
        record_credentials_per_batch,
    },
};
use svidwatch_core::{Error, UpdateBatch};
use tokio::sync::mpsc;

/// The delivery flow: the single consumer of a stream's [`Updates`].
///
/// Every batch is resolved against the registry and forwarded to `events` as
/// a [`WatchEvent::Update`], credentials in server order. A batch whose id is
/// not registered is still forwarded, as [`WatchTarget::Unresolved`].
///
/// The loop returns only once `updates` is exhausted. It then clears the
/// registry, since no subscription outlives its stream, sends exactly one
/// [`WatchEvent::Terminated`] and returns the same [`Termination`]. Nothing
/// is retried.
///
/// If the receiving end of `events` goes away the loop keeps draining the
/// stream so that the agent is never left blocked on a full window. If the
/// stream is closed while an update waits for room in `events`, that update
/// is dropped.
pub async fn run_delivery_loop(
    mut updates: Updates,
    registry: RegistryHandle,
    events: mpsc::Sender<WatchEvent>,
) -> Termination {
    tracing::debug!("Delivery loop started");

    let mut listening = true;

    while let Some(batch) = updates.next().await {
        let event = resolve(&registry, batch).await;
        if !listening {
            continue;
        }
        tokio::select! {
            biased;
            () = updates.cancelled() => {
                tracing::debug!("Stream closed while the event receiver was full, dropping update");
            }
            sent = events.send(event) => {
                if sent.is_err() {
                    tracing::debug!("Event receiver dropped, draining remaining updates");
                    listening = false;
                }
            }
        }
    }

    let termination = updates.termination().unwrap_or(Termination::Closed);
    match &termination {
        Termination::Closed => tracing::info!("Update stream closed"),
        Termination::Failed(e) => {
            increment_stream_failures();
            tracing::error!("Update stream failed: {e}");
        }
    }

    match registry.clear().await {
        Ok(dropped) if dropped > 0 => {
            tracing::info!("Dropped {dropped} subscriptions with the stream");
        }
        Ok(_) => {}
        Err(_e) => tracing::debug!("Registry already gone: {_e}"),
    }

    if listening
        && events
            .send(WatchEvent::Terminated(termination.clone()))
            .await
            .is_err()
    {
        tracing::debug!("Event receiver dropped before termination");
    }

    termination
}

async fn resolve(registry: &RegistryHandle, batch: UpdateBatch) -> WatchEvent {
    let UpdateBatch {
        subscription_id: id,
        credentials,
    } = batch;

    increment_updates_delivered();
    record_credentials_per_batch(credentials.len() as u64);

    let target = match registry.lookup(id).await {
        Ok(selectors) => {
            tracing::debug!("Update for subscription {id} ({selectors})");
            WatchTarget::Resolved { id, selectors }
        }
        Err(Error::NotFound(_)) => {
            increment_updates_unresolved();
            tracing::warn!("Update for unknown subscription {id}");
            WatchTarget::Unresolved { id }
        }
        Err(e) => {
            increment_updates_unresolved();
            tracing::warn!("Could not resolve subscription {id}: {e}");
            WatchTarget::Unresolved { id }
        }
    };

    WatchEvent::Update {
        target,
        credentials,
    }
}
