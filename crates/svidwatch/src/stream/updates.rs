use super::state::{StreamShared, Termination};
use futures::{Stream, StreamExt, stream::BoxStream};
use std::sync::Arc;
use svidwatch_core::{UpdateBatch, proto};
use tonic::Status;

pub(crate) type InboundStream = BoxStream<'static, Result<proto::CredentialBatch, Status>>;

/// Lazy, unbounded sequence of update batches pushed by the agent.
///
/// Each call to [`next`](Self::next) waits until a batch arrives or the
/// stream ends. The sequence ends exactly once, when:
///
/// - the agent finishes the stream (state becomes `Closed`),
/// - the transport reports an error (state becomes `Failed`), or
/// - the controller is closed by the caller.
///
/// After that, `next` keeps returning `None` and
/// [`termination`](Self::termination) reports why. The sequence cannot be
/// restarted; a new stream needs a fresh open.
pub struct Updates {
    inbound: InboundStream,
    shared: Arc<StreamShared>,
    done: bool,
}

impl Updates {
    pub(crate) fn new(inbound: InboundStream, shared: Arc<StreamShared>) -> Self {
        Self {
            inbound,
            shared,
            done: false,
        }
    }

    /// Waits for the next batch, or returns `None` once the stream ended.
    pub async fn next(&mut self) -> Option<UpdateBatch> {
        if self.done {
            return None;
        }

        let item = tokio::select! {
            biased;
            () = self.shared.shutdown.cancelled() => None,
            item = self.inbound.next() => item,
        };

        match item {
            Some(Ok(batch)) => Some(batch.into()),
            Some(Err(status)) => {
                self.done = true;
                self.shared.fail(status.into());
                None
            }
            None => {
                self.done = true;
                self.shared.close();
                None
            }
        }
    }

    /// Resolves once the stream has ended or been closed.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        async move { shared.shutdown.cancelled().await }
    }

    /// Why the sequence ended, or `None` while it is still live.
    pub fn termination(&self) -> Option<Termination> {
        self.done.then(|| self.shared.termination())
    }

    /// Adapts the sequence into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = UpdateBatch> + Send + 'static {
        futures::stream::unfold(self, |mut updates| async move {
            updates.next().await.map(|batch| (batch, updates))
        })
    }
}
