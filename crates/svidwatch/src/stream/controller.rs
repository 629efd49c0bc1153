//! Owner of the bidirectional delegated identity stream.
//!
//! [`StreamController`] holds the send half of the stream and hands out the
//! receive half once, as [`Updates`]. The two halves are independent: the
//! command flow can [`submit`](StreamController::submit) while the delivery
//! flow is parked in [`Updates::next`].

use super::{
    connect::{AgentEndpoint, connect},
    state::{StreamShared, StreamState, Termination},
    updates::{InboundStream, Updates},
};
use core::{fmt, time::Duration};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use svidwatch_core::{
    Error, Operation, Result, UpdateBatch, proto,
    proto::delegated_identity_client::DelegatedIdentityClient,
};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Cloneable handle to one delegated identity stream.
///
/// Clones share the same stream, state and update sequence.
#[derive(Clone)]
pub struct StreamController {
    outbound: mpsc::Sender<proto::WatchRequest>,
    inbound: Arc<Mutex<Option<InboundStream>>>,
    shared: Arc<StreamShared>,
}

impl StreamController {
    /// Dials `endpoint`, starts the `WatchCredentials` call and waits for the
    /// handshake sentinel.
    ///
    /// `outbound_buffer_size` bounds how many submitted operations may queue
    /// before the transport picks them up.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportFailure`] if dialing fails, the call is rejected,
    ///   or the stream ends before the first message.
    /// - [`Error::HandshakeViolation`] if the first message does not carry
    ///   subscription id 0.
    #[tracing::instrument(skip_all, fields(%endpoint))]
    pub async fn open(
        endpoint: &AgentEndpoint,
        connect_timeout: Duration,
        outbound_buffer_size: usize,
    ) -> Result<Self> {
        let channel = connect(endpoint, connect_timeout).await?;
        let mut client = DelegatedIdentityClient::new(channel);

        let shared = Arc::new(StreamShared::new());
        let (outbound, rx) = mpsc::channel(outbound_buffer_size);
        // Closing the controller ends the request stream, which half-closes
        // the call towards the agent.
        let requests =
            ReceiverStream::new(rx).take_until(shared.shutdown.clone().cancelled_owned());

        let response = match client.watch_credentials(requests).await {
            Ok(response) => response,
            Err(status) => {
                let err = Error::from(status);
                shared.fail(err.clone());
                return Err(err);
            }
        };

        Self::handshake(shared, outbound, response.into_inner().boxed()).await
    }

    /// Runs the handshake over an already opened message pair.
    ///
    /// `outbound` must feed the request half of the stream and `inbound` must
    /// yield its responses. This is what [`open`](Self::open) does after
    /// dialing; it is exposed for alternative transports.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus dialing.
    pub async fn establish<S>(outbound: mpsc::Sender<proto::WatchRequest>, inbound: S) -> Result<Self>
    where
        S: Stream<Item = core::result::Result<proto::CredentialBatch, Status>> + Send + 'static,
    {
        Self::handshake(Arc::new(StreamShared::new()), outbound, inbound.boxed()).await
    }

    async fn handshake(
        shared: Arc<StreamShared>,
        outbound: mpsc::Sender<proto::WatchRequest>,
        mut inbound: InboundStream,
    ) -> Result<Self> {
        let outcome = match inbound.next().await {
            Some(Ok(first)) => {
                let first = UpdateBatch::from(first);
                if first.is_handshake() {
                    Ok(())
                } else {
                    Err(Error::HandshakeViolation {
                        received: first.subscription_id,
                    })
                }
            }
            Some(Err(status)) => Err(Error::from(status)),
            None => Err(Error::TransportFailure {
                context: "stream ended before handshake".to_string(),
            }),
        };

        if let Err(err) = outcome {
            shared.fail(err.clone());
            return Err(err);
        }

        shared.mark_ready();
        tracing::info!("Agent acknowledged the stream");

        Ok(Self {
            outbound,
            inbound: Arc::new(Mutex::new(Some(inbound))),
            shared,
        })
    }

    /// Enqueues `op` for the agent.
    ///
    /// Returns as soon as the operation is queued; any acknowledgement from
    /// the agent arrives later through [`Updates`], or not at all.
    ///
    /// # Errors
    ///
    /// - [`Error::StreamClosed`] if the stream was closed.
    /// - The recorded failure if the stream already failed.
    /// - [`Error::TransportFailure`] if the outbound half is gone; the stream
    ///   moves to `Failed`.
    #[tracing::instrument(skip_all, fields(id = op.id()))]
    pub async fn submit(&self, op: Operation) -> Result<()> {
        if self.shared.state() != StreamState::Ready {
            return Err(self.shared.closed_error());
        }

        let request = proto::WatchRequest::from(op);
        tokio::select! {
            biased;
            () = self.shared.shutdown.cancelled() => Err(self.shared.closed_error()),
            sent = self.outbound.send(request) => sent.map_err(|_| {
                let err = Error::TransportFailure {
                    context: "outbound stream closed".to_string(),
                };
                self.shared.fail(err.clone());
                // Another flow may have recorded the failure first.
                self.shared.closed_error()
            }),
        }
    }

    /// Hands out the update sequence of this stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpdatesTaken`] on every call after the first.
    pub fn updates(&self) -> Result<Updates> {
        let inbound = self.inbound.lock().take().ok_or(Error::UpdatesTaken)?;
        Ok(Updates::new(inbound, Arc::clone(&self.shared)))
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// How the stream ended, or `None` while it is still open.
    pub fn termination(&self) -> Option<Termination> {
        self.state()
            .is_terminal()
            .then(|| self.shared.termination())
    }

    /// Subscribes to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.shared.subscribe()
    }

    /// Closes the stream.
    ///
    /// Pending [`submit`](Self::submit) calls and [`Updates::next`] waits
    /// return immediately. Closing an ended stream does nothing.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl fmt::Debug for StreamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
