use parking_lot::Mutex;
use svidwatch_core::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a delegated identity stream.
///
/// `Closed` and `Failed` are terminal: once reached, the stream instance
/// never changes state again and a new stream needs a fresh open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Dialed, waiting for the handshake sentinel.
    Connecting,
    /// Handshake observed; operations may be submitted.
    Ready,
    /// Ended cleanly, either by the agent or by the caller.
    Closed,
    /// Ended by a transport or protocol error.
    Failed,
}

impl StreamState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Why a stream's update sequence ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Closed,
    Failed(Error),
}

impl Termination {
    /// The error an operation on the ended stream reports.
    pub fn into_error(self) -> Error {
        match self {
            Self::Closed => Error::StreamClosed,
            Self::Failed(err) => err,
        }
    }
}

/// State shared between the controller, its clones and the update sequence.
#[derive(Debug)]
pub(crate) struct StreamShared {
    state: watch::Sender<StreamState>,
    failure: Mutex<Option<Error>>,
    pub(crate) shutdown: CancellationToken,
}

impl StreamShared {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(StreamState::Connecting);
        Self {
            state,
            failure: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub(crate) fn mark_ready(&self) {
        self.state.send_if_modified(|state| {
            if *state == StreamState::Connecting {
                *state = StreamState::Ready;
                true
            } else {
                false
            }
        });
    }

    /// Moves to `Failed`, recording `err`. Returns `false` if the stream had
    /// already ended, in which case `err` is dropped.
    pub(crate) fn fail(&self, err: Error) -> bool {
        let mut failure = self.failure.lock();
        let changed = self.transition(StreamState::Failed);
        if changed {
            tracing::error!("Stream failed: {err}");
            *failure = Some(err);
        }
        changed
    }

    /// Moves to `Closed`. Returns `false` if the stream had already ended.
    pub(crate) fn close(&self) -> bool {
        let changed = self.transition(StreamState::Closed);
        if changed {
            tracing::info!("Stream closed");
        }
        changed
    }

    /// The error an operation on an ended stream reports.
    pub(crate) fn closed_error(&self) -> Error {
        self.failure.lock().clone().unwrap_or(Error::StreamClosed)
    }

    pub(crate) fn termination(&self) -> Termination {
        match self.failure.lock().clone() {
            Some(err) => Termination::Failed(err),
            None => Termination::Closed,
        }
    }

    fn transition(&self, terminal: StreamState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = terminal;
                true
            }
        });
        // Unblocks pending submits and update waits, and ends the outbound
        // request stream.
        self.shutdown.cancel();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_terminal_transition_wins() {
        let shared = StreamShared::new();
        assert_eq!(shared.state(), StreamState::Connecting);
        shared.mark_ready();
        assert_eq!(shared.state(), StreamState::Ready);

        assert!(shared.fail(Error::StreamClosed));
        assert!(!shared.close());
        assert!(!shared.fail(Error::NotFound(1)));
        assert_eq!(shared.state(), StreamState::Failed);
        assert_eq!(shared.termination(), Termination::Failed(Error::StreamClosed));
        assert!(shared.shutdown.is_cancelled());
    }

    #[test]
    fn close_is_not_a_failure() {
        let shared = StreamShared::new();
        shared.mark_ready();
        assert!(shared.close());
        shared.mark_ready();
        assert_eq!(shared.state(), StreamState::Closed);
        assert_eq!(shared.termination(), Termination::Closed);
        assert_eq!(shared.closed_error(), Error::StreamClosed);
    }
}
