//! Transport dialing.
//!
//! The agent is normally reached over a Unix domain socket. Plain HTTP/2 over
//! TCP is accepted as well, which is convenient for local testing. TLS and
//! channel authentication are left to whatever sits beneath the socket.

use core::{fmt, str::FromStr, time::Duration};
use std::path::PathBuf;
use svidwatch_core::{Error, Result};
use tonic::transport::{Channel, Endpoint};

/// Where the delegated identity agent listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEndpoint {
    /// Path of a Unix domain socket. Accepts a bare path, `unix:<path>` or
    /// `unix://<path>`.
    Unix(PathBuf),
    /// `http://host:port` URI.
    Http(String),
}

impl FromStr for AgentEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        if s.starts_with("https://") {
            return Err(invalid("TLS is not handled by this client"));
        }

        if s.starts_with("http://") {
            s.parse::<tonic::transport::Uri>()
                .map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::Http(s.to_string()));
        }

        let path = s
            .strip_prefix("unix://")
            .or_else(|| s.strip_prefix("unix:"))
            .unwrap_or(s);
        if path.is_empty() {
            return Err(invalid("socket path is empty"));
        }
        Ok(Self::Unix(PathBuf::from(path)))
    }
}

impl fmt::Display for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Http(uri) => f.write_str(uri),
        }
    }
}

/// Dials `endpoint` and returns a connected channel.
///
/// # Errors
///
/// Returns [`Error::TransportFailure`] if the connection cannot be made
/// within `connect_timeout`.
pub async fn connect(endpoint: &AgentEndpoint, connect_timeout: Duration) -> Result<Channel> {
    tracing::debug!("Dialing agent at {endpoint}");

    match endpoint {
        AgentEndpoint::Http(uri) => Ok(Endpoint::from_shared(uri.clone())?
            .connect_timeout(connect_timeout)
            .connect()
            .await?),
        #[cfg(unix)]
        AgentEndpoint::Unix(path) => {
            use hyper_util::rt::TokioIo;
            use tokio::net::UnixStream;
            use tonic::transport::Uri;
            use tower::service_fn;

            let path = path.clone();
            // The authority is never resolved; the connector below decides
            // where the bytes go.
            let channel = Endpoint::from_static("http://[::]:50051")
                .connect_timeout(connect_timeout)
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move { UnixStream::connect(path).await.map(TokioIo::new) }
                }))
                .await?;
            Ok(channel)
        }
        #[cfg(not(unix))]
        AgentEndpoint::Unix(_) => Err(Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "Unix domain sockets are not supported on this platform".to_string(),
        }),
    }
}
