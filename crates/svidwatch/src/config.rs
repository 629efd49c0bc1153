use crate::stream::AgentEndpoint;
use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use svidwatch_core::Selector;

/// Default socket of the agent's delegated identity API.
pub const DEFAULT_ENDPOINT: &str = "/tmp/admin.sock";

/// Runtime configuration for the `svidwatch` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for a local agent.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "svidwatch",
    version,
    about = "Watch delegated X.509 identities over a single agent stream"
)]
pub struct CliArgs {
    /// Where the agent listens: a Unix socket path (optionally prefixed with
    /// `unix:`) or an `http://host:port` URI.
    ///
    /// Environment variable: `SVIDWATCH_ENDPOINT`
    #[arg(long, env = "SVIDWATCH_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// How long to wait for the transport connection, in milliseconds.
    ///
    /// The handshake itself has no deadline of its own.
    ///
    /// Environment variable: `SVIDWATCH_CONNECT_TIMEOUT_MS`
    #[arg(long, env = "SVIDWATCH_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Number of add/remove operations that may queue before the transport
    /// picks them up. Submitting beyond this waits.
    ///
    /// Environment variable: `SVIDWATCH_OUTBOUND_BUFFER`
    #[arg(long, env = "SVIDWATCH_OUTBOUND_BUFFER", default_value_t = 32)]
    pub outbound_buffer_size: usize,

    /// Number of delivered events buffered for the caller before the
    /// delivery loop stops reading from the stream.
    ///
    /// Environment variable: `SVIDWATCH_EVENT_BUFFER`
    #[arg(long, env = "SVIDWATCH_EVENT_BUFFER", default_value_t = 64)]
    pub event_buffer_size: usize,

    /// Capacity of the registry task's request queue.
    ///
    /// Environment variable: `SVIDWATCH_REGISTRY_BUFFER`
    #[arg(long, env = "SVIDWATCH_REGISTRY_BUFFER", default_value_t = 64)]
    pub registry_buffer_size: usize,

    /// Selector to watch as soon as the stream is ready, e.g.
    /// `unix:uid:1000`. Repeat the flag for several independent watches.
    ///
    /// Environment variable: `SVIDWATCH_WATCH` (a single selector)
    #[arg(short, long = "watch", env = "SVIDWATCH_WATCH")]
    pub watches: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: AgentEndpoint,
    pub connect_timeout: Duration,
    pub outbound_buffer_size: usize,
    pub event_buffer_size: usize,
    pub registry_buffer_size: usize,
    pub initial_watches: Vec<Selector>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: AgentEndpoint::Unix(DEFAULT_ENDPOINT.into()),
            connect_timeout: Duration::from_secs(5),
            outbound_buffer_size: 32,
            event_buffer_size: 64,
            registry_buffer_size: 64,
            initial_watches: Vec::new(),
        }
    }
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.connect_timeout_ms == 0 {
            bail!("SVIDWATCH_CONNECT_TIMEOUT_MS must be greater than 0");
        }

        for (name, value) in [
            ("SVIDWATCH_OUTBOUND_BUFFER", args.outbound_buffer_size),
            ("SVIDWATCH_EVENT_BUFFER", args.event_buffer_size),
            ("SVIDWATCH_REGISTRY_BUFFER", args.registry_buffer_size),
        ] {
            // tokio's bounded channels panic on a zero capacity.
            if value == 0 {
                bail!("{name} must be greater than 0");
            }
        }

        let endpoint = args
            .endpoint
            .parse::<AgentEndpoint>()
            .context("invalid SVIDWATCH_ENDPOINT")?;

        let initial_watches = args
            .watches
            .iter()
            .map(|text| text.parse::<Selector>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --watch selector")?;

        Ok(Self {
            endpoint,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            outbound_buffer_size: args.outbound_buffer_size,
            event_buffer_size: args.event_buffer_size,
            registry_buffer_size: args.registry_buffer_size,
            initial_watches,
        })
    }
}
