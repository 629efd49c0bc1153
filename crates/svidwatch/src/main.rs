use anyhow::Context;
use clap::Parser;
use svidwatch::{
    command::Command,
    config::{CliArgs, ClientConfig},
    render::{render_event, render_watches},
    stream::Termination,
    telemetry::init_telemetry,
    watch::{WatchEvent, WatchSession},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    sync::oneshot,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let res = run(config).await;
    providers.shutdown();
    res
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        tracing::info!("Connecting with full config: {:#?}", config);
    } else {
        tracing::info!(endpoint = %config.endpoint, "Connecting to agent");
    }

    let (session, mut events) = WatchSession::open(&config)
        .await
        .with_context(|| format!("failed to open a stream to {}", config.endpoint))?;
    tracing::info!("Stream ready");

    for selector in &config.initial_watches {
        match session.add_watch_selectors(selector.clone().into()).await {
            Ok(id) => println!("Watching {selector} with id {id}"),
            Err(e) => eprintln!("Failed to watch {selector}: {e}"),
        }
    }

    let (terminated_tx, mut terminated_rx) = oneshot::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print!("{}", render_event(&event));
            if let WatchEvent::Terminated(termination) = event {
                let _ = terminated_tx.send(termination);
                break;
            }
        }
    });

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = &mut terminated_rx => {
                tracing::warn!("Stream ended, exiting");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_line(&session, &line).await {
                        break;
                    }
                }
                // Keep watching until a signal arrives or the stream ends.
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    let termination = session.close().await;
    if let Err(e) = printer.await {
        tracing::error!("Printer task ended abnormally: {e}");
    }

    match termination {
        Termination::Closed => {
            tracing::info!("Stream closed");
            Ok(())
        }
        Termination::Failed(e) => Err(anyhow::Error::new(e).context("stream failed")),
    }
}

/// Runs one stdin command. Returns `false` when the caller asked to quit.
async fn handle_line(session: &WatchSession, line: &str) -> bool {
    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return true;
        }
    };

    match command {
        Command::Empty => {}
        Command::Add(selectors) => match session.add_watch_selectors(selectors).await {
            Ok(id) => println!("Added watch {id}"),
            Err(e) => eprintln!("Failed to add watch: {e}"),
        },
        Command::Remove(id) => match session.remove_watch(id).await {
            Ok(selectors) => println!("Removed watch {id} ({selectors})"),
            Err(e) => eprintln!("Failed to remove watch {id}: {e}"),
        },
        Command::List => match session.watches().await {
            Ok(watches) => print!("{}", render_watches(&watches)),
            Err(e) => eprintln!("Failed to list watches: {e}"),
        },
        Command::Quit => return false,
    }
    true
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
