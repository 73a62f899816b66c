//! http-bridge — serve one virtual HTTP server over a host event link.
//!
//! The host process owns the real socket. It talks to this process over
//! stdin/stdout with newline-delimited JSON frames: registry calls go out,
//! replies and request events come in, response events go out. Logs go to
//! stderr (or a file) so stdout stays clean for the protocol.
//!
//! Usage:
//!   http-bridge --id api --address 127.0.0.1:8080                 # echo handler
//!   http-bridge --id api --address :8080 --handler static --status 204
//!   http-bridge --id api --address :8080 --log-file               # log to ~/.http-bridge/logs/bridge.log

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_host::{HostLink, HostLinkConfig};
use bridge_protocol::{HandlerError, HandlerResult, Request, Response, TEXT_PLAIN_UTF8};
use bridge_server::{Bridge, RequestHandler};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "http-bridge", about = "Serve a virtual HTTP server over a host event link")]
struct Cli {
    /// Virtual server id (also the channel request events arrive on)
    #[arg(long)]
    id: String,

    /// Bind address handed to the host runtime
    #[arg(long)]
    address: String,

    /// Built-in request handler
    #[arg(long, value_enum, default_value = "echo")]
    handler: HandlerKind,

    /// Status code for the static handler
    #[arg(long, default_value = "200")]
    status: u16,

    /// Body for the static handler
    #[arg(long, default_value = "")]
    body: String,

    /// Content type for the static handler
    #[arg(long, default_value = TEXT_PLAIN_UTF8)]
    content_type: String,

    /// Fail registry calls the host does not answer within this many milliseconds
    #[arg(long)]
    call_timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.http-bridge/logs/bridge.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HandlerKind {
    /// Reply with the request itself as JSON
    Echo,
    /// Reply with a fixed status and body
    Static,
}

/// Mirrors each request back as a JSON document.
struct EchoHandler;

impl RequestHandler for EchoHandler {
    async fn handle(&self, request: Request) -> HandlerResult {
        let body = serde_json::to_string(&request).map_err(|e| HandlerError::from_error(&e))?;
        Ok(Response::ok(body).with_header("Content-Type", "application/json; charset=utf-8"))
    }
}

/// Always replies with the same response.
struct StaticHandler {
    status: u16,
    body: String,
    content_type: String,
}

impl RequestHandler for StaticHandler {
    async fn handle(&self, _request: Request) -> HandlerResult {
        Ok(Response::new(self.status, self.body.clone())
            .with_header("Content-Type", self.content_type.clone()))
    }
}

fn init_logging(verbose: bool, log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if let Some(log_file_arg) = log_file {
        let log_path = if log_file_arg == "DEFAULT" {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
            home.join(".http-bridge/logs/bridge.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    let link = Arc::new(HostLink::stdio(HostLinkConfig {
        call_timeout: cli.call_timeout_ms.map(Duration::from_millis),
    }));
    let bridge = Arc::new(Bridge::new(link.clone(), link.clone()));

    let started = match cli.handler {
        HandlerKind::Echo => bridge.start_server(&cli.address, &cli.id, EchoHandler).await,
        HandlerKind::Static => {
            let handler = StaticHandler {
                status: cli.status,
                body: cli.body.clone(),
                content_type: cli.content_type.clone(),
            };
            bridge.start_server(&cli.address, &cli.id, handler).await
        }
    };
    let handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start server {} on {}: {}", cli.id, cli.address, e.message());
            std::process::exit(1);
        }
    };

    info!(
        "Serving {} on {} with the {:?} handler",
        handle.id(),
        handle.address(),
        cli.handler
    );

    tokio::select! {
        _ = link.closed() => {
            info!("Host closed the link");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Shutting down...");
        }
    }

    if link.is_connected() {
        match handle.close().await {
            Ok(_) => info!("Server {} stopped", handle.id()),
            Err(e) => error!("Failed to stop server {}: {e}", handle.id()),
        }
    } else {
        warn!(
            "Host link is gone; skipping StopServer for {} (running: {:?})",
            handle.id(),
            bridge.running_servers()
        );
    }

    // The stdin reader blocks on a thread that cannot be cancelled.
    std::process::exit(0);
}
