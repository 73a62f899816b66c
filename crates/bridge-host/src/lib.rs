//! Host Link — connects the bridge to the process that owns the sockets.
//!
//! The host speaks newline-delimited JSON frames over a byte stream
//! (stdin/stdout for the `http-bridge` binary). One link carries both
//! concerns the bridge needs from the outside world:
//! - registry calls (`StartServer`, `StopServer`, `ListServer`), correlated
//!   with their replies by numeric call id;
//! - named events, delivered inbound into local subscriptions and published
//!   outbound for every response.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bridge_protocol::{CallId, HostFrame, Methods, RegistryError, RegistryReply};
use bridge_server::ServerRuntime;
use bridge_transport::{EventBus, EventTransport, Subscription};
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Configuration for the host link.
#[derive(Debug, Clone, Default)]
pub struct HostLinkConfig {
    /// Give up on a registry call after this long (`None` waits forever)
    pub call_timeout: Option<Duration>,
}

type PendingCalls = Arc<DashMap<CallId, oneshot::Sender<RegistryReply>>>;

/// A live link to the host process.
pub struct HostLink {
    /// Local subscriptions fed by inbound events
    bus: EventBus,
    /// Frames waiting for the writer task
    outbound: mpsc::UnboundedSender<HostFrame>,
    /// Registry calls awaiting a reply
    pending: PendingCalls,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    closed_rx: watch::Receiver<bool>,
    config: HostLinkConfig,
}

impl HostLink {
    /// Start the reader and writer tasks over the given stream halves.
    pub fn connect<R, W>(reader: R, writer: W, config: HostLinkConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let bus = EventBus::new();
        let pending: PendingCalls = Arc::new(DashMap::new());
        let connected = Arc::new(AtomicBool::new(true));
        let (closed_tx, closed_rx) = watch::channel(false);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_frames(writer, outbound_rx));
        tokio::spawn(read_frames(
            reader,
            bus.clone(),
            pending.clone(),
            connected.clone(),
            closed_tx,
        ));

        info!("Host link connected");
        Self {
            bus,
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            connected,
            closed_rx,
            config,
        }
    }

    /// Link over this process's stdin and stdout.
    pub fn stdio(config: HostLinkConfig) -> Self {
        Self::connect(tokio::io::stdin(), tokio::io::stdout(), config)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Resolves once the host closes its end of the stream.
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Number of registry calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Send a registry call to the host and wait for its reply.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<RegistryReply, RegistryError> {
        if !self.is_connected() {
            return Err(link_closed());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, reply_tx);

        // The reader clears `pending` after flagging disconnect; re-check so a
        // call registered after the sweep cannot wait forever.
        if !self.is_connected() || self.outbound.send(HostFrame::call(id, method, params)).is_err() {
            self.pending.remove(&id);
            return Err(link_closed());
        }
        debug!("Host call {id}: {method}");

        let reply = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.remove(&id);
                    return Err(RegistryError::new(format!(
                        "{method} timed out after {}ms",
                        limit.as_millis()
                    )));
                }
            },
            None => reply_rx.await,
        };

        reply.map_err(|_| link_closed())
    }
}

impl ServerRuntime for HostLink {
    async fn start_server(&self, address: &str, id: &str) -> Result<RegistryReply, RegistryError> {
        self.call(Methods::START_SERVER, vec![json!(address), json!(id)]).await
    }

    async fn stop_server(&self, id: &str) -> Result<RegistryReply, RegistryError> {
        self.call(Methods::STOP_SERVER, vec![json!(id)]).await
    }

    async fn list_server(&self) -> Result<RegistryReply, RegistryError> {
        self.call(Methods::LIST_SERVER, Vec::new()).await
    }
}

impl EventTransport for HostLink {
    fn subscribe(&self, name: &str) -> Subscription {
        self.bus.subscribe(name)
    }

    fn unsubscribe(&self, name: &str) {
        self.bus.unsubscribe(name);
    }

    /// Every publish goes out to the host.
    fn publish(&self, name: &str, data: Value) -> bool {
        self.outbound.send(HostFrame::event(name, data)).is_ok()
    }
}

fn link_closed() -> RegistryError {
    RegistryError::new("host link closed")
}

// ─────────────────────────────────────────────────────────────────────────────
// I/O tasks
// ─────────────────────────────────────────────────────────────────────────────

async fn write_frames<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<HostFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let line = match frame.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode host frame: {e}");
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Host link write failed: {e}");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!("Host link flush failed: {e}");
            break;
        }
    }
    debug!("Host link writer ended");
}

async fn read_frames<R>(
    reader: R,
    bus: EventBus,
    pending: PendingCalls,
    connected: Arc<AtomicBool>,
    closed_tx: watch::Sender<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Host link read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match HostFrame::from_line(&line) {
            Ok(HostFrame::Event { name, data }) => {
                if !bus.publish(&name, data) {
                    debug!("No subscriber for host event {name}");
                }
            }
            Ok(HostFrame::Reply { id, result }) => match pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(result);
                }
                None => debug!("Reply for unknown host call {id}"),
            },
            Ok(HostFrame::Call { id, method, .. }) => {
                warn!("Ignoring call frame from host ({id}: {method})");
            }
            Err(_e) => {
                debug!("Non-protocol line from host: {line}");
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    // Dropping the senders fails every waiting call.
    pending.clear();
    let _ = closed_tx.send(true);
    warn!("Host link closed");
}
