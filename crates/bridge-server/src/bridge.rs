//! Request/Response Bridge — owns one event subscription per running server
//! and answers every delivered request exactly once.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bridge_protocol::{HandlerError, RawRequest, RegistryError, Response};
use bridge_transport::{EventTransport, Subscription};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handler::RequestHandler;
use crate::registry::{RegistryHandle, ServerRuntime};

/// Lifecycle of a virtual server registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unregistered,
    Starting,
    Running,
    Stopping,
}

struct Registration {
    address: String,
    /// Subscription loop of the confirmed registration. Dropping the handle
    /// detaches it; the loop ends on its own when the subscription is
    /// removed or replaced.
    task: Option<JoinHandle<()>>,
    /// In-flight registry calls for this id.
    starting: usize,
    stopping: usize,
}

impl Registration {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            task: None,
            starting: 0,
            stopping: 0,
        }
    }

    fn state(&self) -> ServerState {
        if self.starting > 0 {
            ServerState::Starting
        } else if self.stopping > 0 {
            ServerState::Stopping
        } else if self.task.is_some() {
            ServerState::Running
        } else {
            ServerState::Unregistered
        }
    }

    fn is_idle(&self) -> bool {
        self.state() == ServerState::Unregistered
    }
}

/// Bridges virtual HTTP servers onto an event transport.
///
/// The subscription table is the only shared mutable state. Transport
/// subscribe/unsubscribe for an id always happens under the table lock, so
/// concurrent start/stop calls for the same id replace rather than leak.
/// Each registration counts its in-flight registry calls, and a call that
/// fails only withdraws its own count, never another call's outcome.
pub struct Bridge<R: ServerRuntime, T: EventTransport> {
    registry: RegistryHandle<R>,
    transport: Arc<T>,
    servers: Mutex<HashMap<String, Registration>>,
}

impl<R: ServerRuntime, T: EventTransport> Bridge<R, T> {
    pub fn new(runtime: R, transport: Arc<T>) -> Self {
        Self {
            registry: RegistryHandle::new(runtime),
            transport,
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &RegistryHandle<R> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Start a virtual server and route its request events to `handler`.
    ///
    /// Starting an id that is already running replaces its handler. If the
    /// runtime refuses, a fresh registration is forgotten and an existing one
    /// keeps its previous subscription.
    pub async fn start_server<H: RequestHandler>(
        self: &Arc<Self>,
        address: &str,
        id: &str,
        handler: H,
    ) -> Result<ServerHandle<R, T>, RegistryError> {
        self.servers
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Registration::new(address))
            .starting += 1;

        let data = match self.registry.start(address, id).await {
            Ok(data) => data,
            Err(err) => {
                self.settle(id, |reg| reg.starting = reg.starting.saturating_sub(1));
                warn!("StartServer failed for {id} on {address}: {}", err.message());
                return Err(err);
            }
        };

        let handler = Arc::new(handler);
        {
            let mut servers = self.servers.lock();
            let subscription = self.transport.subscribe(id);
            let task = tokio::spawn(serve(
                id.to_string(),
                subscription,
                handler,
                self.transport.clone(),
            ));

            let reg = servers
                .entry(id.to_string())
                .or_insert_with(|| Registration::new(address));
            reg.address = address.to_string();
            reg.task = Some(task);
            reg.starting = reg.starting.saturating_sub(1);
        }

        info!("Server started: {id} on {address}");
        debug!("StartServer payload for {id}: {data}");

        Ok(ServerHandle {
            id: id.to_string(),
            address: address.to_string(),
            bridge: self.clone(),
        })
    }

    /// Stop a virtual server. On success the subscription for `id` is
    /// removed whether or not one existed; on failure the server keeps
    /// running.
    pub async fn stop_server(&self, id: &str) -> Result<Value, RegistryError> {
        if let Some(reg) = self.servers.lock().get_mut(id) {
            reg.stopping += 1;
        }

        match self.registry.stop(id).await {
            Ok(data) => {
                {
                    let mut servers = self.servers.lock();
                    self.transport.unsubscribe(id);
                    if let Some(reg) = servers.get_mut(id) {
                        reg.task = None;
                        reg.stopping = reg.stopping.saturating_sub(1);
                        if reg.is_idle() {
                            servers.remove(id);
                        }
                    }
                }
                info!("Server stopped: {id}");
                Ok(data)
            }
            Err(err) => {
                self.settle(id, |reg| reg.stopping = reg.stopping.saturating_sub(1));
                warn!("StopServer failed for {id}: {}", err.message());
                Err(err)
            }
        }
    }

    /// Withdraw a finished call from the registration for `id`, dropping the
    /// entry once nothing is running or pending.
    fn settle(&self, id: &str, update: impl FnOnce(&mut Registration)) {
        let mut servers = self.servers.lock();
        if let Some(reg) = servers.get_mut(id) {
            update(reg);
            if reg.is_idle() {
                servers.remove(id);
            }
        }
    }

    /// Ids of every server the runtime reports as active.
    pub async fn list_servers(&self) -> Result<Vec<String>, RegistryError> {
        self.registry.list().await
    }

    /// Stop every server this bridge started. Failures are logged, not returned.
    pub async fn stop_all(&self) {
        for id in self.running_servers() {
            if let Err(e) = self.stop_server(&id).await {
                error!("Failed to stop server {id} during shutdown: {e}");
            }
        }
    }

    pub fn state(&self, id: &str) -> ServerState {
        self.servers
            .lock()
            .get(id)
            .map_or(ServerState::Unregistered, Registration::state)
    }

    pub fn address(&self, id: &str) -> Option<String> {
        self.servers.lock().get(id).map(|reg| reg.address.clone())
    }

    /// Running server ids, sorted.
    pub fn running_servers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .servers
            .lock()
            .iter()
            .filter(|(_, reg)| reg.state() == ServerState::Running)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Whether the subscription loop for `id` is still alive.
    pub fn is_serving(&self, id: &str) -> bool {
        self.servers
            .lock()
            .get(id)
            .and_then(|reg| reg.task.as_ref())
            .is_some_and(|task| !task.is_finished())
    }
}

/// Returned by [`Bridge::start_server`]; closing it stops the server.
pub struct ServerHandle<R: ServerRuntime, T: EventTransport> {
    id: String,
    address: String,
    bridge: Arc<Bridge<R, T>>,
}

impl<R: ServerRuntime, T: EventTransport> ServerHandle<R, T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> ServerState {
        self.bridge.state(&self.id)
    }

    pub async fn close(&self) -> Result<Value, RegistryError> {
        self.bridge.stop_server(&self.id).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

async fn serve<H: RequestHandler, T: EventTransport>(
    server_id: String,
    mut subscription: Subscription,
    handler: Arc<H>,
    transport: Arc<T>,
) {
    while let Some(event) = subscription.recv().await {
        let handler = handler.clone();
        let transport = transport.clone();
        let server_id = server_id.clone();
        tokio::spawn(async move {
            dispatch(&server_id, event.data, handler.as_ref(), transport.as_ref()).await;
        });
    }
    debug!(
        "Subscription on {server_id} closed (generation {})",
        subscription.generation()
    );
}

/// Handle one request event for `server_id` and publish its single reply.
///
/// Returns the correlation id that was answered, or `None` when the event
/// carried no usable id.
pub async fn dispatch<H, T>(
    server_id: &str,
    payload: Value,
    handler: &H,
    transport: &T,
) -> Option<String>
where
    H: RequestHandler,
    T: EventTransport + ?Sized,
{
    let correlation = correlation_id(&payload);

    let request = match RawRequest::from_event(payload) {
        Ok(raw) => raw.normalize(),
        Err(err) => {
            let Some(reply_to) = correlation else {
                warn!("Dropping undecodable event on {server_id}: {err}");
                return None;
            };
            warn!("Malformed request {reply_to} on {server_id}: {err}");
            publish_response(transport, &reply_to, &Response::text(400, err.to_string()));
            return Some(reply_to);
        }
    };

    let reply_to = request.id.clone();
    debug!("{server_id}: {} {} ({reply_to})", request.method, request.url);

    let outcome = AssertUnwindSafe(async move { handler.handle(request).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(HandlerError::new(panic_message(panic.as_ref()))));

    if let Err(err) = &outcome {
        error!(server = server_id, request = %reply_to, "Server handler err: {err}");
    }

    publish_response(transport, &reply_to, &Response::from_handler_result(outcome));
    Some(reply_to)
}

fn correlation_id(payload: &Value) -> Option<String> {
    let request = match payload {
        Value::Array(args) => args.first()?,
        other => other,
    };
    request.get("id")?.as_str().map(str::to_string)
}

fn publish_response<T: EventTransport + ?Sized>(transport: &T, reply_to: &str, response: &Response) {
    let data = serde_json::to_value(response).unwrap_or_else(|e| {
        error!("Failed to encode response for {reply_to}: {e}");
        json!({
            "status": 500,
            "headers": { "Content-Type": bridge_protocol::TEXT_PLAIN_UTF8 },
            "body": e.to_string(),
            "options": { "mode": "Text" },
        })
    });
    if !transport.publish(reply_to, data) {
        debug!("No listener for response {reply_to}");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}
