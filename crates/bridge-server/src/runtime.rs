//! LocalRuntime — an in-process stand-in for the socket-owning runtime.
//!
//! Keeps the registry of running virtual servers in memory and can inject
//! request events, awaiting the correlated response on the same transport
//! the bridge publishes to. No socket is ever bound.

use std::sync::Arc;
use std::time::Duration;

use bridge_protocol::registry::join_server_ids;
use bridge_protocol::{BridgeError, RawRequest, RegistryError, RegistryReply, Response};
use bridge_transport::EventTransport;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::registry::ServerRuntime;

/// Configuration for [`LocalRuntime`].
#[derive(Debug, Clone)]
pub struct LocalRuntimeConfig {
    /// How long `deliver` waits for a response before giving up
    pub response_timeout: Duration,
}

impl Default for LocalRuntimeConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
        }
    }
}

pub struct LocalRuntime<T: EventTransport> {
    transport: Arc<T>,
    config: LocalRuntimeConfig,
    /// (id, address) in start order
    servers: Mutex<Vec<(String, String)>>,
}

impl<T: EventTransport> LocalRuntime<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, LocalRuntimeConfig::default())
    }

    pub fn with_config(transport: Arc<T>, config: LocalRuntimeConfig) -> Self {
        Self {
            transport,
            config,
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.servers.lock().iter().any(|(server_id, _)| server_id == id)
    }

    /// Send `request` to server `server_id` and wait for its reply.
    ///
    /// The request's id is replaced with a fresh correlation id.
    pub async fn deliver(&self, server_id: &str, mut request: RawRequest) -> Result<Response, BridgeError> {
        if !self.is_running(server_id) {
            return Err(BridgeError::NotRunning(server_id.to_string()));
        }

        let correlation = uuid::Uuid::new_v4().to_string();
        request.id = correlation.clone();
        let payload = serde_json::to_value(vec![request])?;

        let mut reply = self.transport.subscribe(&correlation);
        if !self.transport.publish(server_id, payload) {
            self.transport.unsubscribe(&correlation);
            return Err(BridgeError::NotRunning(server_id.to_string()));
        }
        debug!("Delivered {correlation} to {server_id}");

        let outcome = tokio::time::timeout(self.config.response_timeout, reply.recv()).await;
        self.transport.unsubscribe(&correlation);

        match outcome {
            Ok(Some(event)) => Ok(serde_json::from_value(event.data)?),
            Ok(None) => Err(BridgeError::NotRunning(server_id.to_string())),
            Err(_) => Err(BridgeError::Timeout(correlation)),
        }
    }
}

impl<T: EventTransport> ServerRuntime for LocalRuntime<T> {
    async fn start_server(&self, address: &str, id: &str) -> Result<RegistryReply, RegistryError> {
        let mut servers = self.servers.lock();
        if servers
            .iter()
            .any(|(server_id, bound)| server_id != id && bound == address)
        {
            return Ok(RegistryReply::failure(format!("address already in use: {address}")));
        }
        servers.retain(|(server_id, _)| server_id != id);
        servers.push((id.to_string(), address.to_string()));
        info!("Local runtime bound {id} to {address}");
        Ok(RegistryReply::success("Success"))
    }

    async fn stop_server(&self, id: &str) -> Result<RegistryReply, RegistryError> {
        self.servers.lock().retain(|(server_id, _)| server_id != id);
        info!("Local runtime released {id}");
        Ok(RegistryReply::success("Success"))
    }

    async fn list_server(&self) -> Result<RegistryReply, RegistryError> {
        let servers = self.servers.lock();
        let joined = join_server_ids(servers.iter().map(|(id, _)| id.as_str()));
        Ok(RegistryReply::success(joined))
    }
}
