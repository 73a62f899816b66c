//! Server Registry Handle — start/stop/list round trips to the runtime.

use std::future::Future;
use std::sync::Arc;

use bridge_protocol::registry::parse_server_ids;
use bridge_protocol::{RegistryError, RegistryReply};
use serde_json::Value;
use tracing::debug;

/// The runtime that owns the real sockets.
///
/// Each call is a single round trip. An `Err` means the call channel itself
/// failed; a runtime-reported failure arrives as `Ok` with `flag == false`.
pub trait ServerRuntime: Send + Sync + 'static {
    fn start_server(
        &self,
        address: &str,
        id: &str,
    ) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send;

    fn stop_server(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send;

    fn list_server(&self) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send;
}

impl<R: ServerRuntime> ServerRuntime for Arc<R> {
    fn start_server(
        &self,
        address: &str,
        id: &str,
    ) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send {
        (**self).start_server(address, id)
    }

    fn stop_server(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send {
        (**self).stop_server(id)
    }

    fn list_server(&self) -> impl Future<Output = Result<RegistryReply, RegistryError>> + Send {
        (**self).list_server()
    }
}

/// Stateless wrapper turning `{flag, data}` replies into `Result`s.
///
/// Never retries; retry policy belongs to the caller.
pub struct RegistryHandle<R: ServerRuntime> {
    runtime: R,
}

impl<R: ServerRuntime> RegistryHandle<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Ask the runtime to bind `address` and forward requests tagged `id`.
    pub async fn start(&self, address: &str, id: &str) -> Result<Value, RegistryError> {
        debug!("Registry start: {id} on {address}");
        self.runtime.start_server(address, id).await?.into_result()
    }

    /// Ask the runtime to stop forwarding `id` and release its bind.
    pub async fn stop(&self, id: &str) -> Result<Value, RegistryError> {
        debug!("Registry stop: {id}");
        self.runtime.stop_server(id).await?.into_result()
    }

    /// Active server ids, in the order the runtime reports them.
    pub async fn list(&self) -> Result<Vec<String>, RegistryError> {
        let data = self.runtime.list_server().await?.into_result()?;
        match data {
            Value::String(joined) => Ok(parse_server_ids(&joined)),
            Value::Null => Ok(Vec::new()),
            other => Err(RegistryError::new(format!(
                "ListServer returned a non-string payload: {other}"
            ))),
        }
    }
}
