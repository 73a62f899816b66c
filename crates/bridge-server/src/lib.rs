//! HTTP Event Bridge — registry handle and request/response bridge.
//!
//! A caller registers a named virtual server through the runtime; request
//! events for that server arrive on the event transport, go through a
//! user handler, and exactly one response event is published per request.

pub mod bridge;
pub mod handler;
pub mod registry;
pub mod runtime;

pub use bridge::{Bridge, ServerHandle, ServerState, dispatch};
pub use handler::RequestHandler;
pub use registry::{RegistryHandle, ServerRuntime};
pub use runtime::{LocalRuntime, LocalRuntimeConfig};
