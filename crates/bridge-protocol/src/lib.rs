//! HTTP Event Bridge - Protocol Types
//!
//! Wire types for the bridge between virtual HTTP servers and an event
//! channel. This crate is the single source of truth for request/response
//! payloads, registry replies, host-link frames and the error taxonomy.

pub mod error;
pub mod host;
pub mod http;
pub mod registry;

pub use error::{BridgeError, HandlerError, RegistryError};
pub use host::{CallId, HostFrame};
pub use http::{
    HeaderValue, RawRequest, Request, Response, ResponseMode, ResponseOptions, TEXT_PLAIN_UTF8,
};
pub use registry::{Methods, RegistryReply, parse_server_ids};

/// Result produced by a request handler.
pub type HandlerResult = Result<Response, HandlerError>;
