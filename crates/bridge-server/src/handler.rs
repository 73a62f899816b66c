//! Request handler contract.

use std::future::Future;

use bridge_protocol::{HandlerResult, Request};

/// Computes the response for one request.
///
/// A handler produces exactly one outcome per request: a response, or a
/// failure the bridge turns into a 500.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> impl Future<Output = HandlerResult> + Send;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send,
{
    fn handle(&self, request: Request) -> impl Future<Output = HandlerResult> + Send {
        self(request)
    }
}
