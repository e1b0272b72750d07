//! Response producers and the ordered chain the server dispatches through.
//!
//! A [`Responder`] either answers a request or declines by returning
//! `Ok(None)`. The chain asks each responder in registration order and
//! stops at the first answer; if all decline, the result is a generic 404.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::error::HandlerError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::StatusCode;

/// Outcome of a single responder.
pub type Respond = BoxFuture<'static, Result<Option<Response>, HandlerError>>;

/// Something that may produce a response for a request.
pub trait Responder: Send + Sync + 'static {
    fn respond(&self, request: Request) -> Respond;
}

impl<F, Fut> Responder for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Response>, HandlerError>> + Send + 'static,
{
    fn respond(&self, request: Request) -> Respond {
        Box::pin(self(request))
    }
}

/// Ordered list of responders with a 404 fallback.
#[derive(Clone, Default)]
pub struct ResponderChain {
    responders: Vec<Arc<dyn Responder>>,
}

impl ResponderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, responder: impl Responder) {
        self.responders.push(Arc::new(responder));
    }

    pub fn with(mut self, responder: impl Responder) -> Self {
        self.push(responder);
        self
    }

    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }

    /// Ask each responder in turn. Errors short-circuit the chain.
    pub async fn dispatch(&self, request: Request) -> Result<Response, HandlerError> {
        for responder in &self.responders {
            if let Some(response) = responder.respond(request.clone()).await? {
                return Ok(response);
            }
        }
        Ok(Response::generic(StatusCode::NOT_FOUND, None))
    }
}

impl std::fmt::Debug for ResponderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderChain")
            .field("responders", &self.responders.len())
            .finish()
    }
}
