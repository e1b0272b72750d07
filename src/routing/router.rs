//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes per verb in registration order
//! - Match the request path (query stripped) against each pattern
//! - Call the first matching handler with the captured parameters
//!
//! # Design Decisions
//! - Immutable once handed to the server (shared without locks)
//! - First match wins
//! - No match declines, so the next responder in the chain gets a turn

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::{HandlerError, Request, Respond, Responder, Response};
use crate::routing::matcher::{Matcher, Params, PathPattern};

type Handler = Arc<dyn Fn(Request, Params) -> BoxFuture<'static, Result<Response, HandlerError>> + Send + Sync>;

struct Route {
    matcher: Box<dyn Matcher>,
    handler: Handler,
}

/// Verb- and path-based router.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `verb` requests whose path matches `matcher`.
    pub fn add_route<M, F, Fut>(&mut self, verb: &str, matcher: M, handler: F)
    where
        M: Matcher + 'static,
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |request, params| handler(request, params).boxed());
        self.routes
            .entry(verb.to_ascii_uppercase())
            .or_default()
            .push(Route {
                matcher: Box::new(matcher),
                handler,
            });
    }

    /// Register a `:name` / `*` path pattern.
    pub fn route<F, Fut>(mut self, verb: &str, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        self.add_route(verb, PathPattern::new(pattern), handler);
        self
    }

    pub fn get<F, Fut>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        self.route("GET", pattern, handler)
    }

    pub fn post<F, Fut>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        self.route("POST", pattern, handler)
    }

    /// Find the handler for a request.
    fn lookup(&self, request: &Request) -> Option<(Handler, Params)> {
        let path = request.path_info();
        self.routes.get(request.verb())?.iter().find_map(|route| {
            route
                .matcher
                .matches(path)
                .map(|params| (Arc::clone(&route.handler), params))
        })
    }

    /// Number of registered routes across all verbs.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Responder for Router {
    fn respond(&self, request: Request) -> Respond {
        match self.lookup(&request) {
            Some((handler, params)) => {
                tracing::trace!(verb = %request.verb(), path = %request.path_info(), "Route matched");
                async move { handler(request, params).await.map(Some) }.boxed()
            }
            None => async { Ok(None) }.boxed(),
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .flat_map(|(verb, routes)| routes.iter().map(move |route| (verb, &route.matcher)))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(b.0));
        f.debug_struct("Router").field("routes", &routes).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestHead;

    fn request(verb: &str, path: &str) -> Request {
        Request::detached(RequestHead::new(verb, path))
    }

    fn router() -> Router {
        Router::new()
            .get("/hello-world", |req: Request, _| async move {
                let world = req
                    .query_params()
                    .get("world")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "Earth".to_string());
                Ok(Response::new().with_body(format!("hello from {world}!")))
            })
            .get("/users/:id", |_req, params: Params| async move {
                Ok(Response::new().with_body(format!("user {}", params.get("id").unwrap_or("?"))))
            })
            .get("/users/*", |_req, _params| async { Ok(Response::new().with_body("splat")) })
            .post("/users/:id", |_req, _params| async { Ok(Response::new().with_body("posted")) })
    }

    async fn body_len(router: &Router, verb: &str, path: &str) -> Option<usize> {
        router
            .respond(request(verb, path))
            .await
            .unwrap()
            .and_then(|response| response.body().known_len())
    }

    #[tokio::test]
    async fn routes_by_verb_and_path() {
        let router = router();
        assert_eq!(router.len(), 4);
        assert_eq!(
            body_len(&router, "GET", "/hello-world?world=Mars").await,
            Some("hello from Mars!".len())
        );
        assert_eq!(body_len(&router, "GET", "/users/7").await, Some("user 7".len()));
        assert_eq!(body_len(&router, "post", "/users/7").await, Some("posted".len()));
    }

    #[tokio::test]
    async fn first_match_wins() {
        let router = router();
        // "/users/7" matches both the capture and the splat route.
        assert_eq!(body_len(&router, "GET", "/users/7").await, Some("user 7".len()));
        assert_eq!(body_len(&router, "GET", "/users/7/avatar").await, Some("splat".len()));
    }

    #[tokio::test]
    async fn declines_when_nothing_matches() {
        let router = router();
        assert!(router.respond(request("GET", "/nothing")).await.unwrap().is_none());
        assert!(router.respond(request("DELETE", "/users/7")).await.unwrap().is_none());
    }
}
