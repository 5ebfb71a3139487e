//! Path dispatch: the entry point of the request-processing chain.
//!
//! An [`Endpoint`] maps exact request paths to handlers (usually
//! [`Action`](crate::Action)s, possibly wrapped in guards). For each request
//! it creates a fresh [`Overhead`], records the matched path and hands both
//! to the handler. A path with no entry is answered with `400 Bad Request`.

use std::collections::HashMap;

use http::StatusCode;
use tracing::{debug, error, warn};

use crate::context::Overhead;
use crate::error::Error;
use crate::handler::{composite_handler, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// Body of the routing-failure response.
pub const NO_MATCHING_ACTION: &str = "Couldn't match any action. Please consult the API documentation.";

type OverheadFactory = Box<dyn Fn(&Request) -> Overhead + Send + Sync>;

/// Path-keyed dispatch table.
///
/// ```rust
/// use menhir::{Action, Endpoint, Overhead, Request, Response};
///
/// fn list(_: &Request, _: &mut Overhead) -> Response { Response::text("[]") }
///
/// let api = Endpoint::new()
///     .route("/users", Action::new().get(list));
///
/// let req: Request = http::Request::builder()
///     .uri("/users")
///     .body(bytes::Bytes::new())
///     .unwrap()
///     .into();
/// assert_eq!(api.handle(&req).unwrap().body(), b"[]");
/// ```
#[derive(Default)]
pub struct Endpoint {
    routes: HashMap<String, BoxedHandler>,
    overhead: Option<OverheadFactory>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for an exact request path.
    ///
    /// # Panics
    ///
    /// Panics if `path` is already registered.
    pub fn route(mut self, path: &str, handler: impl Handler) -> Self {
        if self.routes.insert(path.to_owned(), handler.into_boxed_handler()).is_some() {
            panic!("duplicate action for `{path}`");
        }
        self
    }

    /// Builds each request's [`Overhead`] with `factory` instead of
    /// [`Overhead::new`].
    pub fn overhead<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Request) -> Overhead + Send + Sync + 'static,
    {
        self.overhead = Some(Box::new(factory));
        self
    }

    /// Registered paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Processes one request end to end.
    ///
    /// # Errors
    ///
    /// Only fatal wiring errors; every client mistake is a [`Response`].
    pub fn handle(&self, req: &Request) -> Result<Response, Error> {
        let mut overhead = match &self.overhead {
            Some(factory) => factory(req),
            None => Overhead::new(),
        };
        self.call(req, &mut overhead)
    }
}

impl ErasedHandler for Endpoint {
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        let Some(handler) = self.routes.get(req.path()) else {
            warn!(path = %req.path(), "no action for path");
            return Ok(Response::builder().status(StatusCode::BAD_REQUEST).text(NO_MATCHING_ACTION));
        };
        debug!(path = %req.path(), "dispatching to action");
        overhead.routing_mut().path = Some(req.path().to_owned());
        handler.call(req, overhead).inspect_err(|e| {
            error!(path = %req.path(), error = %e, "request pipeline failed");
        })
    }
}

composite_handler!(Endpoint);
