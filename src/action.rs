//! Verb dispatch: one logical endpoint, one handler per HTTP method.
//!
//! The verb → handler table is declared once at configuration time. A request
//! whose upper-cased method has no entry is answered with
//! `405 Method Not Allowed` and an `Allow` header listing the declared verbs.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::context::Overhead;
use crate::error::Error;
use crate::handler::{composite_handler, BoxedHandler, ErasedHandler, Handler};
use crate::method::Method;
use crate::pipeline::method_not_allowed;
use crate::request::Request;
use crate::response::Response;

/// A verb-keyed set of handlers.
///
/// ```rust
/// use menhir::{Action, Method, Overhead, Request, Response};
///
/// fn show(_: &Request, _: &mut Overhead) -> Response { Response::text("item") }
/// fn replace(_: &Request, _: &mut Overhead) -> Response { Response::text("replaced") }
///
/// let item = Action::new()
///     .get(show)
///     .on(Method::Put, replace);
/// ```
#[derive(Default)]
pub struct Action {
    handlers: BTreeMap<Method, BoxedHandler>,
}

impl Action {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `method`.
    ///
    /// # Panics
    ///
    /// Panics if `method` already has a handler.
    pub fn on(mut self, method: Method, handler: impl Handler) -> Self {
        if self.handlers.insert(method, handler.into_boxed_handler()).is_some() {
            panic!("duplicate handler for {method}");
        }
        self
    }

    pub fn get(self, handler: impl Handler) -> Self { self.on(Method::Get, handler) }
    pub fn post(self, handler: impl Handler) -> Self { self.on(Method::Post, handler) }
    pub fn put(self, handler: impl Handler) -> Self { self.on(Method::Put, handler) }
    pub fn patch(self, handler: impl Handler) -> Self { self.on(Method::Patch, handler) }
    pub fn delete(self, handler: impl Handler) -> Self { self.on(Method::Delete, handler) }

    /// Declared verbs, in alphabetical order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.handlers.keys().copied()
    }

    /// Dispatches `req` outside an [`Endpoint`](crate::Endpoint), with a
    /// caller-supplied overhead.
    pub fn handle(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        self.call(req, overhead)
    }

    fn allow_header(&self) -> String {
        self.methods().map(Method::as_str).collect::<Vec<_>>().join(", ")
    }
}

impl ErasedHandler for Action {
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        let Some((method, handler)) = req.verb().and_then(|m| self.handlers.get(&m).map(|h| (m, h))) else {
            warn!(method = %req.method(), path = %req.path(), "no handler for method");
            return Ok(method_not_allowed(&self.allow_header()));
        };
        debug!(%method, path = %req.path(), "dispatching to action handler");
        overhead.routing_mut().method = Some(method);
        handler.call(req, overhead)
    }
}

composite_handler!(Action);
