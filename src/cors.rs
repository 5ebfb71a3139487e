//! CORS awareness around a handler.
//!
//! [`Cors`] intercepts every `OPTIONS` request and answers it with its
//! preflight handler; the wrapped handler never sees it. Every other response
//! from the wrapped handler gets `Access-Control-Allow-Origin` set to the
//! configured origins.

use http::StatusCode;
use tracing::debug;

use crate::context::Overhead;
use crate::error::Error;
use crate::handler::{composite_handler, BoxedHandler, ErasedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Builder for a [`Cors`] wrapper.
pub struct CorsBuilder {
    origins: String,
    preflight: Option<BoxedHandler>,
}

impl CorsBuilder {
    /// Replaces the default preflight handler.
    pub fn preflight(mut self, handler: impl Handler) -> Self {
        self.preflight = Some(handler.into_boxed_handler());
        self
    }

    /// Wraps `inner`.
    pub fn wrap(self, inner: impl Handler) -> Cors {
        let origins = self.origins;
        let preflight = self.preflight.unwrap_or_else(|| {
            let origins = origins.clone();
            (move |req: &Request, _ov: &mut Overhead| default_preflight(&origins, req)).into_boxed_handler()
        });
        Cors { origins, preflight, inner: inner.into_boxed_handler() }
    }
}

/// A handler wrapped with CORS awareness.
///
/// ```rust
/// use menhir::{Action, Cors, Overhead, Request, Response};
///
/// fn list(_: &Request, _: &mut Overhead) -> Response { Response::text("[]") }
///
/// let users = Cors::allow_origins("https://example.com")
///     .wrap(Action::new().get(list));
/// ```
pub struct Cors {
    origins: String,
    preflight: BoxedHandler,
    inner: BoxedHandler,
}

impl Cors {
    /// Starts a wrapper advertising `origins` (for example `*`).
    pub fn allow_origins(origins: impl Into<String>) -> CorsBuilder {
        CorsBuilder { origins: origins.into(), preflight: None }
    }
}

impl ErasedHandler for Cors {
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        if req.verb() == Some(Method::Options) {
            debug!(path = %req.path(), "answering CORS preflight");
            return self.preflight.call(req, overhead);
        }
        let mut response = self.inner.call(req, overhead)?;
        response.set_header("access-control-allow-origin", &self.origins);
        Ok(response)
    }
}

composite_handler!(Cors);

fn default_preflight(origins: &str, req: &Request) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("access-control-allow-origin", origins)
        .header("access-control-allow-methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS");
    if let Some(headers) = req.header("access-control-request-headers") {
        builder = builder.header("access-control-allow-headers", headers);
    }
    builder.no_body()
}
