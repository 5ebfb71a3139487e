//! Ordered request-processing stages in front of a handler.
//!
//! A [`Pipeline`] runs its [`Stage`]s in the order they were added. Each
//! stage either lets the request through ([`Flow::Continue`]), answers it
//! ([`Flow::Respond`], skipping every later stage and the handler), or fails
//! fatally with an [`Error`].
//!
//! ```rust
//! use menhir::schema::{FieldSpec, Schema};
//! use menhir::{Allowed, Overhead, Pipeline, Request, Response, Validator};
//!
//! fn greet(_req: &Request, ov: &mut Overhead) -> Response {
//!     let name = ov.record().and_then(|r| r.get_str("name")).unwrap_or("stranger");
//!     Response::text(format!("hello {name}"))
//! }
//!
//! let schema = Schema::new([FieldSpec::text("name").required()]).unwrap();
//! let greeter = Pipeline::new(greet)
//!     .stage(Allowed::new(["GET", "POST"]).unwrap())
//!     .stage(Validator::new(schema));
//! ```

use std::collections::BTreeSet;

use http::StatusCode;
use tracing::{debug, warn};

use crate::context::Overhead;
use crate::error::Error;
use crate::handler::{composite_handler, BoxedHandler, ErasedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Outcome of one stage.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage, or to the handler.
    Continue,
    /// Stop here and answer with this response.
    Respond(Response),
}

/// One named step of a [`Pipeline`].
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn run(&self, req: &Request, overhead: &mut Overhead) -> Result<Flow, Error>;
}

/// A handler guarded by an ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    handler: BoxedHandler,
}

impl Pipeline {
    pub fn new(handler: impl Handler) -> Self {
        Self { stages: Vec::new(), handler: handler.into_boxed_handler() }
    }

    /// Appends a stage. Stages run in the order they are added.
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl ErasedHandler for Pipeline {
    fn call(&self, req: &Request, overhead: &mut Overhead) -> Result<Response, Error> {
        for stage in &self.stages {
            match stage.run(req, overhead)? {
                Flow::Continue => {}
                Flow::Respond(response) => {
                    debug!(stage = stage.name(), status = %response.status_code(), "stage answered the request");
                    return Ok(response);
                }
            }
        }
        self.handler.call(req, overhead)
    }
}

composite_handler!(Pipeline);

// ── Method allow-list ─────────────────────────────────────────────────────────

/// Rejects verbs outside an allow-list with `405 Method Not Allowed`.
#[derive(Clone, Debug)]
pub struct Allowed {
    methods: BTreeSet<Method>,
}

impl Allowed {
    /// Builds the guard from verb names, in any case.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedMethod`] for names that are not HTTP methods.
    pub fn new<I, S>(methods: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for name in methods {
            let name = name.as_ref();
            let method = Method::parse(name)
                .ok_or_else(|| Error::UnsupportedMethod(name.to_ascii_uppercase()))?;
            set.insert(method);
        }
        Ok(Self { methods: set })
    }

    /// Builds the guard from typed verbs.
    pub fn methods(methods: impl IntoIterator<Item = Method>) -> Self {
        Self { methods: methods.into_iter().collect() }
    }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// `Allow` header value, e.g. `GET, POST`.
    pub fn allow_header(&self) -> String {
        self.methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl Stage for Allowed {
    fn name(&self) -> &'static str { "allowed" }

    fn run(&self, req: &Request, _overhead: &mut Overhead) -> Result<Flow, Error> {
        match req.verb() {
            Some(method) if self.allows(method) => Ok(Flow::Continue),
            _ => {
                warn!(method = %req.method(), path = %req.path(), "method not in allow-list");
                Ok(Flow::Respond(method_not_allowed(&self.allow_header())))
            }
        }
    }
}

pub(crate) fn method_not_allowed(allow: &str) -> Response {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("allow", allow)
        .no_body()
}

// ── Content-type guard ────────────────────────────────────────────────────────

/// Rejects requests whose body is not JSON with `406 Not Acceptable`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireJson;

impl Stage for RequireJson {
    fn name(&self) -> &'static str { "require-json" }

    fn run(&self, req: &Request, _overhead: &mut Overhead) -> Result<Flow, Error> {
        if req.is_json() {
            return Ok(Flow::Continue);
        }
        warn!(content_type = ?req.content_type(), path = %req.path(), "expected a JSON body");
        Ok(Flow::Respond(not_acceptable()))
    }
}

pub(crate) fn not_acceptable() -> Response {
    Response::builder()
        .status(StatusCode::NOT_ACCEPTABLE)
        .text("Expected a request body of type application/json.")
}
