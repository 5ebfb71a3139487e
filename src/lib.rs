//! # menhir
//!
//! Request validation and action dispatch in front of HTTP handlers.
//!
//! menhir does not serve traffic. The hosting server receives a request,
//! hands it to an [`Endpoint`] and writes back the [`Response`]. In between,
//! menhir:
//!
//! - picks the handler by exact path, then by upper-cased verb
//!   (`400` for unknown paths, `405` for undeclared verbs);
//! - runs the guards in front of it: method allow-lists, content-type
//!   checks, CORS preflight interception;
//! - extracts the request parameters (query string, form or JSON body),
//!   coerces them to the declared field types and validates them, reporting
//!   **every** violation in one `400` response;
//! - stores the validated [`Record`] in the per-request [`Overhead`] for the
//!   handler to read.
//!
//! ## Quick start
//!
//! ```rust
//! use menhir::schema::{FieldSpec, Schema};
//! use menhir::{Action, Endpoint, Overhead, Pipeline, Request, Response, Validator};
//!
//! fn greet(_req: &Request, ov: &mut Overhead) -> Response {
//!     let record = ov.record().expect("validated");
//!     Response::text(format!("hello {}", record.get_str("name").unwrap_or_default()))
//! }
//!
//! let schema = Schema::new([
//!     FieldSpec::text("name").required(),
//!     FieldSpec::text("tags").collection(),
//! ]).unwrap();
//!
//! let api = Endpoint::new()
//!     .route("/", Action::new().get(Pipeline::new(greet).stage(Validator::new(schema))));
//!
//! let req: Request = http::Request::builder()
//!     .uri("/?name=Alice")
//!     .body(bytes::Bytes::new())
//!     .unwrap()
//!     .into();
//! let res = api.handle(&req).unwrap();
//! assert_eq!(res.body(), b"hello Alice");
//!
//! let req: Request = http::Request::builder()
//!     .uri("/?tags=x&tags=y")
//!     .body(bytes::Bytes::new())
//!     .unwrap()
//!     .into();
//! let res = api.handle(&req).unwrap();
//! assert_eq!(res.status_code(), http::StatusCode::BAD_REQUEST);
//! assert_eq!(res.body(), b"`name`: Required input is missing.");
//! ```
//!
//! ## Errors
//!
//! Client mistakes are always responses. [`Error`] is reserved for wiring
//! mistakes (a verb with no extractor, conflicting validators, a schema that
//! cannot be built) and should be treated as fatal by the host.

mod action;
mod context;
mod cors;
mod endpoint;
mod error;
mod handler;
mod json_schema;
mod method;
mod pipeline;
mod record;
mod request;
mod response;

pub mod coerce;
pub mod extract;
pub mod schema;
pub mod validate;

pub use action::Action;
pub use context::{Overhead, RoutingInfo};
pub use cors::{Cors, CorsBuilder};
pub use endpoint::{Endpoint, NO_MATCHING_ACTION};
pub use error::Error;
pub use handler::Handler;
pub use json_schema::JsonSchema;
pub use method::Method;
pub use pipeline::{Allowed, Flow, Pipeline, RequireJson, Stage};
pub use record::Record;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use validate::{ErrorFormat, ValidationErrors, Validator, Violation};
