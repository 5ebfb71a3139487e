//! Validation against a JSON Schema document.
//!
//! The alternate validation path for handlers whose input is described as a
//! JSON Schema rather than a [`Schema`](crate::schema::Schema). The stage:
//!
//! 1. answers `406` unless the body is JSON;
//! 2. decodes the body (`400` if it is not JSON at all);
//! 3. collects every schema violation, sorted by its string form so the same
//!    input always yields the same body, and buckets them by the first
//!    segment of the offending instance path;
//! 4. answers `400` with the JSON aggregate, or stores the decoded payload in
//!    the [`Overhead`] and continues.
//!
//! Violations at the document root go under [`ROOT_KEY`]; missing required
//! properties go under [`MISSING_KEY`].

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::context::Overhead;
use crate::error::Error;
use crate::pipeline::{not_acceptable, Flow, Stage};
use crate::request::Request;
use crate::validate::{ValidationErrors, Violation, MISSING_KEY, ROOT_KEY};

/// Pipeline stage validating a JSON body against a compiled JSON Schema.
pub struct JsonSchema {
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compiles `schema`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSchema`] when the document is not a valid schema.
    pub fn new(schema: &Value) -> Result<Self, Error> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| Error::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validates an already-decoded payload.
    pub fn check(&self, payload: &Value) -> Result<(), ValidationErrors> {
        let mut found: Vec<(String, String)> = self.validator
            .iter_errors(payload)
            .map(|e| {
                let key = if matches!(e.kind, ValidationErrorKind::Required { .. }) {
                    MISSING_KEY.to_owned()
                } else {
                    first_segment(&e.instance_path.to_string()).unwrap_or_else(|| ROOT_KEY.to_owned())
                };
                (key, e.to_string())
            })
            .collect();
        if found.is_empty() {
            return Ok(());
        }

        found.sort_by(|a, b| a.1.cmp(&b.1));
        let mut errors = ValidationErrors::new();
        for (key, message) in found {
            errors.add(key, Violation::new("SchemaViolation").with_doc(message));
        }
        Err(errors)
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema").finish_non_exhaustive()
    }
}

/// First reference token of a JSON pointer, unescaped. `None` for the root.
fn first_segment(pointer: &str) -> Option<String> {
    let token = pointer.strip_prefix('/')?.split('/').next()?;
    Some(token.replace("~1", "/").replace("~0", "~"))
}

impl Stage for JsonSchema {
    fn name(&self) -> &'static str { "json-schema" }

    fn run(&self, req: &Request, overhead: &mut Overhead) -> Result<Flow, Error> {
        if !req.is_json() {
            warn!(content_type = ?req.content_type(), path = %req.path(), "JSON schema validator got a non-JSON body");
            return Ok(Flow::Respond(not_acceptable()));
        }

        let payload: Value = match serde_json::from_slice(req.body()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(path = %req.path(), error = %e, "undecodable JSON body");
                let mut errors = ValidationErrors::new();
                errors.add_root(Violation::new("MalformedBody").with_doc(e.to_string()));
                return Ok(Flow::Respond(errors.to_response(true)));
            }
        };

        if let Err(errors) = self.check(&payload) {
            warn!(path = %req.path(), errors = errors.len(), "request failed JSON schema validation");
            return Ok(Flow::Respond(errors.to_response(true)));
        }

        debug!(path = %req.path(), "JSON body validated");
        if let Err(e) = overhead.set_json(payload) {
            error!(error = %e, "JSON payload conflicts with the overhead");
            return Err(e);
        }
        Ok(Flow::Continue)
    }
}
