//! Schema validation and error aggregation.
//!
//! [`validate`] checks a coerced candidate against its [`Schema`] and returns
//! either a [`Record`] or a non-empty [`ValidationErrors`], never both. It
//! does not stop at the first problem: every field is checked and every
//! violation is kept, so a client can fix everything in one round trip.
//!
//! Per field, checks run in this order and stop at the first failing step:
//! required-ness, then type conformance, then the field's rules (all of
//! them, in declaration order). Schema invariants run only when every field
//! passed.
//!
//! [`Validator`] is the pipeline stage wrapping extraction, coercion and
//! validation for one schema.

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::coerce::coerce;
use crate::context::Overhead;
use crate::error::Error;
use crate::extract::{ExtractError, Extractors};
use crate::method::Method;
use crate::pipeline::{Flow, Stage};
use crate::record::Record;
use crate::request::Request;
use crate::response::Response;
use crate::schema::{FieldSpec, Schema};

/// JSON key collecting violations that belong to no single field.
pub const ROOT_KEY: &str = "__root__";

/// JSON key collecting "missing required property" violations of the JSON
/// Schema validator.
pub const MISSING_KEY: &str = "__missing__";

// ── Violation ─────────────────────────────────────────────────────────────────

/// One failed check.
///
/// A violation has a short machine-readable `code` (its default string form)
/// and, optionally, a human-readable description. Error bodies prefer the
/// description and fall back to the code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    code: Cow<'static, str>,
    doc: Option<String>,
}

impl Violation {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self { code: code.into(), doc: None }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn required() -> Self {
        Self::new("RequiredMissing").with_doc("Required input is missing.")
    }

    pub fn wrong_type(field: &FieldSpec) -> Self {
        let doc = if field.is_collection() {
            format!("Expected a list of {} values.", field.field_type())
        } else {
            format!("Expected {}.", field.field_type())
        };
        Self::new("WrongType").with_doc(doc)
    }

    pub fn code(&self) -> &str { &self.code }
    pub fn doc(&self) -> Option<&str> { self.doc.as_deref() }

    /// The description when there is one, the code otherwise.
    pub fn message(&self) -> &str {
        self.doc.as_deref().unwrap_or(&self.code)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

// ── ValidationErrors ──────────────────────────────────────────────────────────

/// Violations of one field, or of the whole record when `field` is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldErrors {
    field: Option<String>,
    violations: Vec<Violation>,
}

impl FieldErrors {
    pub fn field(&self) -> Option<&str> { self.field.as_deref() }
    pub fn violations(&self) -> &[Violation] { &self.violations }
}

/// Aggregate of every violation found for one request.
///
/// Fields keep the order in which their first violation was reported (schema
/// order, for [`validate`]); violations keep rule-evaluation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors {
    entries: Vec<FieldErrors>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl std::error::Error for ValidationErrors {}

/// Body format of a validation failure.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorFormat {
    /// JSON when a JSON body was read, plain text otherwise.
    #[default]
    Auto,
    Text,
    Json,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a violation of `field`.
    pub fn add(&mut self, field: impl Into<String>, violation: Violation) {
        self.push(Some(field.into()), violation);
    }

    /// Records a violation of the record as a whole.
    pub fn add_root(&mut self, violation: Violation) {
        self.push(None, violation);
    }

    fn push(&mut self, field: Option<String>, violation: Violation) {
        match self.entries.iter_mut().find(|e| e.field == field) {
            Some(entry) => entry.violations.push(violation),
            None => self.entries.push(FieldErrors { field, violations: vec![violation] }),
        }
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Total number of violations.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.violations.len()).sum()
    }

    pub fn entries(&self) -> &[FieldErrors] { &self.entries }

    /// Violations of `field`, if it has any.
    pub fn get(&self, field: &str) -> Option<&[Violation]> {
        self.entries.iter()
            .find(|e| e.field.as_deref() == Some(field))
            .map(|e| e.violations.as_slice())
    }

    /// One line per violation: `` `field`: description `` when the violation
    /// describes itself, the bare description for record-level violations,
    /// the bare code otherwise.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.len());
        for entry in &self.entries {
            for violation in &entry.violations {
                match (&entry.field, violation.doc()) {
                    (Some(field), Some(doc)) => lines.push(format!("`{field}`: {doc}")),
                    (None, Some(doc)) => lines.push(doc.to_owned()),
                    (_, None) => lines.push(violation.to_string()),
                }
            }
        }
        lines.join("\n")
    }

    /// `{"field": ["message", …], …}`. Record-level violations go under
    /// [`ROOT_KEY`].
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for entry in &self.entries {
            let key = entry.field.as_deref().unwrap_or(ROOT_KEY);
            let messages = entry.violations.iter()
                .map(|v| Value::String(v.message().to_owned()));
            match map.get_mut(key) {
                Some(Value::Array(existing)) => existing.extend(messages),
                _ => {
                    map.insert(key.to_owned(), Value::Array(messages.collect()));
                }
            }
        }
        Value::Object(map)
    }

    /// `400 Bad Request` carrying the aggregate as text or JSON.
    pub fn to_response(&self, json: bool) -> Response {
        let builder = Response::builder().status(StatusCode::BAD_REQUEST);
        if json {
            builder.json(self.to_json().to_string().into_bytes())
        } else {
            builder.text(self.to_text())
        }
    }
}

// ── validate ──────────────────────────────────────────────────────────────────

/// Validates coerced `values` (one per schema field, in schema order).
///
/// A `values` list whose length differs from the schema's is rejected as a
/// whole with a single record-level `MisalignedValues` violation; no field
/// is checked and no record is built.
pub fn validate(schema: &Schema, values: Vec<Option<Value>>) -> Result<Record, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if values.len() != schema.len() {
        error!(expected = schema.len(), got = values.len(), "candidate does not align with its schema");
        errors.add_root(Violation::new("MisalignedValues").with_doc(format!(
            "Expected {} values, got {}.",
            schema.len(),
            values.len(),
        )));
        return Err(errors);
    }

    for (field, value) in schema.fields().iter().zip(&values) {
        let Some(value) = value else {
            if field.is_required() {
                errors.add(field.name(), Violation::required());
            }
            continue;
        };
        if !conforms(field, value) {
            errors.add(field.name(), Violation::wrong_type(field));
            continue;
        }
        for rule in field.rules() {
            if let Err(violation) = rule.check(value) {
                errors.add(field.name(), violation);
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let record = Record::new(schema.clone(), values);
    for invariant in schema.invariants() {
        if let Err(violation) = invariant(&record) {
            errors.add_root(violation);
        }
    }
    if errors.is_empty() { Ok(record) } else { Err(errors) }
}

fn conforms(field: &FieldSpec, value: &Value) -> bool {
    let ty = field.field_type();
    if field.is_collection() {
        value.as_array().is_some_and(|items| items.iter().all(|item| ty.accepts(item)))
    } else {
        ty.accepts(value)
    }
}

// ── Validator stage ───────────────────────────────────────────────────────────

/// Pipeline stage: extract → coerce → validate against one schema.
///
/// On success the [`Record`] is stored in the request's [`Overhead`] and the
/// pipeline continues. On failure the stage answers `400` with every
/// violation.
///
/// ```rust
/// use menhir::schema::{FieldSpec, Schema};
/// use menhir::{Method, Validator};
///
/// let schema = Schema::new([FieldSpec::text("q").required()]).unwrap();
///
/// // Read the query string and the body, whatever the verb.
/// let validator = Validator::new(schema)
///     .sources([Method::Get, Method::Post])
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Validator {
    schema: Schema,
    extractors: Extractors,
    sources: Option<Vec<Method>>,
    format: ErrorFormat,
}

impl Validator {
    /// Validates parameters taken from the request verb's extractor.
    pub fn new(schema: Schema) -> Self {
        Self::with_extractors(schema, Extractors::default())
    }

    pub fn with_extractors(schema: Schema, extractors: Extractors) -> Self {
        Self { schema, extractors, sources: None, format: ErrorFormat::Auto }
    }

    /// Reads from these sources, merged in the given order, instead of the
    /// request verb's extractor.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedSource`] when a source has no extractor.
    pub fn sources(mut self, sources: impl IntoIterator<Item = Method>) -> Result<Self, Error> {
        let mut list: Vec<Method> = Vec::new();
        for source in sources {
            if !self.extractors.supports(source) {
                return Err(Error::UnsupportedSource(source));
            }
            if !list.contains(&source) {
                list.push(source);
            }
        }
        self.sources = Some(list);
        Ok(self)
    }

    pub fn format(mut self, format: ErrorFormat) -> Self {
        self.format = format;
        self
    }

    pub fn schema(&self) -> &Schema { &self.schema }

    /// Extracts, coerces and validates `req`.
    ///
    /// The outer `Result` carries fatal wiring errors; the inner one is the
    /// client-facing outcome.
    pub fn check(&self, req: &Request) -> Result<Result<Record, Response>, Error> {
        let sources = self.sources_for(req)?;
        let json = self.wants_json(req, &sources);
        let params = match self.extractors.extract_merged(&sources, req) {
            Ok(params) => params,
            Err(ExtractError::Malformed(message)) => {
                warn!(path = %req.path(), %message, "malformed request parameters");
                let mut errors = ValidationErrors::new();
                errors.add_root(Violation::new("MalformedBody").with_doc(message));
                return Ok(Err(errors.to_response(json)));
            }
            Err(ExtractError::Unsupported(method)) => {
                error!(path = %req.path(), %method, "request reached a validator without an extractor");
                return Err(Error::UnsupportedExtractor(method.to_string()));
            }
        };

        match validate(&self.schema, coerce(&self.schema, &params)) {
            Ok(record) => Ok(Ok(record)),
            Err(errors) => {
                warn!(path = %req.path(), errors = errors.len(), "request failed validation");
                Ok(Err(errors.to_response(json)))
            }
        }
    }

    /// The configured sources, or the request's own verb.
    fn sources_for(&self, req: &Request) -> Result<Vec<Method>, Error> {
        if let Some(sources) = &self.sources {
            return Ok(sources.clone());
        }
        match req.verb() {
            Some(method) => Ok(vec![method]),
            None => {
                let method = req.method().to_ascii_uppercase();
                error!(path = %req.path(), %method, "request reached a validator with an unknown verb");
                Err(Error::UnsupportedExtractor(method))
            }
        }
    }

    /// `Auto` answers in JSON only when a JSON body is among the sources
    /// read. `GET` reads the query string.
    fn wants_json(&self, req: &Request, sources: &[Method]) -> bool {
        match self.format {
            ErrorFormat::Auto => req.is_json() && sources.iter().any(|m| *m != Method::Get),
            ErrorFormat::Text => false,
            ErrorFormat::Json => true,
        }
    }
}

impl Stage for Validator {
    fn name(&self) -> &'static str { "validate" }

    fn run(&self, req: &Request, overhead: &mut Overhead) -> Result<Flow, Error> {
        match self.check(req)? {
            Ok(record) => {
                debug!(fields = record.len(), "request validated");
                if let Err(e) = overhead.set_record(record) {
                    error!(error = %e, "validated record conflicts with the overhead");
                    return Err(e);
                }
                Ok(Flow::Continue)
            }
            Err(response) => Ok(Flow::Respond(response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MaxLength, MinLength, Range};
    use bytes::Bytes;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new([
            FieldSpec::text("name").required().rule(MinLength(2)).rule(MaxLength(3)),
            FieldSpec::text("tags").collection(),
            FieldSpec::int("age").rule(Range { min: Some(0.0), max: Some(150.0) }),
        ]).unwrap()
    }

    #[test]
    fn valid_values_build_an_aligned_record() {
        let record = validate(&schema(), vec![Some(json!("Al")), None, Some(json!(30))]).unwrap();
        assert_eq!(record.values(), &[Some(json!("Al")), None, Some(json!(30))]);
    }

    #[test]
    fn every_violated_field_is_reported() {
        let errors = validate(&schema(), vec![None, Some(json!([1])), Some(json!(-1))]).unwrap_err();
        let fields: Vec<_> = errors.entries().iter().map(|e| e.field()).collect();
        assert_eq!(fields, [Some("name"), Some("tags"), Some("age")]);
        assert_eq!(errors.get("name").unwrap()[0].code(), "RequiredMissing");
        assert_eq!(errors.get("tags").unwrap()[0].code(), "WrongType");
        assert_eq!(errors.get("age").unwrap()[0].code(), "TooSmall");
    }

    #[test]
    fn misaligned_candidates_never_build_a_record() {
        for values in [vec![], vec![Some(json!("Al"))], vec![None, None, None, None]] {
            let errors = validate(&schema(), values).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors.entries()[0].field(), None);
            assert_eq!(errors.entries()[0].violations()[0].code(), "MisalignedValues");
        }
    }

    #[test]
    fn rules_of_one_field_are_all_kept_in_order() {
        let schema = Schema::new([FieldSpec::text("code")
            .rule(MinLength(5))
            .rule(|_: &Value| -> Result<(), Violation> { Err(Violation::new("Always")) })])
            .unwrap();
        let errors = validate(&schema, vec![Some(json!("abc"))]).unwrap_err();
        let codes: Vec<_> = errors.get("code").unwrap().iter().map(Violation::code).collect();
        assert_eq!(codes, ["TooShort", "Always"]);
    }

    #[test]
    fn wrong_type_skips_the_rules() {
        let errors = validate(&schema(), vec![Some(json!("Al")), None, Some(json!("old"))]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("age").unwrap()[0].doc(), Some("Expected integer."));
    }

    #[test]
    fn invariants_run_only_on_valid_fields() {
        let schema = Schema::new([FieldSpec::int("min"), FieldSpec::int("max")])
            .unwrap()
            .invariant(|r: &Record| match (r.get_i64("min"), r.get_i64("max")) {
                (Some(lo), Some(hi)) if lo > hi => Err(Violation::new("InvalidRange")),
                _ => Ok(()),
            });

        let errors = validate(&schema, vec![Some(json!(5)), Some(json!(1))]).unwrap_err();
        assert_eq!(errors.to_text(), "InvalidRange");
        assert_eq!(errors.to_json(), json!({"__root__": ["InvalidRange"]}));

        let errors = validate(&schema, vec![Some(json!("x")), Some(json!(1))]).unwrap_err();
        assert!(errors.get("min").is_some());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn text_prefers_the_description() {
        let mut errors = ValidationErrors::new();
        errors.add("a", Violation::required());
        errors.add("b", Violation::new("Custom"));
        errors.add("a", Violation::new("Other").with_doc("Second."));
        assert_eq!(errors.to_text(), "`a`: Required input is missing.\n`a`: Second.\nCustom");
    }

    #[test]
    fn json_has_one_key_per_field() {
        let errors = validate(&schema(), vec![None, Some(json!([1])), None]).unwrap_err();
        assert_eq!(
            errors.to_json(),
            json!({
                "name": ["Required input is missing."],
                "tags": ["Expected a list of text values."],
            })
        );
    }

    #[test]
    fn responses_are_bad_requests() {
        let mut errors = ValidationErrors::new();
        errors.add("a", Violation::required());
        let res = errors.to_response(true);
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.header("content-type"), Some("application/json"));
        let res = errors.to_response(false);
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    fn get(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn stage_stores_the_record() {
        let validator = Validator::new(schema());
        let mut ov = Overhead::new();
        let flow = validator.run(&get("/?name=Al&tags=x&age=9"), &mut ov).unwrap();
        assert!(matches!(flow, Flow::Continue));
        let record = ov.record().unwrap();
        assert_eq!(record.get("tags"), Some(&json!(["x"])));
        assert_eq!(record.get_i64("age"), Some(9));
    }

    #[test]
    fn stage_answers_failures_without_touching_the_overhead() {
        let validator = Validator::new(schema()).format(ErrorFormat::Json);
        let mut ov = Overhead::new();
        let Flow::Respond(res) = validator.run(&get("/?tags=x&tags=y"), &mut ov).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({"name": ["Required input is missing."]}));
        assert!(ov.record().is_none());
    }

    #[test]
    fn stage_fails_fatally_without_an_extractor() {
        let validator = Validator::new(schema());
        let req: Request = http::Request::builder()
            .method("DELETE")
            .uri("/?name=Al")
            .body(Bytes::new())
            .unwrap()
            .into();
        let err = validator.run(&req, &mut Overhead::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtractor(m) if m == "DELETE"));
    }

    #[test]
    fn extension_verbs_fail_like_unregistered_ones() {
        let validator = Validator::new(schema());
        let req: Request = http::Request::builder()
            .method("fetch")
            .uri("/?name=Al")
            .body(Bytes::new())
            .unwrap()
            .into();
        let err = validator.run(&req, &mut Overhead::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtractor(m) if m == "FETCH"));
    }

    #[test]
    fn query_sourced_failures_answer_in_text() {
        let req: Request = http::Request::builder()
            .uri("/?tags=x")
            .header("content-type", "application/json")
            .body(Bytes::new())
            .unwrap()
            .into();
        let res = Validator::new(schema()).check(&req).unwrap().unwrap_err();
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body(), b"`name`: Required input is missing.");

        let forced = Validator::new(schema()).format(ErrorFormat::Json);
        let res = forced.check(&req).unwrap().unwrap_err();
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[test]
    fn unknown_sources_are_rejected_at_configuration() {
        let err = Validator::new(schema()).sources([Method::Delete]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(Method::Delete)));
    }

    #[test]
    fn repeated_checks_are_equal() {
        let validator = Validator::new(schema());
        let req = get("/?name=Al&age=3");
        let first = validator.check(&req).unwrap().unwrap();
        let second = validator.check(&req).unwrap().unwrap();
        assert_eq!(first, second);
    }
}
