//! Per-method extraction of raw request parameters.
//!
//! An extractor turns a [`Request`] into [`RawParams`]: field name → raw
//! value. Query strings and form bodies yield a list of strings per name
//! (repeated keys accumulate in arrival order); JSON bodies yield their
//! top-level object as-is.
//!
//! | Method | Source |
//! |---|---|
//! | `GET` | query string |
//! | `POST` | body: JSON when the content type is JSON, form-encoded otherwise |
//! | `PUT` | same as `POST` |
//!
//! Other verbs have no extractor unless one is [registered](Extractors::register).

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::method::Method;
use crate::request::Request;

/// Raw field name → raw value(s), before coercion.
pub type RawParams = Map<String, Value>;

/// Signature of an extractor.
pub type ExtractFn = fn(&Request) -> Result<RawParams, ExtractError>;

/// Why extraction failed.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// No extractor for this verb. A wiring mistake, never the client's.
    #[error("no extractor registered for {0}")]
    Unsupported(Method),

    /// The body could not be decoded. The client's mistake.
    #[error("malformed request body: {0}")]
    Malformed(String),
}

/// Parses the query string into name → list of values.
pub fn query(req: &Request) -> Result<RawParams, ExtractError> {
    match req.query() {
        Some(q) => form_lists(q.as_bytes()),
        None => Ok(RawParams::new()),
    }
}

/// Parses the body as JSON when the content type says so, as
/// `application/x-www-form-urlencoded` otherwise.
pub fn body(req: &Request) -> Result<RawParams, ExtractError> {
    if req.is_json() {
        json_object(req.body())
    } else {
        form_lists(req.body())
    }
}

/// Decodes a JSON body whose top level must be an object. An empty body is
/// an empty object.
pub fn json_object(bytes: &[u8]) -> Result<RawParams, ExtractError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RawParams::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other),
        ))),
        Err(e) => Err(ExtractError::Malformed(e.to_string())),
    }
}

/// Decodes `application/x-www-form-urlencoded` data into name → list of
/// string values.
///
/// The input must be UTF-8, and so must every percent-decoded name and
/// value; anything else is [`ExtractError::Malformed`].
pub fn form_lists(bytes: &[u8]) -> Result<RawParams, ExtractError> {
    let raw = std::str::from_utf8(bytes)
        .map_err(|e| ExtractError::Malformed(format!("invalid UTF-8: {e}")))?;

    let mut params = RawParams::new();
    let mut replacements = 0;
    for (name, value) in url::form_urlencoded::parse(bytes) {
        replacements += replacement_chars(&name) + replacement_chars(&value);
        let slot = params
            .entry(name.into_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = slot {
            values.push(Value::String(value.into_owned()));
        }
    }

    // The decoder is lossy. Every U+FFFD it yields must come from the input
    // itself, literally or percent-encoded.
    let expected = replacement_chars(raw) + raw.to_ascii_uppercase().matches("%EF%BF%BD").count();
    if replacements != expected {
        return Err(ExtractError::Malformed("invalid UTF-8 in percent-encoded data".to_owned()));
    }
    Ok(params)
}

fn replacement_chars(text: &str) -> usize {
    text.matches(char::REPLACEMENT_CHARACTER).count()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Method → extractor table. Built at configuration time, read-only after.
#[derive(Clone, Debug)]
pub struct Extractors {
    table: HashMap<Method, ExtractFn>,
}

impl Extractors {
    /// An empty table: every verb is unsupported.
    pub fn empty() -> Self {
        Self { table: HashMap::new() }
    }

    /// Registers (or replaces) the extractor for `method`.
    pub fn register(mut self, method: Method, extractor: ExtractFn) -> Self {
        self.table.insert(method, extractor);
        self
    }

    pub fn supports(&self, method: Method) -> bool {
        self.table.contains_key(&method)
    }

    /// Runs the extractor registered for `method`.
    pub fn extract(&self, method: Method, req: &Request) -> Result<RawParams, ExtractError> {
        let extractor = self.table.get(&method).ok_or(ExtractError::Unsupported(method))?;
        extractor(req)
    }

    /// Runs several extractors and merges their output in order. A name
    /// present in more than one source collects every value into one list.
    pub fn extract_merged(&self, sources: &[Method], req: &Request) -> Result<RawParams, ExtractError> {
        let mut merged = RawParams::new();
        for &source in sources {
            for (name, value) in self.extract(source, req)? {
                match merged.remove(&name) {
                    None => {
                        merged.insert(name, value);
                    }
                    Some(previous) => {
                        let mut values = into_list(previous);
                        values.extend(into_list(value));
                        merged.insert(name, Value::Array(values));
                    }
                }
            }
        }
        Ok(merged)
    }
}

impl Default for Extractors {
    fn default() -> Self {
        Self::empty()
            .register(Method::Get, query)
            .register(Method::Post, body)
            .register(Method::Put, body)
    }
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn request(method: &str, uri: &str, content_type: Option<&str>, body: &'static [u8]) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Bytes::from_static(body)).unwrap().into()
    }

    #[test]
    fn query_values_are_lists_in_arrival_order() {
        let req = request("GET", "/?tags=x&name=Alice&tags=y", None, b"");
        let params = Extractors::default().extract(Method::Get, &req).unwrap();
        assert_eq!(params["tags"], json!(["x", "y"]));
        assert_eq!(params["name"], json!(["Alice"]));
    }

    #[test]
    fn query_is_percent_decoded() {
        let req = request("GET", "/?q=hello+world&e=%C3%A9", None, b"");
        let params = query(&req).unwrap();
        assert_eq!(params["q"], json!(["hello world"]));
        assert_eq!(params["e"], json!(["é"]));
    }

    #[test]
    fn missing_query_is_empty() {
        let req = request("GET", "/", None, b"");
        assert!(query(&req).unwrap().is_empty());
    }

    #[test]
    fn post_form_body() {
        let req = request("POST", "/", Some("application/x-www-form-urlencoded"), b"a=1&a=2&b=3");
        let params = Extractors::default().extract(Method::Post, &req).unwrap();
        assert_eq!(params["a"], json!(["1", "2"]));
        assert_eq!(params["b"], json!(["3"]));
    }

    #[test]
    fn non_utf8_form_bodies_are_malformed() {
        let req = request("POST", "/", Some("application/x-www-form-urlencoded"), b"a=\xfe");
        assert!(matches!(body(&req), Err(ExtractError::Malformed(msg)) if msg.contains("UTF-8")));

        let req = request("POST", "/", Some("application/x-www-form-urlencoded"), b"a=%FF");
        assert!(matches!(body(&req), Err(ExtractError::Malformed(_))));

        let req = request("GET", "/?a=%C3", None, b"");
        assert!(matches!(query(&req), Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn encoded_replacement_characters_are_data() {
        let params = form_lists("a=%EF%BF%BD&b=\u{FFFD}&c=%ef%bf%bd".as_bytes()).unwrap();
        assert_eq!(params["a"], json!(["\u{FFFD}"]));
        assert_eq!(params["b"], json!(["\u{FFFD}"]));
        assert_eq!(params["c"], json!(["\u{FFFD}"]));
    }

    #[test]
    fn post_and_put_decode_json_alike() {
        let extractors = Extractors::default();
        for method in [Method::Post, Method::Put] {
            let req = request(method.as_str(), "/", Some("application/json"), br#"{"a":[1,2],"b":"x"}"#);
            let params = extractors.extract(method, &req).unwrap();
            assert_eq!(Value::Object(params), json!({"a": [1, 2], "b": "x"}));
        }
    }

    #[test]
    fn json_top_level_must_be_an_object() {
        let req = request("POST", "/", Some("application/json"), b"[1,2]");
        let err = body(&req).unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(msg) if msg.contains("an array")));
    }

    #[test]
    fn broken_json_is_malformed() {
        let req = request("POST", "/", Some("application/json"), b"{\"a\":");
        assert!(matches!(body(&req), Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn empty_json_body_is_empty() {
        let req = request("PUT", "/", Some("application/json"), b"  ");
        assert!(body(&req).unwrap().is_empty());
    }

    #[test]
    fn unregistered_verbs_are_unsupported() {
        let req = request("DELETE", "/?a=1", None, b"");
        let err = Extractors::default().extract(Method::Delete, &req).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(Method::Delete)));

        let extractors = Extractors::default().register(Method::Delete, query);
        assert_eq!(extractors.extract(Method::Delete, &req).unwrap()["a"], json!(["1"]));
    }

    #[test]
    fn merged_sources_concatenate_lists() {
        let req = request("POST", "/?a=1&q=x", Some("application/x-www-form-urlencoded"), b"a=2&b=3");
        let params = Extractors::default()
            .extract_merged(&[Method::Get, Method::Post], &req)
            .unwrap();
        assert_eq!(params["a"], json!(["1", "2"]));
        assert_eq!(params["q"], json!(["x"]));
        assert_eq!(params["b"], json!(["3"]));
    }

    #[test]
    fn merged_json_scalars_join_the_list() {
        let req = request("POST", "/?a=1", Some("application/json"), br#"{"a":"2"}"#);
        let params = Extractors::default()
            .extract_merged(&[Method::Get, Method::Post], &req)
            .unwrap();
        assert_eq!(params["a"], json!(["1", "2"]));
    }
}
