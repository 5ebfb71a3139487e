//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Handlers build a [`Response`] and return it. The hosting server turns it
//! into an [`http::Response`] with [`Response::into_http`].

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use http::StatusCode;
/// use menhir::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use menhir::Response;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name`, replacing every existing value of that header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Converts into the `http` representation expected by hyper-style
    /// servers. Headers that are not valid HTTP names or values are dropped.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(&value),
            ) else {
                tracing::warn!(header = %name, "dropping invalid response header");
                continue;
            };
            headers.append(name, value);
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `200 OK` with the serialised value.
impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response { Response::json(self.to_string().into_bytes()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_puts_content_type_first() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/x")
            .text("made");
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[0].0, "content-type");
        assert_eq!(res.header("Location"), Some("/x"));
        assert_eq!(res.body(), b"made");
    }

    #[test]
    fn set_header_replaces_existing_values() {
        let mut res = Response::builder().header("X-A", "1").header("x-a", "2").no_body();
        res.set_header("x-a", "3");
        let values: Vec<_> = res.headers().iter().filter(|(k, _)| k.eq_ignore_ascii_case("x-a")).collect();
        assert_eq!(values.len(), 1);
        assert_eq!(res.header("X-A"), Some("3"));
    }

    #[test]
    fn into_http_keeps_status_and_headers() {
        let res = Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("bad header", "dropped")
            .json(b"{}".to_vec())
            .into_http();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn json_values_become_json_responses() {
        let res = serde_json::json!({"ok": true}).into_response();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"ok":true}"#);
    }
}
