//! Incoming HTTP request type.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;

use crate::method::Method;

/// An already-received HTTP request, handed over by the hosting server.
///
/// Build one from an [`http::Request<Bytes>`] once the server has collected
/// the body:
///
/// ```rust
/// use bytes::Bytes;
/// use menhir::Request;
///
/// let req: Request = http::Request::builder()
///     .method("POST")
///     .uri("/users?notify=1")
///     .header("content-type", "application/json")
///     .body(Bytes::from_static(br#"{"name":"alice"}"#))
///     .unwrap()
///     .into();
///
/// assert_eq!(req.path(), "/users");
/// assert_eq!(req.query(), Some("notify=1"));
/// assert!(req.is_json());
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Request {
    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The method as a known verb, upper-casing the raw token first.
    /// `None` for verbs menhir does not know.
    pub fn verb(&self) -> Option<Method> {
        Method::parse(&self.method)
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The media type of the body, without parameters, lower-cased.
    pub fn content_type(&self) -> Option<String> {
        let raw = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let essence = raw.split(';').next().unwrap_or_default().trim();
        Some(essence.to_ascii_lowercase())
    }

    /// `true` for `application/json` and `application/*+json` bodies.
    pub fn is_json(&self) -> bool {
        match self.content_type() {
            Some(ct) => ct == "application/json" || (ct.starts_with("application/") && ct.ends_with("+json")),
            None => false,
        }
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method.as_str().to_owned(),
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
        }
    }
}
